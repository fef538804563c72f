//! Scripted transport for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};

use super::traits::{HttpRequest, HttpResponse, HttpTransport, TransportError};

type Scripted = Result<HttpResponse, TransportError>;

/// Transport that answers from per-path scripts.
///
/// Queued answers are used first, then the path's fallback. Requests to a
/// held path wait for one `notify_one` each before answering.
pub(crate) struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fallback: Mutex<HashMap<String, Scripted>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    requests: Mutex<Vec<HttpRequest>>,
    seen_tx: watch::Sender<usize>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        let (seen_tx, _) = watch::channel(0);
        Arc::new(Self {
            queued: Mutex::new(HashMap::new()),
            fallback: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            seen_tx,
        })
    }

    pub(crate) fn respond(&self, path: &str, response: HttpResponse) {
        self.queued
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    pub(crate) fn fail(&self, path: &str, error: TransportError) {
        self.queued
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Err(error));
    }

    pub(crate) fn respond_always(&self, path: &str, response: HttpResponse) {
        self.fallback.lock().insert(path.to_string(), Ok(response));
    }

    pub(crate) fn fail_always(&self, path: &str, error: TransportError) {
        self.fallback.lock().insert(path.to_string(), Err(error));
    }

    pub(crate) fn hold(&self, path: &str) -> Arc<Notify> {
        Arc::clone(
            self.holds
                .lock()
                .entry(path.to_string())
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    /// Wait until at least `n` requests for `path` have arrived
    pub(crate) async fn wait_for(&self, path: &str, n: usize) {
        let mut seen = self.seen_tx.subscribe();
        while self.count(path) < n {
            if seen.changed().await.is_err() {
                return;
            }
        }
    }

    fn next_answer(&self, path: &str) -> Scripted {
        if let Some(answer) = self
            .queued
            .lock()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
        {
            return answer;
        }
        self.fallback
            .lock()
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::ConnectionFailed(format!("no route for {path}"))))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = request.path.clone();
        let total = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len()
        };
        self.seen_tx.send_replace(total);

        let hold = self.holds.lock().get(&path).cloned();
        if let Some(hold) = hold {
            hold.notified().await;
        }

        self.next_answer(&path)
    }
}
