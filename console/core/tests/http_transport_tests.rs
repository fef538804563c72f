//! HTTP Transport Integration Tests
//!
//! Drive the console core over a real HTTP connection against a local
//! `wiremock` server standing in for the sandbox server.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use console_core::transport::FORM_CONTENT_TYPE;
use console_core::{
    acquire_session, ConsoleConfig, ConsoleError, ConsoleSession, LogView, MemoryControl,
    MemoryDisplay, MemoryEditor, ReqwestTransport, ServerConfig, SessionCollaborators,
    SessionToken, SubmissionStatus, TransportError,
};

// =============================================================================
// Helpers
// =============================================================================

struct Fixture {
    session: ConsoleSession,
    output: Arc<MemoryDisplay>,
    log: Arc<MemoryDisplay>,
    control: Arc<MemoryControl>,
    _events: tokio::sync::mpsc::Receiver<console_core::ConsoleEvent>,
}

fn transport_for(server: &MockServer) -> Arc<ReqwestTransport> {
    let config = ServerConfig {
        base_url: server.uri(),
        ..ServerConfig::default()
    };
    Arc::new(ReqwestTransport::new(&config).unwrap())
}

fn fixture(server: &MockServer, code: &str) -> Fixture {
    fixture_on(transport_for(server), code)
}

fn fixture_on(transport: Arc<ReqwestTransport>, code: &str) -> Fixture {
    let output = Arc::new(MemoryDisplay::new());
    let log = Arc::new(MemoryDisplay::new());
    let control = Arc::new(MemoryControl::default());
    let (tx, rx) = tokio::sync::mpsc::channel(8);

    let session = ConsoleSession::new(
        SessionToken::new("1073741").unwrap(),
        transport,
        SessionCollaborators {
            editor: Arc::new(MemoryEditor::new(code)),
            control: control.clone(),
            output: output.clone(),
            log: log.clone(),
        },
        &ConsoleConfig::default(),
        tx,
    );

    Fixture {
        session,
        output,
        log,
        control,
        _events: rx,
    }
}

async fn mount_empty_output(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/getOutput"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("")
                .set_delay(Duration::from_millis(20)),
        )
        .mount(server)
        .await;
}

// =============================================================================
// Submission Tests
// =============================================================================

#[tokio::test]
async fn test_evaluate_request_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("content-type", FORM_CONTENT_TYPE))
        .and(body_string("user_code=print%281%29&user_callargs="))
        .respond_with(ResponseTemplate::new(200).set_body_string("1%0A"))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty_output(&server).await;

    let f = fixture(&server, "print(1)");
    let outcome = f.session.submit_current().await.unwrap();

    assert_eq!(
        outcome.status,
        SubmissionStatus::Completed {
            result: "1\n".to_string()
        }
    );
    assert_eq!(f.output.contents(), "1\n");
    assert!(f.control.is_enabled());

    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty());
    for request in &requests {
        assert_eq!(request.url.query(), Some("1073741"));
    }
}

#[tokio::test]
async fn test_streamed_chunks_arrive_before_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("EOF")
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getOutput"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ab"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getOutput"))
        .respond_with(ResponseTemplate::new(200).set_body_string("cd"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_empty_output(&server).await;

    let f = fixture(&server, "for i in range(2): print(i)");
    let outcome = f.session.submit_current().await.unwrap();

    assert_eq!(
        f.output.chunks(),
        vec!["ab".to_string(), "cd".to_string(), "EOF".to_string()]
    );
    assert_eq!(outcome.poll.chunks, 2);
    assert!(!outcome.poll.stopped_early);
}

#[tokio::test]
async fn test_server_error_ends_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<b>boom</b>"))
        .mount(&server)
        .await;
    mount_empty_output(&server).await;

    let f = fixture(&server, "x");
    let outcome = f.session.submit_current().await.unwrap();

    assert_eq!(
        outcome.status,
        SubmissionStatus::Failed {
            error: TransportError::Status {
                status: 500,
                body: "<b>boom</b>".to_string()
            }
        }
    );
    assert_eq!(
        f.output.contents(),
        "[evaluation failed: Server returned 500: &lt;b&gt;boom&lt;/b&gt;]"
    );
    assert!(f.session.is_submit_enabled());
}

#[tokio::test]
async fn test_request_timeout_ends_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    mount_empty_output(&server).await;

    let config = ServerConfig {
        base_url: server.uri(),
        request_timeout: Some(Duration::from_millis(200)),
        ..ServerConfig::default()
    };
    let f = fixture_on(Arc::new(ReqwestTransport::new(&config).unwrap()), "while True: pass");
    let outcome = f.session.submit_current().await.unwrap();

    assert!(
        matches!(
            outcome.status,
            SubmissionStatus::Failed {
                error: TransportError::Timeout(_)
            }
        ),
        "unexpected status {:?}",
        outcome.status
    );
    let shown = f.output.contents();
    assert!(
        shown.starts_with("[evaluation failed: Request timed out: "),
        "unexpected output {shown:?}"
    );
    assert!(shown.ends_with(']'));
    assert!(f.control.is_enabled());
    assert!(f.session.is_submit_enabled());
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_failure() {
    let config = ServerConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..ServerConfig::default()
    };
    let transport = Arc::new(ReqwestTransport::new(&config).unwrap());

    let result = acquire_session(transport).await;

    assert!(matches!(
        result,
        Err(ConsoleError::Transport(TransportError::ConnectionFailed(_)))
    ));
}

// =============================================================================
// Log and Session Tests
// =============================================================================

#[tokio::test]
async fn test_log_document_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getLog"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{'entire_log' : [ {'logtime':'1300000000.5', 'repycode':'print%281%29', \
             'output':'1%0A'}, ] }",
        ))
        .mount(&server)
        .await;

    let f = fixture(&server, "");
    let view = f.session.fetch_log().await.unwrap();

    assert!(matches!(view, LogView::Entries(ref entries) if entries.len() == 1));
    assert_eq!(
        f.log.chunks(),
        vec![
            "-----------------------------------<br/>".to_string(),
            "Logtime: <pre>1300000000.5</pre>".to_string(),
            "Repycode: <pre>print(1)</pre>".to_string(),
            "Output: <pre>1\n</pre>".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_empty_log_body_means_no_sandbox() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getLog"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let f = fixture(&server, "");
    let view = f.session.fetch_log().await.unwrap();

    assert_eq!(view, LogView::NoSandbox);
    assert_eq!(
        f.log.contents(),
        "You currently have no sandbox. Reload website!"
    );
}

#[tokio::test]
async fn test_acquire_session_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/js/tr_repy_user.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("var g_user_id = 31337;"))
        .expect(1)
        .mount(&server)
        .await;

    let token = acquire_session(transport_for(&server)).await.unwrap();

    assert_eq!(token.as_str(), "31337");
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}
