//! Transport Layer
//!
//! - [`HttpTransport`]: the request/response primitive (reqwest in
//!   production, scripted in tests)
//! - [`Exchange`]: one dispatched request, owned by whoever sent it, with a
//!   read-only [`ExchangeObserver`] for everybody else
//! - [`Endpoint`]: the sandbox server's four endpoints

pub mod endpoints;
pub mod exchange;
pub mod http;
#[cfg(test)]
pub(crate) mod mock;
pub mod traits;

pub use endpoints::Endpoint;
pub use exchange::{Exchange, ExchangeId, ExchangeKind, ExchangeObserver, ExchangeState};
pub use http::ReqwestTransport;
pub use traits::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError, FORM_CONTENT_TYPE,
};
