//! HTTP plumbing
//!
//! [`ReqwestTransport`] sends requests; [`SessionAwareTransport`] wraps a
//! transport with bearer tokens and single-flight refresh.

mod session_transport;
mod transport;

pub use session_transport::SessionAwareTransport;
pub use transport::{
    ApiRequest, ApiResponse, FormField, RequestBody, ReqwestTransport, Transport, TransportError,
};
