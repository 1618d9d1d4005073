//! # metricgate web utilities
//!
//! Pieces shared by the gateway's HTTP and WebSocket routes:
//!
//! - [`WebError`]: JSON error bodies `{"error": {"code", "message"}}` with the
//!   status code for each [`RejectionReason`](metricgate_core::RejectionReason)
//! - [`ApiKey`]: extracts the shared key from a header, bearer token or `?key=`
//! - Request id and CORS layers

pub mod errors;
pub mod extractors;
pub mod middleware;

pub use errors::{WebError, WebResult};
pub use extractors::{ApiKey, API_KEY_HEADER};
pub use middleware::{cors_layer, request_id_middleware, RequestId, REQUEST_ID_HEADER};
