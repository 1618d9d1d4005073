//! metricgate server
//!
//! Wires the ingestion pipeline to axum: `POST /api/metrics` for one-shot
//! submissions, WebSocket streaming on `/ws` (and on `/` of the optional
//! dedicated stream listener), plus `/health` and `/api/stats`.

pub mod routes;
pub mod startup;
pub mod state;
pub mod websocket;

pub use routes::{build_router, build_stream_router};
pub use startup::{shutdown_signal, Server};
pub use state::AppState;
