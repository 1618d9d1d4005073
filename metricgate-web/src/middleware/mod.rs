pub mod cors;
pub mod request_id;

pub use cors::{cors_layer, cors_layer_with_config, CorsConfig};
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
