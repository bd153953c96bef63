//! Middleware stack for the API

pub mod layers;
pub mod request_id;
pub mod security;

pub use layers::{cors, trace};
pub use request_id::request_id_middleware;
pub use security::security_headers_middleware;
