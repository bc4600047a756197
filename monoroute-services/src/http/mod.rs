mod cors;
mod service;

pub use cors::{CorsConfig, CorsMiddleware};
pub use service::{RouterService, RouterServiceFactory};
