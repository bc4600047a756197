//! Router variants, middleware, declarative configuration and `service_async` adapters built on
//! top of [`monoroute_core`].
pub mod common;
pub mod config;
pub mod http;
pub mod routers;

pub use config::{ConfigError, HandlerRegistry, RouteConfig, RouterConfig};
pub use routers::{CaptureRouter, HostnameRouter, MethodRouter, PrefixRouter, ProtocolRouter};

#[cfg(test)]
pub(crate) mod test_util;
