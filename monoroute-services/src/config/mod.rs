//! Declarative routing trees.
//!
//! A routing tree can be written in TOML or JSON and turned into a [`Route`] with a
//! [`HandlerRegistry`] resolving endpoint names:
//!
//! ```toml
//! "^" = ["access-log"]
//! "/" = "home"
//! "!" = { notFound = "not-found-page" }
//!
//! [static]
//! "." = "files"
//!
//! [api]
//! router = "prefix"
//! prefix = "v1"
//!
//! [api.tree.users]
//! router = "capture"
//! name = "id"
//! tree = { "/" = "show-user", "posts" = ["auth", "list-posts"] }
//! ```
//!
//! A string names an endpoint and a list of strings is a chain. A table is a tree node unless
//! it carries a `router` key, in which case it configures one of the router variants.
use std::{collections::BTreeMap, path::Path};

use http::Method;
use monoroute_core::{
    context::UnknownProtocol, special::UnknownErrorKind, Endpoint, ErrorHandlers, ErrorKind, Node,
    Protocol, Route, TreeRouter,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    http::RouterServiceFactory,
    routers::{CaptureRouter, HostnameRouter, MethodRouter, PrefixRouter, ProtocolRouter},
};

mod registry;
pub use registry::HandlerRegistry;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("empty chain")]
    EmptyChain,
    #[error(transparent)]
    UnknownErrorKind(#[from] UnknownErrorKind),
    #[error(transparent)]
    UnknownProtocol(#[from] UnknownProtocol),
    #[error("invalid method: {0}")]
    InvalidMethod(String),
    #[error("`{key}` expects {expected}")]
    InvalidReserved {
        key: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteConfig {
    /// Name of a registered endpoint.
    Endpoint(String),
    /// Names of registered endpoints run as a chain.
    Chain(Vec<String>),
    Router(RouterConfig),
    /// Tree node keyed by segment literals and reserved keys.
    Tree(BTreeMap<String, RouteConfig>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "router", rename_all = "lowercase")]
pub enum RouterConfig {
    Capture {
        name: String,
        tree: Box<RouteConfig>,
    },
    Prefix {
        prefix: PrefixConfig,
        tree: Box<RouteConfig>,
    },
    Method {
        branches: BTreeMap<String, RouteConfig>,
        #[serde(default)]
        otherwise: Option<Box<RouteConfig>>,
    },
    Protocol {
        branches: BTreeMap<String, RouteConfig>,
        #[serde(default)]
        otherwise: Option<Box<RouteConfig>>,
    },
    Hostname {
        branches: BTreeMap<String, RouteConfig>,
        #[serde(default)]
        otherwise: Option<Box<RouteConfig>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefixConfig {
    Path(String),
    Segments(Vec<String>),
}

impl RouteConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read(path)?;
        parse_from_slice(&content)
    }

    pub fn build(&self, registry: &HandlerRegistry) -> Result<Route, ConfigError> {
        Ok(match self {
            RouteConfig::Endpoint(_) | RouteConfig::Chain(_) => {
                Route::Endpoint(self.build_endpoint(registry)?)
            }
            RouteConfig::Router(router) => Route::Endpoint(router.build(registry)?),
            RouteConfig::Tree(entries) => Route::Tree(build_node(entries, registry)?),
        })
    }

    pub fn build_router(&self, registry: &HandlerRegistry) -> Result<TreeRouter, ConfigError> {
        Ok(TreeRouter::new(self.build(registry)?))
    }

    /// Factory of [`RouterService`](crate::http::RouterService)s dispatching through this tree.
    pub fn factory(
        &self,
        registry: &HandlerRegistry,
    ) -> Result<RouterServiceFactory, ConfigError> {
        let root = self.build_router(registry)?;
        Ok(RouterServiceFactory::new(Endpoint::handler(root)))
    }

    /// Resolve a name or list of names; anything else is not an endpoint.
    fn build_endpoint(&self, registry: &HandlerRegistry) -> Result<Endpoint, ConfigError> {
        match self {
            RouteConfig::Endpoint(name) => lookup(registry, name),
            RouteConfig::Chain(names) if names.is_empty() => Err(ConfigError::EmptyChain),
            RouteConfig::Chain(names) => Ok(Endpoint::chain(
                names
                    .iter()
                    .map(|name| lookup(registry, name))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            RouteConfig::Router(router) => router.build(registry),
            RouteConfig::Tree(_) => Err(ConfigError::InvalidReserved {
                key: "endpoint",
                expected: "a name or a list of names",
            }),
        }
    }
}

impl RouterConfig {
    pub fn build(&self, registry: &HandlerRegistry) -> Result<Endpoint, ConfigError> {
        Ok(match self {
            RouterConfig::Capture { name, tree } => {
                Endpoint::handler(CaptureRouter::new(name.as_str(), tree.build(registry)?))
            }
            RouterConfig::Prefix { prefix, tree } => {
                let route = tree.build(registry)?;
                Endpoint::handler(match prefix {
                    PrefixConfig::Path(path) => PrefixRouter::new(path, route),
                    PrefixConfig::Segments(segments) => {
                        PrefixRouter::from_segments(segments.iter().map(String::as_str), route)
                    }
                })
            }
            RouterConfig::Method {
                branches,
                otherwise,
            } => {
                let mut router = MethodRouter::new();
                for (key, branch) in branches {
                    let method = Method::from_bytes(key.to_ascii_uppercase().as_bytes())
                        .map_err(|_| ConfigError::InvalidMethod(key.clone()))?;
                    router = router.branch(method, branch.build(registry)?);
                }
                if let Some(otherwise) = otherwise {
                    router = router.otherwise(otherwise.build(registry)?);
                }
                Endpoint::handler(router)
            }
            RouterConfig::Protocol {
                branches,
                otherwise,
            } => {
                let mut router = ProtocolRouter::new();
                for (key, branch) in branches {
                    router = router.branch(key.parse::<Protocol>()?, branch.build(registry)?);
                }
                if let Some(otherwise) = otherwise {
                    router = router.otherwise(otherwise.build(registry)?);
                }
                Endpoint::handler(router)
            }
            RouterConfig::Hostname {
                branches,
                otherwise,
            } => {
                let mut router = HostnameRouter::new();
                for (key, branch) in branches {
                    router = router.branch(key.clone(), branch.build(registry)?);
                }
                if let Some(otherwise) = otherwise {
                    router = router.otherwise(otherwise.build(registry)?);
                }
                Endpoint::handler(router)
            }
        })
    }
}

fn lookup(registry: &HandlerRegistry, name: &str) -> Result<Endpoint, ConfigError> {
    registry
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownEndpoint(name.to_string()))
}

fn build_node(
    entries: &BTreeMap<String, RouteConfig>,
    registry: &HandlerRegistry,
) -> Result<Node, ConfigError> {
    let mut node = Node::new();
    for (key, value) in entries {
        node = match key.as_str() {
            "^" => match value {
                RouteConfig::Endpoint(name) => node.middleware(lookup(registry, name)?),
                RouteConfig::Chain(names) => {
                    for name in names {
                        node = node.middleware(lookup(registry, name)?);
                    }
                    node
                }
                _ => {
                    return Err(ConfigError::InvalidReserved {
                        key: "^",
                        expected: "a name or a list of names",
                    })
                }
            },
            "!" => node.errors(build_error_handlers("!", value, registry)?),
            "!!" => node.replace_errors(build_error_handlers("!!", value, registry)?),
            // a table with a `router` key only lands here when its router fields are wrong
            "router" => {
                return Err(ConfigError::InvalidReserved {
                    key: "router",
                    expected: "a known router kind with its fields",
                })
            }
            _ => node.route(key.as_str(), value.build(registry)?),
        };
    }
    Ok(node)
}

fn build_error_handlers(
    key: &'static str,
    value: &RouteConfig,
    registry: &HandlerRegistry,
) -> Result<ErrorHandlers, ConfigError> {
    let RouteConfig::Tree(entries) = value else {
        return Err(ConfigError::InvalidReserved {
            key,
            expected: "a table from error kind to endpoint",
        });
    };
    let mut handlers = ErrorHandlers::new();
    for (kind, endpoint) in entries {
        handlers.insert(kind.parse::<ErrorKind>()?, endpoint.build_endpoint(registry)?);
    }
    Ok(handlers)
}

/// Parse `content` as JSON when it starts with `{`, as TOML otherwise.
pub fn parse_from_slice<T: DeserializeOwned>(content: &[u8]) -> anyhow::Result<T> {
    // read first non-space u8
    let is_json = match content
        .iter()
        .find(|&&b| b != b' ' && b != b'\r' && b != b'\n' && b != b'\t')
    {
        Some(first) => *first == b'{',
        None => false,
    };
    match is_json {
        true => serde_json::from_slice::<T>(content).map_err(Into::into),
        false => toml::from_str::<T>(&String::from_utf8_lossy(content)).map_err(Into::into),
    }
}
