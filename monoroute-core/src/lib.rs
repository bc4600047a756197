//! Core abstractions of monoroute: a request-dispatch engine driven by a declarative
//! routing tree.
//!
//! A transport builds one [`RequestContext`] per inbound request and hands it to
//! [`dispatch`] together with a root [`Endpoint`], usually a [`TreeRouter`]. The tree walk
//! collects middleware while consuming path segments, then the chain runner executes the
//! collected middleware followed by the terminal handler and finalizes the response.
mod error;
pub use error::{AnyError, AnyResult};

pub mod chain;
pub mod context;
pub mod handler;
pub mod sink;
pub mod special;
pub mod tree;
pub mod walk;

pub use chain::{dispatch, Next};
pub use context::{Protocol, RequestContext};
pub use handler::{handler_fn, Endpoint, Handler};
pub use sink::{ResponseSink, WriteOutcome};
pub use special::{ErrorHandlers, ErrorKind};
pub use tree::{Node, Route};
pub use walk::TreeRouter;

#[cfg(test)]
pub(crate) mod test_util;
