//! The handler capability and the terminal values stored in a routing tree.
use std::{fmt, sync::Arc};

use futures::future::LocalBoxFuture;

use crate::{chain::Next, context::RequestContext, AnyResult};

/// Something that can take part in a request chain.
///
/// A handler receives the request context and the continuation of the chain. It decides
/// whether and when to call [`Next::run`]: before its own logic, after it, or never, which
/// stops every later element of the chain. Futures are polled on a single-threaded runtime and
/// do not need to be `Send`; the handler itself is shared by the immutable routing tree and
/// must be `Send + Sync`.
pub trait Handler: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>>;
}

pub type CallableFn = dyn for<'a> Fn(&'a mut RequestContext, Next) -> LocalBoxFuture<'a, AnyResult<()>>
    + Send
    + Sync;

/// Terminal value of a routing tree.
#[derive(Clone)]
pub enum Endpoint {
    /// A plain function or closure.
    Callable(Arc<CallableFn>),
    /// An object implementing [`Handler`], e.g. one of the routers.
    Handler(Arc<dyn Handler>),
    /// An ordered list, run as middleware followed by the last element.
    Chain(Vec<Endpoint>),
}

/// Wrap a closure as an [`Endpoint::Callable`].
///
/// ```ignore
/// let hello = handler_fn(|cx, _next| {
///     Box::pin(async move {
///         cx.sink_mut().end_with("hello");
///         Ok(())
///     })
/// });
/// ```
pub fn handler_fn<F>(f: F) -> Endpoint
where
    F: for<'a> Fn(&'a mut RequestContext, Next) -> LocalBoxFuture<'a, AnyResult<()>>
        + Send
        + Sync
        + 'static,
{
    Endpoint::Callable(Arc::new(f))
}

impl Endpoint {
    pub fn handler<H: Handler>(handler: H) -> Self {
        Endpoint::Handler(Arc::new(handler))
    }

    pub fn chain(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        Endpoint::Chain(endpoints.into_iter().collect())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Callable(_) => f.write_str("Callable"),
            Endpoint::Handler(_) => f.write_str("Handler"),
            Endpoint::Chain(list) => f.debug_tuple("Chain").field(list).finish(),
        }
    }
}
