//! Tree walk.
//!
//! [`walk`] consumes one segment per visited node and appends what it finds to the pending
//! chain of the context: the `^` middleware of every visited node, then either the endpoint the
//! path resolved to or the endpoint currently in charge of not-found. It never runs anything
//! itself; the caller continues the chain afterwards.
use futures::future::LocalBoxFuture;
use tracing::{debug, trace};

use crate::{
    chain::Next,
    context::RequestContext,
    handler::Handler,
    special::ErrorKind,
    tree::{Node, Route, Step},
    AnyResult,
};

/// Walk `route` starting at the current cursor of `cx`.
///
/// The path must already be initialized, see [`RequestContext::ensure_initialized`].
pub fn walk(cx: &mut RequestContext, route: &Route) {
    let mut node = match route {
        Route::Endpoint(endpoint) => {
            cx.push_endpoint(endpoint);
            return;
        }
        Route::Tree(node) => node,
    };
    loop {
        visit(cx, node);

        let before = cx.cursor();
        let part = cx.take_segment();
        trace!("walk step at {before}: {part:?}");
        let route = match node.step(part) {
            Step::Descend(route) => route,
            Step::Fallback(route) => {
                cx.rewind_to(before);
                route
            }
            Step::Miss => {
                debug!("no route for {}", cx.path());
                cx.push_error(ErrorKind::NotFound);
                return;
            }
        };
        match route {
            Route::Endpoint(endpoint) => {
                cx.push_endpoint(endpoint);
                return;
            }
            Route::Tree(child) => node = child,
        }
    }
}

fn visit(cx: &mut RequestContext, node: &Node) {
    if let Some((policy, handlers)) = node.overrides() {
        cx.apply_overrides(policy, handlers);
    }
    for middleware in node.middlewares() {
        cx.push_endpoint(middleware);
    }
}

/// Entry point handler for a routing tree.
///
/// Validates the path, walks the tree and continues the chain with what the walk appended.
/// A rejected path has already been answered with the bad-request document, so the chain stops
/// there.
#[derive(Debug, Clone)]
pub struct TreeRouter {
    root: Route,
}

impl TreeRouter {
    pub fn new(root: impl Into<Route>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Route {
        &self.root
    }
}

impl Handler for TreeRouter {
    fn handle<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>> {
        Box::pin(async move {
            if !cx.ensure_initialized() {
                return Ok(());
            }
            next.descend(cx, &self.root).await
        })
    }
}
