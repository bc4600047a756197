//! Chain runner.
//!
//! Middleware collected during the tree walk and the terminal handler are appended to a flat
//! list on the request context. A single cursor walks that list: each element receives a
//! [`Next`] token and the chain only moves on when the token is run. Routers appearing inside
//! the chain append what their own walk finds and keep going with the same cursor, so nesting
//! never restarts the chain.
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use tracing::trace;

use crate::{
    context::RequestContext,
    handler::{CallableFn, Endpoint, Handler},
    special::ErrorKind,
    tree::Route,
    walk::walk,
    AnyResult,
};

#[derive(Clone)]
enum Link {
    Callable(Arc<CallableFn>),
    Handler(Arc<dyn Handler>),
}

impl Link {
    fn invoke<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>> {
        match self {
            Link::Callable(f) => f(cx, next),
            Link::Handler(h) => h.handle(cx, next),
        }
    }
}

#[derive(Default)]
pub(crate) struct PendingChain {
    links: Vec<Link>,
    cursor: usize,
}

impl PendingChain {
    pub(crate) fn push(&mut self, endpoint: &Endpoint) {
        match endpoint {
            Endpoint::Callable(f) => self.links.push(Link::Callable(f.clone())),
            Endpoint::Handler(h) => self.links.push(Link::Handler(h.clone())),
            Endpoint::Chain(list) => list.iter().for_each(|ep| self.push(ep)),
        }
    }

    fn advance(&mut self) -> Option<Link> {
        let link = self.links.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(link)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }
}

/// Continuation handed to every chain element.
///
/// Running it invokes the element under the chain cursor, or does nothing once the chain is
/// exhausted. It is consumed on use, so an element continues the chain at most once.
pub struct Next {
    _private: (),
}

impl Next {
    pub(crate) fn new() -> Self {
        Next { _private: () }
    }

    pub fn run(self, cx: &mut RequestContext) -> LocalBoxFuture<'_, AnyResult<()>> {
        Box::pin(async move {
            let Some(link) = cx.chain_mut().advance() else {
                return Ok(());
            };
            link.invoke(cx, Next::new()).await
        })
    }

    /// Walk `route` from the current cursor, then continue with whatever the walk appended.
    pub async fn descend(self, cx: &mut RequestContext, route: &Route) -> AnyResult<()> {
        walk(cx, route);
        self.run(cx).await
    }

    /// Continue with the endpoint in charge of `kind`.
    pub async fn reject(self, cx: &mut RequestContext, kind: ErrorKind) -> AnyResult<()> {
        cx.push_error(kind);
        self.run(cx).await
    }
}

/// Run `root` as a new chain on `cx` and make sure the response is completed.
///
/// Errors from any chain element are returned as is, without completing the response;
/// turning them into an error page is up to the caller.
pub async fn dispatch(cx: &mut RequestContext, root: &Endpoint) -> AnyResult<()> {
    cx.push_endpoint(root);
    Next::new().run(cx).await?;
    if !cx.sink().is_finished() {
        trace!("completing unfinished response for {}", cx.path());
        cx.sink_mut().end();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        context::Protocol,
        handler::handler_fn,
        sink::{Completion, OutputState},
        test_util::{block_on, body_text, record, Log},
    };

    fn terminal(log: &Log, tag: &'static str) -> Endpoint {
        let log = log.clone();
        handler_fn(move |cx, _next| {
            let log = log.clone();
            Box::pin(async move {
                log.push(tag);
                cx.sink_mut().end_with(tag);
                Ok(())
            })
        })
    }

    #[test]
    fn test_around_middleware_order() {
        let log = Log::default();
        let around = {
            let log = log.clone();
            handler_fn(move |cx, next| {
                let log = log.clone();
                Box::pin(async move {
                    log.push("around:before");
                    next.run(cx).await?;
                    log.push("around:after");
                    Ok(())
                })
            })
        };
        let root = Endpoint::chain([around, record(&log, "plain"), terminal(&log, "handler")]);

        let mut cx = RequestContext::new("/", Protocol::Http);
        block_on(dispatch(&mut cx, &root)).unwrap();
        assert_eq!(
            log.entries(),
            ["around:before", "plain", "handler", "around:after"]
        );
        assert_eq!(body_text(cx.sink()), "handler");
        assert_eq!(cx.chain_position(), (3, 3));
    }

    #[test]
    fn test_short_circuit_still_finalizes() {
        let log = Log::default();
        let gate = {
            let log = log.clone();
            handler_fn(move |cx, _next| {
                let log = log.clone();
                Box::pin(async move {
                    log.push("gate");
                    cx.sink_mut().set_status(http::StatusCode::FORBIDDEN);
                    Ok(())
                })
            })
        };
        let root = Endpoint::chain([gate, record(&log, "after"), terminal(&log, "handler")]);

        let mut cx = RequestContext::new("/", Protocol::Http);
        block_on(dispatch(&mut cx, &root)).unwrap();
        assert_eq!(log.entries(), ["gate"]);
        assert_eq!(cx.sink().state(), OutputState::Finished(Completion::Empty));
        assert_eq!(cx.sink().status(), http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_next_after_exhaustion_is_noop() {
        let log = Log::default();
        let tail = {
            let log = log.clone();
            handler_fn(move |cx, next| {
                let log = log.clone();
                Box::pin(async move {
                    next.run(cx).await?;
                    log.push("tail");
                    Ok(())
                })
            })
        };
        let mut cx = RequestContext::new("/", Protocol::Http);
        block_on(dispatch(&mut cx, &tail)).unwrap();
        assert_eq!(log.entries(), ["tail"]);
        assert!(cx.sink().is_finished());
    }

    #[test]
    fn test_error_propagates() {
        let log = Log::default();
        let failing = handler_fn(|_cx, _next| {
            Box::pin(async move { Err::<(), _>(anyhow::anyhow!("handler failed")) })
        });
        let root = Endpoint::chain([record(&log, "first"), failing, terminal(&log, "handler")]);

        let mut cx = RequestContext::new("/", Protocol::Http);
        let err = block_on(dispatch(&mut cx, &root)).unwrap_err();
        assert_eq!(err.to_string(), "handler failed");
        assert_eq!(log.entries(), ["first"]);
        assert!(!cx.sink().is_finished());
    }

    #[test]
    fn test_suspension_keeps_order() {
        let log = Log::default();
        let slow = {
            let log = log.clone();
            handler_fn(move |cx, next| {
                let log = log.clone();
                Box::pin(async move {
                    monoio::time::sleep(Duration::from_millis(5)).await;
                    log.push("slow");
                    next.run(cx).await
                })
            })
        };
        let root = Endpoint::chain([slow, record(&log, "fast"), terminal(&log, "handler")]);
        let mut cx = RequestContext::new("/", Protocol::Http);
        block_on(dispatch(&mut cx, &root)).unwrap();
        assert_eq!(log.entries(), ["slow", "fast", "handler"]);
    }

    #[test]
    fn test_requests_interleave() {
        let log = Log::default();
        let delayed = |tag: &'static str, millis: u64| {
            let log = log.clone();
            handler_fn(move |cx, _next| {
                let log = log.clone();
                Box::pin(async move {
                    log.push(format!("{tag}:start"));
                    monoio::time::sleep(Duration::from_millis(millis)).await;
                    log.push(format!("{tag}:end"));
                    cx.sink_mut().end_with(tag);
                    Ok(())
                })
            })
        };
        let slow = delayed("slow", 30);
        let quick = delayed("quick", 1);

        block_on(async move {
            let first = monoio::spawn(async move {
                let mut cx = RequestContext::new("/slow", Protocol::Http);
                dispatch(&mut cx, &slow).await.unwrap();
                body_text(cx.sink())
            });
            let second = monoio::spawn(async move {
                let mut cx = RequestContext::new("/quick", Protocol::Http);
                dispatch(&mut cx, &quick).await.unwrap();
                body_text(cx.sink())
            });
            assert_eq!(first.await, "slow");
            assert_eq!(second.await, "quick");
        });
        assert_eq!(
            log.entries(),
            ["slow:start", "quick:start", "quick:end", "slow:end"]
        );
    }
}
