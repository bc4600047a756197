use futures::future::LocalBoxFuture;
use monoroute_core::{AnyResult, ErrorKind, Handler, Next, RequestContext, Route};
use tracing::debug;

/// Binds the next path segment under a name, then walks the inner route.
///
/// A missing segment always resolves to not-found, even when the inner route has a fallback.
#[derive(Debug, Clone)]
pub struct CaptureRouter {
    name: String,
    route: Route,
}

impl CaptureRouter {
    pub fn new(name: impl Into<String>, route: impl Into<Route>) -> Self {
        Self {
            name: name.into(),
            route: route.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Handler for CaptureRouter {
    fn handle<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>> {
        Box::pin(async move {
            if !cx.ensure_initialized() {
                return Ok(());
            }
            let Some(value) = cx.take_segment().map(str::to_string) else {
                debug!("nothing to capture as {}: {}", self.name, cx.path());
                return next.reject(cx, ErrorKind::NotFound).await;
            };
            cx.set_capture(self.name.as_str(), value);
            next.descend(cx, &self.route).await
        })
    }
}
