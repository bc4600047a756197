use futures::future::LocalBoxFuture;
use monoroute_core::{AnyResult, ErrorKind, Handler, Next, RequestContext, Route};
use tracing::debug;

/// Mounts a route under a fixed path prefix.
///
/// The prefix segments are consumed and compared one by one before the inner route is walked.
/// A mismatch, or fewer remaining segments than the prefix has, resolves to not-found.
#[derive(Debug, Clone)]
pub struct PrefixRouter {
    prefix: Vec<String>,
    route: Route,
}

impl PrefixRouter {
    /// `prefix` is `/`-separated; empty parts are dropped, so `/api/v1/` and `api/v1` are the
    /// same prefix.
    pub fn new(prefix: &str, route: impl Into<Route>) -> Self {
        Self::from_segments(prefix.split('/'), route)
    }

    pub fn from_segments<I, S>(segments: I, route: impl Into<Route>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefix = segments
            .into_iter()
            .map(Into::into)
            .filter(|part: &String| !part.is_empty())
            .collect();
        Self {
            prefix,
            route: route.into(),
        }
    }

    #[inline]
    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }
}

impl Handler for PrefixRouter {
    fn handle<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>> {
        Box::pin(async move {
            if !cx.ensure_initialized() {
                return Ok(());
            }
            if cx.remaining_segments() < self.prefix.len() {
                debug!("path shorter than prefix /{}: {}", self.prefix.join("/"), cx.path());
                return next.reject(cx, ErrorKind::NotFound).await;
            }
            for expected in &self.prefix {
                if cx.take_segment() != Some(expected.as_str()) {
                    debug!("prefix /{} mismatch: {}", self.prefix.join("/"), cx.path());
                    return next.reject(cx, ErrorKind::NotFound).await;
                }
            }
            next.descend(cx, &self.route).await
        })
    }
}
