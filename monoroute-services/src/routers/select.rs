//! Flat dispatch on a request attribute.
//!
//! A [`SelectRouter`] maps one discrete property of the request (protocol tag, method or
//! hostname) to a branch route. The path cursor is left alone, so branches are full routing
//! trees walked from wherever the enclosing walk stopped.
use std::{collections::HashMap, fmt, hash::Hash, marker::PhantomData};

use futures::future::LocalBoxFuture;
use http::Method;
use monoroute_core::{AnyResult, ErrorKind, Handler, Next, Protocol, RequestContext, Route};
use tracing::debug;

/// Extracts the dispatch key of a [`SelectRouter`] from the request context.
pub trait KeyExtractor: Send + Sync + 'static {
    type Key: Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Attribute name used in logs.
    const ATTRIBUTE: &'static str;

    fn extract(cx: &RequestContext) -> Option<Self::Key>;

    /// Applied to configured keys so they compare equal to extracted ones.
    #[inline]
    fn normalize(key: Self::Key) -> Self::Key {
        key
    }
}

pub struct ByProtocol;

impl KeyExtractor for ByProtocol {
    type Key = Protocol;
    const ATTRIBUTE: &'static str = "protocol";

    #[inline]
    fn extract(cx: &RequestContext) -> Option<Protocol> {
        Some(cx.protocol())
    }
}

pub struct ByMethod;

impl KeyExtractor for ByMethod {
    type Key = Method;
    const ATTRIBUTE: &'static str = "method";

    #[inline]
    fn extract(cx: &RequestContext) -> Option<Method> {
        Some(cx.method().clone())
    }
}

pub struct ByHostname;

impl KeyExtractor for ByHostname {
    type Key = String;
    const ATTRIBUTE: &'static str = "hostname";

    #[inline]
    fn extract(cx: &RequestContext) -> Option<String> {
        cx.hostname().map(str::to_string)
    }

    fn normalize(key: String) -> String {
        key.to_ascii_lowercase()
    }
}

pub struct SelectRouter<E: KeyExtractor> {
    branches: HashMap<E::Key, Route>,
    otherwise: Option<Route>,
    _extractor: PhantomData<fn() -> E>,
}

pub type ProtocolRouter = SelectRouter<ByProtocol>;
pub type MethodRouter = SelectRouter<ByMethod>;
pub type HostnameRouter = SelectRouter<ByHostname>;

impl<E: KeyExtractor> SelectRouter<E> {
    pub fn new() -> Self {
        Self {
            branches: HashMap::new(),
            otherwise: None,
            _extractor: PhantomData,
        }
    }

    pub fn branch(mut self, key: E::Key, route: impl Into<Route>) -> Self {
        self.branches.insert(E::normalize(key), route.into());
        self
    }

    /// Branch taken when no key matches, instead of not-found.
    pub fn otherwise(mut self, route: impl Into<Route>) -> Self {
        self.otherwise = Some(route.into());
        self
    }

    pub fn select(&self, cx: &RequestContext) -> Option<&Route> {
        E::extract(cx)
            .and_then(|key| self.branches.get(&key))
            .or(self.otherwise.as_ref())
    }
}

impl<E: KeyExtractor> Default for SelectRouter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: KeyExtractor> Clone for SelectRouter<E>
where
    E::Key: Clone,
{
    fn clone(&self) -> Self {
        Self {
            branches: self.branches.clone(),
            otherwise: self.otherwise.clone(),
            _extractor: PhantomData,
        }
    }
}

impl<E: KeyExtractor> fmt::Debug for SelectRouter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectRouter")
            .field("attribute", &E::ATTRIBUTE)
            .field("branches", &self.branches.keys().collect::<Vec<_>>())
            .field("otherwise", &self.otherwise.is_some())
            .finish()
    }
}

impl<E: KeyExtractor> Handler for SelectRouter<E> {
    fn handle<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>> {
        Box::pin(async move {
            if !cx.ensure_initialized() {
                return Ok(());
            }
            match self.select(cx) {
                Some(route) => next.descend(cx, route).await,
                None => {
                    debug!(
                        "no {} branch for {:?}: {}",
                        E::ATTRIBUTE,
                        E::extract(cx),
                        cx.path()
                    );
                    next.reject(cx, ErrorKind::NotFound).await
                }
            }
        })
    }
}
