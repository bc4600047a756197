//! Dispatch as a [`Service`].
//!
//! [`RouterService`] is the transport-facing end of the engine: it turns an `http::Request`
//! into a [`RequestContext`], dispatches it through the root endpoint and returns the buffered
//! response. It is the innermost service of a stack and is built by [`RouterServiceFactory`]:
//!
//! ```ignore
//! let stack = FactoryStack::new(config)
//!     .replace(RouterService::factory(TreeRouter::new(tree)))
//!     .push(InternalErrorResponder::layer());
//! let svc = stack.into_inner().make()?;
//! ```
use std::convert::Infallible;

use bytes::Bytes;
use http::{Request, Response};
use monoroute_core::{dispatch, AnyError, Endpoint, Handler, RequestContext};
use service_async::{AsyncMakeService, MakeService, Service};

#[derive(Clone)]
pub struct RouterService {
    root: Endpoint,
}

impl RouterService {
    pub fn new(root: Endpoint) -> Self {
        Self { root }
    }

    /// Factory handing out services that share `root`.
    pub fn factory(root: impl Handler) -> RouterServiceFactory {
        RouterServiceFactory {
            root: Endpoint::handler(root),
        }
    }
}

impl<B> Service<Request<B>> for RouterService {
    type Response = Response<Bytes>;
    type Error = AnyError;

    async fn call(&self, request: Request<B>) -> Result<Self::Response, Self::Error> {
        let mut cx = RequestContext::from_request(&request);
        dispatch(&mut cx, &self.root).await?;
        Ok(cx.into_sink().into_response())
    }
}

#[derive(Clone)]
pub struct RouterServiceFactory {
    root: Endpoint,
}

impl RouterServiceFactory {
    pub fn new(root: Endpoint) -> Self {
        Self { root }
    }
}

impl MakeService for RouterServiceFactory {
    type Service = RouterService;
    type Error = Infallible;

    fn make_via_ref(&self, _old: Option<&Self::Service>) -> Result<Self::Service, Self::Error> {
        Ok(RouterService::new(self.root.clone()))
    }
}

impl AsyncMakeService for RouterServiceFactory {
    type Service = RouterService;
    type Error = Infallible;

    async fn make_via_ref(
        &self,
        _old: Option<&Self::Service>,
    ) -> Result<Self::Service, Self::Error> {
        Ok(RouterService::new(self.root.clone()))
    }
}
