use std::{convert::Infallible, fmt::Debug};

use bytes::Bytes;
use http::Response;
use monoroute_core::{special::default_response, ErrorKind};
use service_async::{
    layer::{layer_fn, FactoryLayer},
    AsyncMakeService, MakeService, Service,
};
use tracing::error;

/// Converts errors of the inner service into the internal-server-error document.
///
/// Dispatch itself never translates handler failures; a transport stacks this layer on top of
/// [`RouterService`](crate::http::RouterService) when a failed request should still get an
/// HTTP answer. The error is logged before it is dropped.
pub struct InternalErrorResponder<S> {
    inner: S,
}

impl<R, S> Service<R> for InternalErrorResponder<S>
where
    S: Service<R, Response = Response<Bytes>>,
    S::Error: Debug,
{
    type Response = Response<Bytes>;
    type Error = Infallible;

    async fn call(&self, req: R) -> Result<Self::Response, Self::Error> {
        match self.inner.call(req).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!("request failed: {e:?}");
                Ok(default_response(ErrorKind::InternalServerError))
            }
        }
    }
}

impl<F> InternalErrorResponder<F> {
    pub fn layer<C>() -> impl FactoryLayer<C, F, Factory = Self> {
        layer_fn(|_c: &C, inner| InternalErrorResponder { inner })
    }
}

impl<F: MakeService> MakeService for InternalErrorResponder<F> {
    type Service = InternalErrorResponder<F::Service>;
    type Error = F::Error;

    fn make_via_ref(&self, old: Option<&Self::Service>) -> Result<Self::Service, Self::Error> {
        Ok(InternalErrorResponder {
            inner: self.inner.make_via_ref(old.map(|o| &o.inner))?,
        })
    }
}

impl<F: AsyncMakeService> AsyncMakeService for InternalErrorResponder<F> {
    type Service = InternalErrorResponder<F::Service>;
    type Error = F::Error;

    async fn make_via_ref(
        &self,
        old: Option<&Self::Service>,
    ) -> Result<Self::Service, Self::Error> {
        Ok(InternalErrorResponder {
            inner: self.inner.make_via_ref(old.map(|o| &o.inner)).await?,
        })
    }
}
