use std::future::Future;

use http::StatusCode;
use monoroute_core::{dispatch, handler_fn, Endpoint, Protocol, RequestContext};

pub(crate) fn block_on<F: Future>(fut: F) -> F::Output {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    monoio::RuntimeBuilder::<monoio::LegacyDriver>::new()
        .enable_timer()
        .build()
        .expect("unable to build monoio runtime")
        .block_on(fut)
}

/// Terminal writing `tag:` followed by the remaining path.
pub(crate) fn probe(tag: &'static str) -> Endpoint {
    handler_fn(move |cx, _next| {
        Box::pin(async move {
            let body = format!("{tag}:{}", cx.remaining_path());
            cx.sink_mut().end_with(body);
            Ok(())
        })
    })
}

/// Terminal writing only `tag`.
pub(crate) fn text(tag: &'static str) -> Endpoint {
    handler_fn(move |cx, _next| {
        Box::pin(async move {
            cx.sink_mut().end_with(tag);
            Ok(())
        })
    })
}

pub(crate) async fn send(mut cx: RequestContext, root: &Endpoint) -> (StatusCode, String) {
    dispatch(&mut cx, root).await.expect("dispatch failed");
    let sink = cx.into_sink();
    (
        sink.status(),
        String::from_utf8_lossy(sink.body()).into_owned(),
    )
}

pub(crate) async fn get(path: &str, root: Endpoint) -> (StatusCode, String) {
    send(RequestContext::new(path, Protocol::Http), &root).await
}
