use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use futures::future::LocalBoxFuture;

use crate::{
    chain::{dispatch, Next},
    context::{Protocol, RequestContext},
    handler::{handler_fn, Endpoint, Handler},
    sink::ResponseSink,
    AnyResult,
};

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

/// Shared, ordered record of what ran.
#[derive(Clone, Default)]
pub(crate) struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Middleware appending `tag` to `log` and continuing the chain.
pub(crate) fn record(log: &Log, tag: &'static str) -> Endpoint {
    let log = log.clone();
    handler_fn(move |cx, next| {
        let log = log.clone();
        Box::pin(async move {
            log.push(tag);
            next.run(cx).await
        })
    })
}

/// Terminal writing `tag` followed by the remaining path, e.g. `H2:a/b`.
pub(crate) struct Text(pub &'static str);

impl Handler for Text {
    fn handle<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        _next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>> {
        Box::pin(async move {
            let body = format!("{}:{}", self.0, cx.remaining_path());
            cx.sink_mut().end_with(body);
            Ok(())
        })
    }
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

pub(crate) fn probe(tag: &'static str) -> Endpoint {
    Endpoint::handler(Text(tag))
}

pub(crate) async fn run(path: &str, root: Endpoint) -> ResponseSink {
    let mut cx = RequestContext::new(path, Protocol::Http);
    dispatch(&mut cx, &root).await.expect("dispatch failed");
    cx.into_sink()
}

pub(crate) fn body_text(sink: &ResponseSink) -> String {
    String::from_utf8_lossy(sink.body()).into_owned()
}
