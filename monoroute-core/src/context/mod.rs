//! Per-request state threaded through the dispatch pipeline.
//!
//! A [`RequestContext`] is created by the transport for every inbound request and owned by
//! the dispatch task until the response is complete. It carries the request attributes the
//! routers look at (path, protocol tag, method, hostname, headers), the walk state (segments,
//! cursor, captures), the pending middleware chain, the error-handler overrides collected from
//! the tree and the output sink.
use std::{collections::HashMap, str::FromStr, sync::Arc};

use http::{uri::Authority, HeaderMap, Method, Request};
use tracing::debug;

use crate::{
    chain::PendingChain,
    handler::Endpoint,
    sink::ResponseSink,
    special::{self, ErrorDocument, ErrorHandlers, ErrorKind, OverridePolicy, SpecialHandlers},
};

mod protocol;
pub use protocol::{Protocol, UnknownProtocol};

/// Segments rejected before any tree walk.
const ILLEGAL_SEGMENTS: [&str; 7] = ["*", "/", ".", "..", "~", "!", "^"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Pending,
    Ready,
    Rejected,
}

pub struct RequestContext {
    path: String,
    query: Option<String>,
    protocol: Protocol,
    method: Method,
    headers: HeaderMap,
    hostname: Option<String>,

    init: InitState,
    segments: Vec<String>,
    cursor: usize,
    captures: HashMap<String, String>,

    chain: PendingChain,
    special: Option<SpecialHandlers>,
    sink: ResponseSink,
}

impl RequestContext {
    /// `target` is the request target as sent by the client; anything after `?` is kept as the
    /// query and does not take part in routing.
    pub fn new(target: impl Into<String>, protocol: Protocol) -> Self {
        let mut path = target.into();
        let query = path.find('?').map(|idx| {
            let query = path[idx + 1..].to_string();
            path.truncate(idx);
            query
        });
        Self {
            path,
            query,
            protocol,
            method: Method::GET,
            headers: HeaderMap::new(),
            hostname: None,
            init: InitState::Pending,
            segments: Vec::new(),
            cursor: 0,
            captures: HashMap::new(),
            chain: PendingChain::default(),
            special: None,
            sink: ResponseSink::new(),
        }
    }

    /// Build a context from an `http` request, detecting the protocol tag and hostname.
    ///
    /// The hostname comes from the URI authority when there is one (absolute-form targets,
    /// HTTP/2), from the `Host` header otherwise.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let target = match request.uri().path_and_query() {
            Some(pq) => pq.as_str().to_string(),
            None => request.uri().path().to_string(),
        };
        let mut cx = Self::new(target, Protocol::detect(request))
            .with_method(request.method().clone())
            .with_headers(request.headers().clone());
        let authority = request.uri().authority();
        if let Some(hostname) = authority.and_then(|a| normalize_host(a.host())) {
            cx.hostname = Some(hostname);
        }
        cx
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the request headers. The hostname is derived from the `Host` header.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.hostname = headers
            .get(http::header::HOST)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_hostname);
        self.headers = headers;
        self
    }

    pub fn with_hostname(mut self, hostname: impl AsRef<str>) -> Self {
        self.hostname = normalize_host(hostname.as_ref());
        self
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Split and validate the path on first call.
    ///
    /// Returns `false` when the path holds a disallowed segment. The bad-request document is
    /// written on the first failing call only; callers must stop dispatching on `false`.
    pub fn ensure_initialized(&mut self) -> bool {
        match self.init {
            InitState::Ready => return true,
            InitState::Rejected => return false,
            InitState::Pending => {}
        }

        self.segments = self
            .path
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        self.cursor = 0;
        self.captures.clear();
        self.special = None;

        if self
            .segments
            .iter()
            .any(|part| ILLEGAL_SEGMENTS.contains(&part.as_str()))
        {
            debug!("bad path: {}", self.path);
            self.init = InitState::Rejected;
            // no override can be in scope before the first walk step
            special::render_default(&mut self.sink, self.protocol, ErrorKind::BadRequest);
            return false;
        }

        self.init = InitState::Ready;
        true
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.init == InitState::Ready
    }

    /// Path segments, empty until [`ensure_initialized`](Self::ensure_initialized) succeeded.
    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of segments the walk has not consumed yet.
    pub fn remaining_segments(&self) -> usize {
        self.segments.len().saturating_sub(self.cursor)
    }

    /// The unconsumed part of the path, segments joined with `/`.
    ///
    /// Computed from the cursor at call time. Before initialization the raw path is returned.
    pub fn remaining_path(&self) -> String {
        if self.init == InitState::Pending {
            return self.path.clone();
        }
        let from = self.cursor.min(self.segments.len());
        self.segments[from..].join("/")
    }

    /// Read the segment under the cursor and advance past it.
    ///
    /// The cursor also moves when the path is exhausted, it stops at `segments + 1`.
    pub fn take_segment(&mut self) -> Option<&str> {
        let idx = self.cursor;
        if self.cursor <= self.segments.len() {
            self.cursor += 1;
        }
        self.segments.get(idx).map(String::as_str)
    }

    /// Move the cursor back to `cursor`, a position read earlier with [`cursor`](Self::cursor).
    /// The cursor never moves forward this way.
    pub fn rewind_to(&mut self, cursor: usize) {
        self.cursor = self.cursor.min(cursor);
    }

    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    #[inline]
    pub fn captures(&self) -> &HashMap<String, String> {
        &self.captures
    }

    /// Bind a captured segment. An existing binding of the same name is overwritten.
    pub fn set_capture(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.captures.insert(name.into(), value.into());
    }

    /// Append an endpoint to the pending chain; chains are flattened in order.
    pub fn push_endpoint(&mut self, endpoint: &Endpoint) {
        self.chain.push(endpoint);
    }

    /// Append the endpoint currently in charge of `kind`.
    pub fn push_error(&mut self, kind: ErrorKind) {
        let endpoint = self.error_endpoint(kind);
        self.chain.push(&endpoint);
    }

    #[inline]
    pub(crate) fn chain_mut(&mut self) -> &mut PendingChain {
        &mut self.chain
    }

    /// Number of pending chain elements and the index of the next one to run.
    pub fn chain_position(&self) -> (usize, usize) {
        (self.chain.len(), self.chain.cursor())
    }

    pub fn apply_overrides(&mut self, policy: OverridePolicy, local: &Arc<ErrorHandlers>) {
        self.special = Some(SpecialHandlers::apply(self.special.take(), policy, local));
    }

    #[inline]
    pub fn special_handlers(&self) -> Option<&SpecialHandlers> {
        self.special.as_ref()
    }

    /// The override registered for `kind`, or the built-in document.
    pub fn error_endpoint(&self, kind: ErrorKind) -> Endpoint {
        match self.special.as_ref().and_then(|s| s.get(kind)) {
            Some(endpoint) => endpoint.clone(),
            None => Endpoint::handler(ErrorDocument(kind)),
        }
    }

    #[inline]
    pub fn sink(&self) -> &ResponseSink {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut ResponseSink {
        &mut self.sink
    }

    pub fn into_sink(self) -> ResponseSink {
        self.sink
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("path", &self.path)
            .field("protocol", &self.protocol)
            .field("method", &self.method)
            .field("hostname", &self.hostname)
            .field("segments", &self.segments)
            .field("cursor", &self.cursor)
            .field("captures", &self.captures)
            .finish()
    }
}

fn parse_hostname(host: &str) -> Option<String> {
    let authority = Authority::from_str(host).ok()?;
    normalize_host(authority.host())
}

fn normalize_host(host: &str) -> Option<String> {
    let hostname = host.trim_start_matches('[').trim_end_matches(']');
    if hostname.is_empty() {
        return None;
    }
    Some(hostname.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_split_and_remaining_path() {
        let mut cx = RequestContext::new("//a//b/c/?x=1", Protocol::Http);
        assert_eq!(cx.remaining_path(), "//a//b/c/");
        assert_eq!(cx.query(), Some("x=1"));
        assert!(cx.ensure_initialized());
        assert_eq!(cx.segments(), ["a", "b", "c"]);
        assert_eq!(cx.remaining_path(), "a/b/c");

        let before = cx.cursor();
        assert_eq!(cx.take_segment(), Some("a"));
        assert_eq!(cx.remaining_path(), "b/c");
        cx.rewind_to(before);
        assert_eq!(cx.remaining_path(), "a/b/c");
    }

    #[test]
    fn test_cursor_stops_after_end() {
        let mut cx = RequestContext::new("/a", Protocol::Http);
        assert!(cx.ensure_initialized());
        assert_eq!(cx.take_segment(), Some("a"));
        assert_eq!(cx.take_segment(), None);
        assert_eq!(cx.take_segment(), None);
        assert_eq!(cx.cursor(), 2);
        assert_eq!(cx.remaining_path(), "");
        assert_eq!(cx.remaining_segments(), 0);
    }

    #[test]
    fn test_illegal_segments_rejected_once() {
        for path in ["/a/../b", "/*", "/a/./b", "/~", "/x/!", "/^/y"] {
            let mut cx = RequestContext::new(path, Protocol::Http);
            assert!(!cx.ensure_initialized(), "{path}");
            assert_eq!(cx.sink().status(), http::StatusCode::BAD_REQUEST);
            assert!(cx.sink().is_finished());
            assert_eq!(cx.sink().body(), b"<h1>400 - Bad Request.</h1>");
            // second call neither succeeds nor writes again
            assert!(!cx.ensure_initialized());
        }
    }

    #[test]
    fn test_initialization_is_idempotent() {
        let mut cx = RequestContext::new("/a/b", Protocol::Http);
        assert!(cx.ensure_initialized());
        cx.take_segment();
        cx.set_capture("id", "7");
        assert!(cx.ensure_initialized());
        assert_eq!(cx.cursor(), 1);
        assert_eq!(cx.capture("id"), Some("7"));
    }

    #[test]
    fn test_captures_last_writer_wins() {
        let mut cx = RequestContext::new("/", Protocol::Http);
        cx.set_capture("id", "1");
        cx.set_capture("id", "2");
        assert_eq!(cx.capture("id"), Some("2"));
        assert_eq!(cx.captures().len(), 1);
    }

    #[test]
    fn test_from_request() {
        let request = Request::post("/api/items?limit=3")
            .header(http::header::HOST, "Example.COM:8080")
            .body(())
            .unwrap();
        let cx = RequestContext::from_request(&request);
        assert_eq!(cx.path(), "/api/items");
        assert_eq!(cx.query(), Some("limit=3"));
        assert_eq!(cx.method(), Method::POST);
        assert_eq!(cx.hostname(), Some("example.com"));
        assert_eq!(cx.protocol(), Protocol::Http);
    }

    #[test]
    fn test_hostname_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::HOST, HeaderValue::from_static("[::1]:80"));
        let cx = RequestContext::new("/", Protocol::Http).with_headers(headers);
        assert_eq!(cx.hostname(), Some("::1"));

        let cx = RequestContext::new("/", Protocol::Http).with_headers(HeaderMap::new());
        assert_eq!(cx.hostname(), None);

        let cx = RequestContext::new("/", Protocol::Http).with_hostname("API.local");
        assert_eq!(cx.hostname(), Some("api.local"));
    }

    #[test]
    fn test_hostname_from_uri_authority() {
        let request = Request::get("http://API.Example.com:8443/v1?x=1")
            .body(())
            .unwrap();
        let cx = RequestContext::from_request(&request);
        assert_eq!(cx.hostname(), Some("api.example.com"));
        assert_eq!(cx.path(), "/v1");
        assert_eq!(cx.query(), Some("x=1"));

        // authority wins over a disagreeing header
        let request = Request::get("http://[::1]/")
            .header(http::header::HOST, "other.example")
            .body(())
            .unwrap();
        let cx = RequestContext::from_request(&request);
        assert_eq!(cx.hostname(), Some("::1"));
    }
}
