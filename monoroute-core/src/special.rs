//! Error kinds, their default documents and the context-scoped override mapping.
//!
//! Tree nodes may carry override maps (`!` merges into what ancestors set, `!!` replaces it).
//! The context keeps the effective mapping as a [`SpecialHandlers`] value which remembers
//! whether it is still a shared node map or an owned merge result.
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use bytes::Bytes;
use futures::future::LocalBoxFuture;
use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    HeaderValue, Response, StatusCode,
};

use crate::{
    chain::Next,
    context::{Protocol, RequestContext},
    handler::{Endpoint, Handler},
    sink::ResponseSink,
    AnyResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown error kind: {0}")]
pub struct UnknownErrorKind(pub String);

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::BadRequest,
        ErrorKind::Unauthorized,
        ErrorKind::PaymentRequired,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::MethodNotAllowed,
        ErrorKind::InternalServerError,
    ];

    pub const fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Name used in configuration files.
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "badRequest",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::PaymentRequired => "paymentRequired",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "notFound",
            ErrorKind::MethodNotAllowed => "methodNotAllowed",
            ErrorKind::InternalServerError => "internalServerError",
        }
    }

    /// Body of the default document, e.g. `<h1>404 - Not Found.</h1>`.
    pub fn document(self) -> String {
        let status = self.status();
        format!(
            "<h1>{} - {}.</h1>",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownErrorKind(s.to_string()))
    }
}

/// Write the built-in document for `kind` and complete the sink.
///
/// An established websocket has no HTTP response left to write, so for [`Protocol::Ws`] the
/// sink is only completed.
pub fn render_default(sink: &mut ResponseSink, protocol: Protocol, kind: ErrorKind) {
    if protocol == Protocol::Ws {
        sink.end();
        return;
    }
    let body = kind.document();
    sink.set_status(kind.status());
    sink.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/html"));
    sink.insert_header(CONTENT_LENGTH, HeaderValue::from(body.len()));
    sink.end_with(body);
}

/// Standalone response carrying the default document, for callers outside a dispatch.
pub fn default_response(kind: ErrorKind) -> Response<Bytes> {
    let mut sink = ResponseSink::new();
    render_default(&mut sink, Protocol::Http, kind);
    sink.into_response()
}

/// Handler rendering the built-in document of an error kind.
#[derive(Debug, Clone, Copy)]
pub struct ErrorDocument(pub ErrorKind);

impl Handler for ErrorDocument {
    fn handle<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        _next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>> {
        Box::pin(async move {
            let protocol = cx.protocol();
            render_default(cx.sink_mut(), protocol, self.0);
            Ok(())
        })
    }
}

/// Mapping from error kind to the endpoint rendering it.
#[derive(Clone, Default)]
pub struct ErrorHandlers(HashMap<ErrorKind, Endpoint>);

impl ErrorHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ErrorKind, endpoint: Endpoint) -> Self {
        self.insert(kind, endpoint);
        self
    }

    pub fn insert(&mut self, kind: ErrorKind, endpoint: Endpoint) {
        self.0.insert(kind, endpoint);
    }

    pub fn get(&self, kind: ErrorKind) -> Option<&Endpoint> {
        self.0.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every entry of `other` into `self`, replacing entries of the same kind.
    pub fn extend_from(&mut self, other: &ErrorHandlers) {
        self.0
            .extend(other.0.iter().map(|(kind, ep)| (*kind, ep.clone())));
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePolicy {
    /// `!`: node entries win, kinds the node does not name keep the ancestor handler.
    Merge,
    /// `!!`: node map shadows everything set by ancestors.
    Replace,
}

/// Effective override mapping carried on a request context.
#[derive(Debug, Clone)]
pub enum SpecialHandlers {
    /// A node map taken as is, still shared with the tree.
    Inherited(Arc<ErrorHandlers>),
    /// An owned merge result that later `!` maps extend in place.
    Merged(ErrorHandlers),
}

impl SpecialHandlers {
    pub fn get(&self, kind: ErrorKind) -> Option<&Endpoint> {
        match self {
            SpecialHandlers::Inherited(map) => map.get(kind),
            SpecialHandlers::Merged(map) => map.get(kind),
        }
    }

    pub fn apply(
        current: Option<SpecialHandlers>,
        policy: OverridePolicy,
        local: &Arc<ErrorHandlers>,
    ) -> SpecialHandlers {
        match (policy, current) {
            (OverridePolicy::Replace, _) | (OverridePolicy::Merge, None) => {
                SpecialHandlers::Inherited(local.clone())
            }
            (OverridePolicy::Merge, Some(SpecialHandlers::Merged(mut merged))) => {
                merged.extend_from(local);
                SpecialHandlers::Merged(merged)
            }
            (OverridePolicy::Merge, Some(SpecialHandlers::Inherited(inherited))) => {
                let mut merged = ErrorHandlers::clone(&inherited);
                merged.extend_from(local);
                SpecialHandlers::Merged(merged)
            }
        }
    }
}
