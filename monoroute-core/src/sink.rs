//! Buffered output sink of a request.
//!
//! The sink is the only place handlers write their response to. It accepts status, headers and
//! body chunks while pending and becomes inert once completed or once the transport reports the
//! connection as closed. Late writes are reported as [`WriteOutcome::Ignored`] and never panic.
use std::{cell::Cell, rc::Rc};

use bytes::{Bytes, BytesMut};
use http::{header::HeaderName, HeaderMap, HeaderValue, Response, StatusCode};

/// How a finished response was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Empty,
    WithData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Pending,
    Finished(Completion),
}

/// Result of a write attempt on the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The sink was already finished or the connection is gone.
    Ignored,
}

impl WriteOutcome {
    #[inline]
    pub fn is_written(self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Connection liveness shared between the transport and the sink.
///
/// The transport keeps a clone and calls [`Liveness::close`] when the peer goes away; every
/// later operation on the sink is then ignored.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Rc<Cell<bool>>);

impl Liveness {
    pub fn close(&self) {
        self.0.set(true);
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.0.get()
    }
}

#[derive(Debug)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    state: OutputState,
    liveness: Liveness,
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            state: OutputState::Pending,
            liveness: Liveness::default(),
        }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub fn state(&self) -> OutputState {
        self.state
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, OutputState::Finished(_))
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Handle for the transport to report a closed connection.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    #[inline]
    fn writable(&self) -> bool {
        self.state == OutputState::Pending && self.liveness.is_alive()
    }

    pub fn set_status(&mut self, status: StatusCode) -> WriteOutcome {
        if !self.writable() {
            return WriteOutcome::Ignored;
        }
        self.status = status;
        WriteOutcome::Written
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> WriteOutcome {
        if !self.writable() {
            return WriteOutcome::Ignored;
        }
        self.headers.insert(name, value);
        WriteOutcome::Written
    }

    pub fn write(&mut self, data: impl AsRef<[u8]>) -> WriteOutcome {
        if !self.writable() {
            return WriteOutcome::Ignored;
        }
        self.body.extend_from_slice(data.as_ref());
        WriteOutcome::Written
    }

    /// Complete the response with whatever has been written so far.
    pub fn end(&mut self) -> WriteOutcome {
        if !self.writable() {
            return WriteOutcome::Ignored;
        }
        let completion = if self.body.is_empty() {
            Completion::Empty
        } else {
            Completion::WithData
        };
        self.state = OutputState::Finished(completion);
        WriteOutcome::Written
    }

    /// Append a last chunk and complete the response.
    pub fn end_with(&mut self, data: impl AsRef<[u8]>) -> WriteOutcome {
        if self.write(data) == WriteOutcome::Ignored {
            return WriteOutcome::Ignored;
        }
        self.end()
    }

    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_is_applied_once() {
        let mut sink = ResponseSink::new();
        assert_eq!(sink.state(), OutputState::Pending);
        assert_eq!(sink.end_with("hello"), WriteOutcome::Written);
        assert_eq!(sink.state(), OutputState::Finished(Completion::WithData));

        assert_eq!(sink.write("more"), WriteOutcome::Ignored);
        assert_eq!(sink.end(), WriteOutcome::Ignored);
        assert_eq!(sink.set_status(StatusCode::NOT_FOUND), WriteOutcome::Ignored);
        assert_eq!(sink.body(), b"hello");
        assert_eq!(sink.status(), StatusCode::OK);
    }

    #[test]
    fn test_empty_completion() {
        let mut sink = ResponseSink::new();
        sink.insert_header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        assert!(sink.end().is_written());
        assert_eq!(sink.state(), OutputState::Finished(Completion::Empty));
    }

    #[test]
    fn test_closed_connection_ignores_writes() {
        let mut sink = ResponseSink::new();
        let liveness = sink.liveness();
        assert!(sink.write("partial").is_written());
        liveness.close();
        assert!(!sink.is_alive());
        assert_eq!(sink.write("late"), WriteOutcome::Ignored);
        assert_eq!(sink.end(), WriteOutcome::Ignored);
        assert!(!sink.is_finished());
        assert_eq!(sink.body(), b"partial");
    }

    #[test]
    fn test_into_response() {
        let mut sink = ResponseSink::new();
        sink.set_status(StatusCode::CREATED);
        sink.insert_header(http::header::LOCATION, HeaderValue::from_static("/a"));
        sink.end_with("done");
        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[http::header::LOCATION], "/a");
        assert_eq!(response.body().as_ref(), b"done");
    }
}
