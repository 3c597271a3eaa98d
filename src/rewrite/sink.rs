//! Response-writing capability.
//!
//! [`ResponseSink`] is what the rewriter decorates: status, mutable headers
//! and a single body write. [`HttpResponseSink`] is the real sink, backed by
//! the response parts that hyper eventually puts on the wire.

use std::future::Future;

use axum::body::Body;
use axum::http::response::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use futures_util::{Stream, StreamExt};

use crate::rewrite::error::RewriteError;

/// Something a response body can be written to exactly once.
pub trait ResponseSink: Send {
    fn status(&self) -> StatusCode;

    fn headers(&self) -> &HeaderMap;

    /// Headers may only be changed before [`write_with`](Self::write_with).
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Write the whole body.
    fn write_with(&mut self, body: Body) -> impl Future<Output = Result<(), RewriteError>> + Send;

    /// Write a sequence of bodies as one, in order.
    fn write_and_flush_with<St>(
        &mut self,
        bodies: St,
    ) -> impl Future<Output = Result<(), RewriteError>> + Send
    where
        St: Stream<Item = Body> + Send + 'static,
        Self: Sized,
    {
        let flattened = Body::from_stream(bodies.flat_map(Body::into_data_stream));
        self.write_with(flattened)
    }
}

/// The real response sink.
#[derive(Debug)]
pub struct HttpResponseSink {
    parts: Parts,
    body: Option<Body>,
}

impl HttpResponseSink {
    pub fn new(parts: Parts) -> Self {
        Self { parts, body: None }
    }

    /// Split a response into a sink over its head and its original body.
    pub fn from_response(response: Response) -> (Self, Body) {
        let (parts, body) = response.into_parts();
        (Self::new(parts), body)
    }

    /// Whether the body has been written.
    pub fn is_written(&self) -> bool {
        self.body.is_some()
    }

    /// Rebuild the response. An unwritten sink yields an empty body.
    pub fn into_response(self) -> Response {
        Response::from_parts(self.parts, self.body.unwrap_or_else(Body::empty))
    }
}

impl ResponseSink for HttpResponseSink {
    fn status(&self) -> StatusCode {
        self.parts.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    async fn write_with(&mut self, body: Body) -> Result<(), RewriteError> {
        if self.body.is_some() {
            return Err(RewriteError::AlreadyWritten);
        }
        self.body = Some(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_single_write() {
        let (mut sink, _) = HttpResponseSink::from_response(Response::new(Body::empty()));
        assert!(!sink.is_written());

        sink.write_with(Body::from("first")).await.unwrap();
        assert!(sink.is_written());

        let err = sink.write_with(Body::from("second")).await.unwrap_err();
        assert!(matches!(err, RewriteError::AlreadyWritten));

        let body = sink.into_response().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"first");
    }

    #[tokio::test]
    async fn test_write_and_flush_flattens_in_order() {
        let (mut sink, _) = HttpResponseSink::from_response(Response::new(Body::empty()));
        let bodies = stream::iter(vec![Body::from("a"), Body::from("bc"), Body::empty(), Body::from("d")]);

        sink.write_and_flush_with(bodies).await.unwrap();

        let body = sink.into_response().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"abcd");
    }

    #[test]
    fn test_unwritten_sink_has_empty_body() {
        let mut response = Response::new(Body::from("ignored"));
        *response.status_mut() = StatusCode::ACCEPTED;
        let (sink, _body) = HttpResponseSink::from_response(response);

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
