//! Filter orchestrator.
//!
//! # Responsibilities
//! - Wrap the proxy service as a tower layer
//! - For responses tagged with [`RouteTransform`], decorate the real sink
//!   with a [`ResponseRewriter`] and drive its single write
//! - Surface pipeline failures as the service error
//!
//! # Ordering
//! The layer sits directly around the proxy handler, so it is the last
//! stage that touches the body before hyper writes it out. Layers that only
//! touch headers (request-id propagation, tracing) wrap it from outside and
//! still see the finalized response.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use tower::{Layer, Service};

use crate::observability::metrics;
use crate::rewrite::error::{BoxError, RewriteError};
use crate::rewrite::rewriter::{ResponseRewriter, RewritePolicy};
use crate::rewrite::sink::{HttpResponseSink, ResponseSink};
use crate::rewrite::transform::TransformConfig;

/// Response extension asking for the body to be rewritten.
///
/// The route handler inserts it for routes that configure a transform.
#[derive(Debug, Clone)]
pub struct RouteTransform {
    pub route: Arc<str>,
    pub config: Arc<TransformConfig>,
}

/// Layer installing [`RewriteService`].
#[derive(Debug, Clone)]
pub struct RewriteLayer {
    policy: RewritePolicy,
}

impl RewriteLayer {
    pub fn new(policy: RewritePolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for RewriteLayer {
    type Service = RewriteService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RewriteService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

/// Service rewriting tagged response bodies of the inner service.
#[derive(Debug, Clone)]
pub struct RewriteService<S> {
    inner: S,
    policy: RewritePolicy,
}

impl<S> Service<Request<Body>> for RewriteService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // Keep the instance that was driven ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let policy = self.policy.clone();
        let head = request.method() == Method::HEAD;

        Box::pin(async move {
            let mut response = inner.call(request).await.map_err(Into::into)?;

            let Some(route) = response.extensions_mut().remove::<RouteTransform>() else {
                return Ok(response);
            };

            // Upstream framing headers stay authoritative when there is no body.
            if head || !status_has_body(response.status()) {
                tracing::trace!(route = %route.route, status = %response.status(), "No body to rewrite");
                return Ok(response);
            }

            rewrite_response(response, &route, policy)
                .await
                .map_err(BoxError::from)
        })
    }
}

/// Whether a response with this status may carry a body.
fn status_has_body(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}

/// Run the rewrite pipeline over one response.
pub async fn rewrite_response(
    response: Response,
    route: &RouteTransform,
    policy: RewritePolicy,
) -> Result<Response, RewriteError> {
    let (sink, body) = HttpResponseSink::from_response(response);
    let mut rewriter = ResponseRewriter::new(sink, policy, Arc::clone(&route.config));

    match rewriter.write_with(body).await {
        Ok(()) => {
            let response = rewriter.into_inner().into_response();
            let bytes = response
                .headers()
                .get(axum::http::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            tracing::debug!(route = %route.route, bytes = ?bytes, "Response body rewritten");
            metrics::record_rewrite("ok", bytes);
            Ok(response)
        }
        Err(e) => {
            tracing::error!(
                route = %route.route,
                error = %e,
                state = ?rewriter.state(),
                "Response body rewrite failed"
            );
            metrics::record_rewrite(e.kind(), None);
            Err(e)
        }
    }
}
