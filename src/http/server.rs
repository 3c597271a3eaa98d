//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (request ID, tracing, timeout, body rewrite)
//! - Dispatch requests to the routing engine
//! - Forward requests to upstreams, streaming both directions
//! - Tag responses of transforming routes for the rewrite layer
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → HandleError(502)
//!     → Timeout → Rewrite → proxy_handler
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{ConnectInfo, State},
    http::{
        uri::{Authority, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::Span;

use crate::config::GatewayConfig;
use crate::http::request::{append_forwarded_for, strip_hop_by_hop, MakeRequestUuid, RequestIdExt};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::rewrite::error::BoxError;
use crate::rewrite::{
    BodyTransform, CodecPool, CodecRegistry, RewriteError, RewriteLayer, RewritePolicy, RouteTransform,
    Uppercase,
};
use crate::routing::Router as ProxyRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a server that uppercases bodies on transforming routes.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_transform(config, Arc::new(Uppercase))
    }

    /// Create a server with a custom body transform.
    pub fn with_transform(config: GatewayConfig, transform: Arc<dyn BodyTransform>) -> Self {
        let proxy_router = Arc::new(ProxyRouter::from_config(config.routes.clone()));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let policy = RewritePolicy::new(
            Arc::new(CodecRegistry::with_defaults()),
            transform,
            CodecPool::new(config.rewrite.worker_permits),
        )
        .with_max_body_bytes(config.rewrite.max_body_bytes);

        let state = AppState {
            router: proxy_router,
            client,
        };

        let router = Self::build_router(&config, state, policy);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, policy: RewritePolicy) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(HandleErrorLayer::new(handle_rewrite_error))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                    .layer(RewriteLayer::new(policy)),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.config.routes.len(), "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::recv(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The fully layered router, for driving without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }
}

fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = request.request_id().unwrap_or("unknown"),
    )
}

/// Map a failed rewrite to a gateway error. The original body is gone.
async fn handle_rewrite_error(err: BoxError) -> Response {
    match err.downcast_ref::<RewriteError>() {
        Some(RewriteError::BodyTooLarge { limit }) => {
            tracing::warn!(limit, "Upstream body exceeded rewrite limit");
            (StatusCode::BAD_GATEWAY, "Upstream response too large to rewrite").into_response()
        }
        Some(e) => {
            tracing::warn!(error = %e, kind = e.kind(), "Rewrite failed");
            (StatusCode::BAD_GATEWAY, "Upstream response could not be rewritten").into_response()
        }
        None => {
            tracing::error!(error = %err, "Unhandled service error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// Main proxy handler.
/// Looks up the route and forwards the request to its upstream.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request.request_id().unwrap_or("unknown").to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    tracing::debug!(request_id = %request_id, method = %method, path = %path, "Proxying request");

    // 1. Match Route
    let Some(route) = state.router.match_request(&request) else {
        tracing::warn!(request_id = %request_id, path = %path, "No route matched");
        metrics::record_request(&method, 404, "none", start_time);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };
    let route_name = Arc::clone(&route.name);
    let transform = route.transform.clone();

    // 2. Rewrite the request for the upstream
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (mut parts, body) = request.into_parts();

    let uri = match upstream_uri(parts.uri, route.upstream.clone()) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            metrics::record_request(&method, 502, &route_name, start_time);
            return (StatusCode::BAD_GATEWAY, "Invalid upstream").into_response();
        }
    };
    parts.uri = uri;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    if let Some(addr) = client_addr {
        append_forwarded_for(&mut parts.headers, addr);
    }

    // 3. Forward, streaming the request body
    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_request(&method, status.as_u16(), &route_name, start_time);
            tracing::debug!(request_id = %request_id, route = %route_name, status = %status, "Upstream responded");

            let mut response = into_gateway_response(response);
            if let Some(config) = transform {
                response.extensions_mut().insert(RouteTransform {
                    route: route_name,
                    config,
                });
            }
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route_name, error = %e, "Upstream error");
            metrics::record_request(&method, 502, &route_name, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Hand the upstream response to axum, keeping its body streaming.
/// Connection-scoped headers from the upstream hop are dropped.
fn into_gateway_response(response: Response<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

fn upstream_uri(uri: Uri, authority: Authority) -> Result<Uri, axum::http::uri::InvalidUriParts> {
    let mut uri_parts = uri.into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(axum::http::uri::PathAndQuery::from_static("/"));
    }
    Uri::from_parts(uri_parts)
}
