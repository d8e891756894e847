use std::{sync::Arc, time::Instant};

use axum::{
    Router,
    body::{Body as AxumBody, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::Response,
    routing::any,
};
use http_body_util::LengthLimitError;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    core::{
        Dispatcher, Outcome, RouteTable, RoutedRequest,
        outcome::{Fault, UpstreamResponse},
    },
    tracing_setup::create_request_span,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// JSON body sent to clients when a dispatch faults.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    request_id: String,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    service: &'static str,
    version: &'static str,
    route_table_version: u64,
    route_count: usize,
    routes: Vec<RouteStatus>,
}

#[derive(Debug, Serialize)]
struct RouteStatus {
    pattern: String,
    target: String,
    rewrite: Option<String>,
}

/// Inbound HTTP adapter: turns axum requests into [`RoutedRequest`]s, hands
/// them to the [`Dispatcher`] and renders the [`Outcome`].
#[derive(Clone)]
pub struct HttpHandler {
    dispatcher: Arc<Dispatcher>,
    max_body_bytes: usize,
    status_path: String,
}

impl HttpHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, max_body_bytes: usize, status_path: impl Into<String>) -> Self {
        Self {
            dispatcher,
            max_body_bytes,
            status_path: status_path.into(),
        }
    }

    pub fn status_path(&self) -> &str {
        &self.status_path
    }

    fn table(&self) -> &Arc<RouteTable> {
        self.dispatcher.matcher().table()
    }

    /// Build the axum router serving the status endpoint and proxying
    /// everything else. The status path is owned by the gateway for every
    /// method and is never proxied.
    pub fn router(self) -> Router {
        let status_path = self.status_path.clone();
        Router::new()
            .route(
                &status_path,
                any(|State(handler): State<Arc<HttpHandler>>, method: Method| async move {
                    handler.handle_status_request(&method)
                }),
            )
            .fallback(
                |State(handler): State<Arc<HttpHandler>>, req: Request| async move {
                    handler.handle_request(req).await
                },
            )
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::new(self))
    }

    /// Dispatch one inbound request. Never fails: every problem is rendered
    /// as an HTTP response.
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let (parts, body) = req.into_parts();

        if let Some(len) = declared_length(&parts.headers) {
            if len > self.max_body_bytes {
                tracing::info!(
                    "Refusing {} {}: declared body of {} bytes exceeds {}",
                    parts.method,
                    parts.uri.path(),
                    len,
                    self.max_body_bytes
                );
                return plain(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
        }

        let body = match to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) if is_length_limit(&e) => {
                return plain(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
            Err(e) => {
                tracing::warn!("Failed to read request body: {}", e);
                return plain(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let request = RoutedRequest::from_parts(parts, body);
        let span = create_request_span(
            request.method().as_str(),
            request.path(),
            &request.id().to_string(),
        );

        let started = Instant::now();
        let outcome = self
            .dispatcher
            .dispatch(&request)
            .instrument(span.clone())
            .await;
        let response = render_outcome(request.id(), outcome);

        span.record("http.status_code", response.status().as_u16());
        span.record("duration_ms", started.elapsed().as_millis() as u64);
        response
    }

    /// Answer a request to the status path: GET and HEAD get the status,
    /// other methods get 405.
    pub fn handle_status_request(&self, method: &Method) -> Response<AxumBody> {
        if *method == Method::GET || *method == Method::HEAD {
            return self.handle_status();
        }
        let mut response = plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
        response
    }

    /// Report the active route table as JSON.
    pub fn handle_status(&self) -> Response<AxumBody> {
        let snapshot = self.table().snapshot();
        let status = StatusBody {
            service: "junction",
            version: env!("CARGO_PKG_VERSION"),
            route_table_version: snapshot.version(),
            route_count: snapshot.len(),
            routes: snapshot
                .routes()
                .iter()
                .map(|route| RouteStatus {
                    pattern: route.pattern().to_string(),
                    target: route.target().to_string(),
                    rewrite: route.rewrite().map(str::to_string),
                })
                .collect(),
        };
        json(StatusCode::OK, &status)
    }
}

fn declared_length(headers: &axum::http::HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn render_outcome(request_id: Uuid, outcome: Outcome) -> Response<AxumBody> {
    let mut response = match outcome {
        Outcome::Success(upstream) => upstream_response(upstream),
        Outcome::Fault(fault) => fault_response(request_id, &fault),
    };
    if let Ok(id) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, id);
    }
    response
}

fn upstream_response(upstream: UpstreamResponse) -> Response<AxumBody> {
    let mut response = Response::new(AxumBody::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = upstream.headers;
    response
}

fn fault_response(request_id: Uuid, fault: &Fault) -> Response<AxumBody> {
    json(
        fault.kind.status_code(),
        &ErrorBody {
            error: fault.kind.as_str(),
            message: &fault.message,
            request_id: request_id.to_string(),
        },
    )
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<AxumBody> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(AxumBody::from(body));
            *response.status_mut() = status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => {
            tracing::error!("Failed to serialize response body: {}", e);
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<AxumBody> {
    let mut response = Response::new(AxumBody::from(message));
    *response.status_mut() = status;
    response
}
