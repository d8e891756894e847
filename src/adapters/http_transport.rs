use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use eyre::Result;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Uri, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tokio::time::timeout;

use crate::{
    core::{outcome::UpstreamResponse, request::RoutedRequest},
    ports::transport::{TransportError, TransportResult, UpstreamTransport},
};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

// Hop-by-hop headers are connection scoped and never forwarded.
const HOP_BY_HOP: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Upstream transport using Hyper with Rustls. Upstream connections speak HTTP/1.1.
///
/// Responsibilities:
/// * Rewrites the Host header to the upstream authority
/// * Adds `X-Forwarded-*` and `X-Request-Id` headers; an inbound
///   `X-Forwarded-Proto` set by an outer proxy is kept
/// * Strips hop-by-hop headers in both directions
/// * Buffers the upstream response body under the caller's timeout
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HyperTransport {
    /// Create a new transport.
    pub fn new() -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::info!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https_connector);

        tracing::info!("Created upstream HTTP transport");
        Ok(Self { client })
    }

    /// Build the outgoing request for `target` from a routed request.
    fn build_request(
        request: &RoutedRequest,
        target: &Uri,
    ) -> TransportResult<Request<Full<Bytes>>> {
        let authority = target.authority().ok_or_else(|| {
            TransportError::InvalidRequest(format!("Outgoing URI has no host: {target}"))
        })?;

        let mut outgoing = Request::builder()
            .method(request.method().clone())
            .uri(target.clone())
            .version(Version::HTTP_11)
            .body(Full::new(request.body().clone()))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let headers = outgoing.headers_mut();
        headers.extend(request.headers().clone());
        for name in &HOP_BY_HOP {
            headers.remove(name);
        }

        let original_host = headers.remove(header::HOST);
        let host = HeaderValue::from_str(authority.as_str())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        headers.insert(header::HOST, host);

        if let Some(original_host) = original_host {
            headers.insert("x-forwarded-host", original_host);
        }
        if !headers.contains_key(X_FORWARDED_PROTO) {
            let proto = request.scheme().map_or("http", |s| s.as_str());
            let proto = HeaderValue::from_str(proto)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            headers.insert(X_FORWARDED_PROTO, proto);
        }
        if let Ok(id) = HeaderValue::from_str(&request.id().to_string()) {
            headers.insert("x-request-id", id);
        }

        Ok(outgoing)
    }
}

#[async_trait]
impl UpstreamTransport for HyperTransport {
    async fn send(
        &self,
        request: &RoutedRequest,
        target: &Uri,
        timeout_after: Duration,
    ) -> TransportResult<UpstreamResponse> {
        let outgoing = Self::build_request(request, target)?;
        let client = self.client.clone();

        tracing::debug!(
            "Sending request: {} {} (request id {})",
            outgoing.method(),
            outgoing.uri(),
            request.id()
        );

        let exchange = async move {
            let response = client.request(outgoing).await.map_err(|e| {
                if e.is_connect() {
                    TransportError::Connect(format!("{target}: {e}"))
                } else {
                    TransportError::Io(format!("{target}: {e}"))
                }
            })?;

            let (mut parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| TransportError::Io(format!("Failed reading body from {target}: {e}")))?
                .to_bytes();

            // The body is buffered, so framing headers no longer apply.
            parts.headers.remove(header::TRANSFER_ENCODING);
            for name in &HOP_BY_HOP {
                parts.headers.remove(name);
            }

            tracing::Span::current().record("http.status_code", parts.status.as_u16());
            Ok::<_, TransportError>(UpstreamResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        match timeout(timeout_after, exchange).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::warn!("Upstream request to {} failed: {}", target, e);
                }
                result
            }
            Err(_) => {
                tracing::warn!("Upstream request to {} timed out after {:?}", target, timeout_after);
                Err(TransportError::Timeout(timeout_after))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, Method};

    use super::*;

    fn routed(headers: HeaderMap) -> RoutedRequest {
        RoutedRequest::new(Method::PUT, &"/api/items?x=1".parse().unwrap())
            .with_headers(headers)
            .with_body("payload")
    }

    #[test]
    fn test_build_request_rewrites_host_and_strips_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.example"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("x-custom", HeaderValue::from_static("1"));

        let target: Uri = "http://backend:8080/items?x=1".parse().unwrap();
        let outgoing = HyperTransport::build_request(&routed(headers), &target).unwrap();

        assert_eq!(outgoing.method(), Method::PUT);
        assert_eq!(outgoing.uri(), &target);
        let headers = outgoing.headers();
        assert_eq!(headers.get(header::HOST).unwrap(), "backend:8080");
        assert_eq!(headers.get("x-forwarded-host").unwrap(), "gateway.example");
        assert_eq!(headers.get("x-custom").unwrap(), "1");
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.contains_key("x-request-id"));
    }

    #[test]
    fn test_forwarded_proto_follows_inbound_request() {
        let target: Uri = "http://backend:8080/items".parse().unwrap();

        let plain = HyperTransport::build_request(&routed(HeaderMap::new()), &target).unwrap();
        assert_eq!(plain.headers().get(X_FORWARDED_PROTO).unwrap(), "http");

        let absolute = RoutedRequest::new(Method::GET, &"https://gateway.example/api".parse().unwrap());
        let outgoing = HyperTransport::build_request(&absolute, &target).unwrap();
        assert_eq!(outgoing.headers().get(X_FORWARDED_PROTO).unwrap(), "https");

        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        let outgoing = HyperTransport::build_request(&routed(headers), &target).unwrap();
        assert_eq!(outgoing.headers().get(X_FORWARDED_PROTO).unwrap(), "https");
    }

    #[test]
    fn test_build_request_requires_authority() {
        let target: Uri = "/relative".parse().unwrap();
        assert!(matches!(
            HyperTransport::build_request(&routed(HeaderMap::new()), &target),
            Err(TransportError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_connect_error() {
        let transport = HyperTransport::new().unwrap();
        // Port 9 (discard) on loopback is closed in test environments.
        let target: Uri = "http://127.0.0.1:9/".parse().unwrap();
        let result = transport
            .send(&routed(HeaderMap::new()), &target, Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
