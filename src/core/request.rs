use bytes::Bytes;
use http::{HeaderMap, Method, Uri, request::Parts, uri::Scheme};
use uuid::Uuid;

/// Read-only view of an inbound request as it moves through the matcher and
/// dispatcher. Created per call and dropped once an outcome is produced.
#[derive(Debug, Clone)]
pub struct RoutedRequest {
    id: Uuid,
    method: Method,
    scheme: Option<Scheme>,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl RoutedRequest {
    /// Create a request for `method` and `uri`. Only the path and query of
    /// the URI are kept.
    pub fn new(method: Method, uri: &Uri) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            scheme: uri.scheme().cloned(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let mut request = Self::new(parts.method, &parts.uri);
        request.headers = parts.headers;
        request.body = body;
        request
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Scheme of the inbound URI, present only for absolute-form requests.
    pub fn scheme(&self) -> Option<&Scheme> {
        self.scheme.as_ref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_keeps_path_query_and_headers() {
        let (parts, ()) = http::Request::builder()
            .method(Method::POST)
            .uri("http://gateway.local/api/items?page=2")
            .header("x-trace", "abc")
            .body(())
            .unwrap()
            .into_parts();

        let request = RoutedRequest::from_parts(parts, Bytes::from_static(b"{}"));
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.path(), "/api/items");
        assert_eq!(request.scheme(), Some(&Scheme::HTTP));
        assert_eq!(request.query(), Some("page=2"));
        assert_eq!(request.headers().get("x-trace").unwrap(), "abc");
        assert_eq!(request.body().as_ref(), b"{}");
    }

    #[test]
    fn test_ids_are_unique() {
        let uri: Uri = "/x".parse().unwrap();
        let a = RoutedRequest::new(Method::GET, &uri);
        let b = RoutedRequest::new(Method::GET, &uri);
        assert_ne!(a.id(), b.id());
    }
}
