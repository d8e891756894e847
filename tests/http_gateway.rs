// End-to-end: a real axum upstream behind the gateway router.
#[cfg(test)]
mod test {
    use std::{net::SocketAddr, sync::Arc, time::Duration};

    use axum::{
        Router,
        extract::Request,
        http::{StatusCode, header},
        routing::any,
    };
    use junction::{Dispatcher, HttpHandler, HyperTransport, Matcher, Route, RouteTable};
    use tokio::net::TcpListener;

    async fn spawn(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Upstream that echoes what it received.
    async fn spawn_upstream() -> SocketAddr {
        let app = Router::new()
            .route(
                "/slow",
                any(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "too late"
                }),
            )
            .fallback(any(|req: Request| async move {
                let target = req.uri().to_string();
                let forwarded_host = req
                    .headers()
                    .get("x-forwarded-host")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
                    .to_string();
                let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                    .await
                    .unwrap_or_default();
                (
                    StatusCode::OK,
                    [("x-forwarded-host-seen", forwarded_host)],
                    format!("{target}|{}", String::from_utf8_lossy(&body)),
                )
            }));
        spawn(app).await
    }

    async fn spawn_gateway(upstream: SocketAddr, timeout: Duration) -> (SocketAddr, Arc<RouteTable>) {
        let table = Arc::new(
            RouteTable::from_routes([
                Route::new("/api/*", &format!("http://{upstream}"), Some("/internal")).unwrap(),
                Route::new("/slow", &format!("http://{upstream}"), None).unwrap(),
                Route::new("/dead", "http://127.0.0.1:9", None).unwrap(),
            ])
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(
            Matcher::new(table.clone()),
            Arc::new(HyperTransport::new().unwrap()),
        )
        .with_timeout(timeout);
        let handler = HttpHandler::new(Arc::new(dispatcher), 1024, "/_junction/status");
        (spawn(handler.router()).await, table)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_is_forwarded_to_upstream() {
        let upstream = spawn_upstream().await;
        let (gateway, _) = spawn_gateway(upstream, Duration::from_secs(5)).await;

        let response = reqwest::Client::new()
            .post(format!("http://{gateway}/api/users?limit=5"))
            .body("payload")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-forwarded-host-seen").unwrap(),
            gateway.to_string().as_str()
        );
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.text().await.unwrap(), "/internal/users?limit=5|payload");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_faults_map_to_statuses() {
        let upstream = spawn_upstream().await;
        let (gateway, _) = spawn_gateway(upstream, Duration::from_millis(200)).await;
        let client = reqwest::Client::new();

        let not_found = client
            .get(format!("http://{gateway}/unknown"))
            .send()
            .await
            .unwrap();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            not_found.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: serde_json::Value = not_found.json().await.unwrap();
        assert_eq!(body["error"], "no_route");

        let timed_out = client
            .get(format!("http://{gateway}/slow"))
            .send()
            .await
            .unwrap();
        assert_eq!(timed_out.status(), StatusCode::GATEWAY_TIMEOUT);

        let unreachable = client
            .get(format!("http://{gateway}/dead"))
            .send()
            .await
            .unwrap();
        assert_eq!(unreachable.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_route_changes_apply_without_restart() {
        let upstream = spawn_upstream().await;
        let (gateway, table) = spawn_gateway(upstream, Duration::from_secs(5)).await;
        let client = reqwest::Client::new();

        let before = client
            .get(format!("http://{gateway}/new/thing"))
            .send()
            .await
            .unwrap();
        assert_eq!(before.status(), StatusCode::NOT_FOUND);

        table
            .register(Route::new("/new", &format!("http://{upstream}"), None).unwrap())
            .unwrap();

        let after = client
            .get(format!("http://{gateway}/new/thing"))
            .send()
            .await
            .unwrap();
        assert_eq!(after.status(), StatusCode::OK);

        let status: serde_json::Value = client
            .get(format!("http://{gateway}/_junction/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["route_count"], 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_status_path_is_not_proxied() {
        let upstream = spawn_upstream().await;
        let (gateway, table) = spawn_gateway(upstream, Duration::from_secs(5)).await;
        table
            .register(Route::new("/_junction", &format!("http://{upstream}"), None).unwrap())
            .unwrap();

        let response = reqwest::Client::new()
            .post(format!("http://{gateway}/_junction/status"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET, HEAD");
    }
}
