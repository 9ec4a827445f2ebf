use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::StatusCode;
use serde_json::{Value, json};

use gatehouse_api::app;
use gatehouse_core::{
    ApiError, ApiRegistry, ApiResponse, EndpointDescriptor, HandlerArgs, HandlerRef, Method,
    ParamSpec, ParamType, codes,
};

struct TestServer {
    base_url: String,
    stopped: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Spawn the real router on an ephemeral port around a test registry of
    /// pure handlers; no database required.
    async fn spawn(registry: ApiRegistry) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let app = app::build_app(Arc::new(registry), stopped.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            stopped,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn test_registry() -> ApiRegistry {
    let mut registry = ApiRegistry::new();

    registry
        .register(
            "echo",
            EndpointDescriptor::new(
                Method::Get,
                HandlerRef::from_sync(|args: HandlerArgs| {
                    ApiResponse::success(json!({"a": args.int("a")?, "b": args.str("b")?}))
                }),
            )
            .with_param(ParamSpec::query("a", ParamType::Int))
            .with_param(ParamSpec::query("b", ParamType::Str).with_default("x")),
        )
        .unwrap();

    registry
        .register(
            "submit",
            EndpointDescriptor::new(
                Method::Post,
                HandlerRef::from_async(|args: HandlerArgs| async move {
                    ApiResponse::success(args.body()?.clone())
                }),
            )
            .with_param(ParamSpec::body()),
        )
        .unwrap();

    registry
        .register(
            "fail",
            EndpointDescriptor::new(
                Method::Get,
                HandlerRef::from_sync(|_| {
                    Err(ApiError::api(codes::RECORD_NOT_EXISTS, "no such record"))
                }),
            ),
        )
        .unwrap();

    // Fault-tolerance path: an entry that lost its handler.
    registry.register_unchecked("ghost", EndpointDescriptor::without_handler(Method::Get));

    gatehouse_api::app::endpoints::system::register(&mut registry).unwrap();

    registry
}

#[tokio::test]
async fn query_binding_coerces_and_fills_defaults() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/echo?a=5", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"code": 0, "data": {"a": 5, "b": "x"}}));
}

#[tokio::test]
async fn bad_coercion_is_a_400_naming_the_parameter() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/echo?a=five", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), "Invalid value for parameter 'a'");
}

#[tokio::test]
async fn missing_required_parameter_is_a_400() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/echo", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), "Missing required parameter: a");
}

#[tokio::test]
async fn body_round_trips_through_the_envelope() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/submit", srv.base_url))
        .json(&json!({"name": "kira", "age": 3}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"code": 0, "data": {"name": "kira", "age": 3}}));
}

#[tokio::test]
async fn post_without_body_never_reaches_the_handler() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/submit", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), "Request body is required");
}

#[tokio::test]
async fn array_body_is_rejected() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/submit", srv.base_url))
        .json(&json!([1, 2, 3]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), "JSON body must be an object");
}

#[tokio::test]
async fn body_endpoint_rejects_get_even_with_a_body() {
    let mut registry = test_registry();
    registry
        .register(
            "getful",
            EndpointDescriptor::new(
                Method::Get,
                HandlerRef::from_sync(|_| Ok(ApiResponse::ok())),
            )
            .with_param(ParamSpec::body()),
        )
        .unwrap();
    let srv = TestServer::spawn(registry).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/getful", srv.base_url))
        .body(r#"{"k": 1}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.text().await.unwrap(),
        "Request body not allowed for this method"
    );
}

#[tokio::test]
async fn unknown_endpoint_is_a_404_with_the_exact_body() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/frobnicate", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.text().await.unwrap(),
        "API frobnicate with method GET not found"
    );
}

#[tokio::test]
async fn handlerless_descriptor_is_a_500() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/ghost", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        res.text().await.unwrap(),
        "API ghost has no callable function registered"
    );
}

#[tokio::test]
async fn business_errors_keep_http_200() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/fail", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"code": 410, "message": "no such record"}));
}

#[tokio::test]
async fn health_reports_ok_then_stop() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/__check", srv.base_url);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "OK");

    srv.stopped.store(true, Ordering::Relaxed);
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "STOP");
}

#[tokio::test]
async fn request_context_is_bound_per_call() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/whoami", srv.base_url))
        .header("x-forwarded-for", "203.0.113.9")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["api_name"], json!("whoami"));
    assert_eq!(body["data"]["api_method"], json!("GET"));
    assert_eq!(body["data"]["path"], json!("/api/whoami"));
    assert_eq!(body["data"]["remote_addr"], json!("203.0.113.9"));
    assert_eq!(body["data"]["auth"], json!(false));
}

#[tokio::test]
async fn unmatched_routes_fall_back_to_plain_404() {
    let srv = TestServer::spawn(test_registry()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/somewhere/else", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "404 not found");
}
