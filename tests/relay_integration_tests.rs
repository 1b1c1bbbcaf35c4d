use axum::{
    body::Body,
    extract::Multipart,
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use gemini_relay::{config::RelayConfig, router, state::RelayState};

const TEST_API_KEY: &str = "test-key";

/// Serve a fake upstream on an ephemeral port, returning its base URL.
async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Upstream accepting any path, answering with a canned two-fragment SSE
/// stream. Rejects requests without the expected API key header so the happy
/// path also proves key forwarding.
fn gemini_stub() -> Router {
    Router::new().fallback(|headers: HeaderMap| async move {
        let key_ok = headers
            .get("x-goog-api-key")
            .map(|value| value == TEST_API_KEY)
            .unwrap_or(false);
        if !key_ok {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"message": "API key not valid"}})),
            )
                .into_response();
        }

        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" world\"}]}}]}\r\n\r\n",
        );
        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/event-stream")
            .body(Body::from(body))
            .unwrap()
    })
}

fn relay_app(config: RelayConfig) -> Router {
    router(RelayState::new(config))
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn valid_chat_body() -> Value {
    json!({"contents": [{"role": "user", "parts": [{"text": "Hi"}]}]})
}

async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn chat_streams_ndjson_on_success() {
    let base = spawn_upstream(gemini_stub()).await;
    let app = relay_app(RelayConfig {
        gemini_api_key: Some(TEST_API_KEY.to_string()),
        gemini_api_base: base,
        ..RelayConfig::default()
    });

    let response = app.oneshot(chat_request(valid_chat_body())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/x-ndjson"
    );
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-cache");

    let body = body_string(response).await;
    assert_eq!(
        body,
        concat!(
            "{\"type\":\"chunk\",\"data\":\"Hello\"}\n",
            "{\"type\":\"chunk\",\"data\":\" world\"}\n",
            "{\"type\":\"end\",\"data\":null}\n",
        )
    );
}

#[tokio::test]
async fn chat_upstream_rejection_is_pre_stream_500_json() {
    let base = spawn_upstream(gemini_stub()).await;
    let app = relay_app(RelayConfig {
        // Wrong key: the stub rejects before any fragment is produced.
        gemini_api_key: Some("wrong-key".to_string()),
        gemini_api_base: base,
        ..RelayConfig::default()
    });

    let response = app.oneshot(chat_request(valid_chat_body())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let body = body_string(response).await;
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["error"], "API key not valid");
    // No NDJSON framing on the pre-stream path.
    assert!(!body.contains("\"type\""));
}

#[tokio::test]
async fn chat_unreachable_upstream_is_pre_stream_500_json() {
    // An upstream that closes every connection without responding.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        }
    });

    let app = relay_app(RelayConfig {
        gemini_api_key: Some(TEST_API_KEY.to_string()),
        gemini_api_base: format!("http://{}", addr),
        ..RelayConfig::default()
    });

    let response = app.oneshot(chat_request(valid_chat_body())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let value: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(value["error"].as_str().unwrap().contains("upstream request failed"));
}

#[tokio::test]
async fn chat_missing_api_key_is_pre_stream_500_json() {
    let app = relay_app(RelayConfig::default());

    let response = app.oneshot(chat_request(valid_chat_body())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let value: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(value["error"], "GEMINI_API_KEY is not configured");
}

#[tokio::test]
async fn chat_empty_contents_fails_fast() {
    let app = relay_app(RelayConfig {
        gemini_api_key: Some(TEST_API_KEY.to_string()),
        ..RelayConfig::default()
    });

    let response = app
        .oneshot(chat_request(json!({"contents": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(value["error"].as_str().unwrap().contains("non-empty"));
}

#[tokio::test]
async fn form_relay_forwards_fields_and_relays_status() {
    // Fake form handler echoing the field names it received.
    let form_stub = Router::new().fallback(|mut multipart: Multipart| async move {
        let mut names = Vec::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            names.push(field.name().unwrap_or_default().to_string());
            let _ = field.bytes().await.unwrap();
        }
        (StatusCode::CREATED, names.join(","))
    });
    let endpoint = spawn_upstream(form_stub).await;

    let app = relay_app(RelayConfig {
        form_endpoint: Some(endpoint),
        ..RelayConfig::default()
    });

    let boundary = "relay-test-boundary";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"your-name\"\r\n\r\n\
         Jane Doe\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"file-attachment\"; filename=\"quote.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         attachment body\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let request = Request::builder()
        .method("POST")
        .uri("/api/submit-quote")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    // Upstream status and body relayed unchanged.
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_string(response).await, "your-name,file-attachment");
}

#[tokio::test]
async fn form_relay_without_endpoint_is_500() {
    let app = relay_app(RelayConfig::default());

    let boundary = "relay-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"your-name\"\r\n\r\nJane\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/submit-quote")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "Internal Server Error");
}

#[tokio::test]
async fn cors_preflight_allows_only_configured_origin() {
    let app = relay_app(RelayConfig {
        allowed_origin: Some("https://frontend.example".to_string()),
        ..RelayConfig::default()
    });

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/chat")
        .header(header::ORIGIN, "https://frontend.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(preflight).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://frontend.example"
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );

    // A different origin gets no allowance.
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/chat")
        .header(header::ORIGIN, "https://other.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(preflight).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
