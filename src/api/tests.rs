use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;

use super::create_router;
use super::response::UploadReply;
use crate::assembler::BlobManifest;
use crate::config::UploadMode;
use crate::testutil::{test_state, test_state_with};
use crate::AppState;

const BOUNDARY: &str = "tgstate-test-boundary";

fn multipart_upload(uri: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(state: &std::sync::Arc<AppState>, request: Request<Body>) -> Response {
    create_router(std::sync::Arc::clone(state))
        .oneshot(request)
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn upload_reply(response: Response) -> UploadReply {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_upload_then_download() {
    let dir = tempfile::tempdir().unwrap();
    let (state, gateway) = test_state(&dir);

    let response = send(&state, multipart_upload("/api", "hello.txt", b"hello")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply = upload_reply(response).await;
    assert_eq!(reply.code, 1);
    assert!(reply.message.starts_with("/d/"));
    assert_eq!(reply.url, format!("https://files.example.com{}", reply.message));

    let response = send(&state, get(&reply.message)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_TYPE),
        Some("text/plain; charset=utf-8")
    );
    assert_eq!(
        header_str(&response, header::CONTENT_DISPOSITION),
        Some("inline")
    );
    assert_eq!(body_bytes(response).await, b"hello");

    // The caption edit runs detached after the reply
    for _ in 0..100 {
        if !gateway.captions().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let captions = gateway.captions();
    assert_eq!(captions.len(), 1);
    assert_eq!(captions[0].text, reply.url);
}

#[tokio::test]
async fn test_each_upload_gets_its_own_short_id() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _gateway) = test_state(&dir);

    let first = upload_reply(send(&state, multipart_upload("/api", "a.txt", b"a")).await).await;
    let second = upload_reply(send(&state, multipart_upload("/api", "b.txt", b"b")).await).await;

    // Different uploads get different backend refs, hence different IDs
    assert_ne!(first.message, second.message);
    assert_eq!(state.store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_upload_without_base_url_skips_caption() {
    let dir = tempfile::tempdir().unwrap();
    let (state, gateway) = test_state_with(&dir, |config| config.base_url = None);

    let reply = upload_reply(send(&state, multipart_upload("/api", "a.txt", b"abc")).await).await;
    assert_eq!(reply.code, 1);
    assert!(reply.url.is_empty());

    tokio::task::yield_now().await;
    assert!(gateway.captions().is_empty());
}

#[tokio::test]
async fn test_image_mode_rejects_other_files() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _gateway) = test_state_with(&dir, |config| config.mode = UploadMode::Images);

    let response = send(&state, multipart_upload("/api", "notes.txt", b"text")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let reply = upload_reply(response).await;
    assert_eq!(reply.code, 0);

    let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    let response = send(&state, multipart_upload("/api", "cat.png", png)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_requires_password_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _gateway) =
        test_state_with(&dir, |config| config.password = Some("secret".to_string()));

    let response = send(&state, multipart_upload("/api", "a.txt", b"a")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(upload_reply(response).await.code, 0);

    let response = send(&state, multipart_upload("/api?pass=wrong", "a.txt", b"a")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&state, multipart_upload("/api?pass=secret", "a.txt", b"a")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut request = multipart_upload("/api", "a.txt", b"a");
    request
        .headers_mut()
        .insert(header::COOKIE, "p=secret".parse().unwrap());
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_downloads_stay_open_with_password() {
    let dir = tempfile::tempdir().unwrap();
    let (state, gateway) =
        test_state_with(&dir, |config| config.password = Some("secret".to_string()));
    gateway.insert("F1", "hello");
    let short_id = state.store.generate_and_save("F1").unwrap();

    let response = send(&state, get(&format!("/d/{short_id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_short_id_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _gateway) = test_state(&dir);

    let response = send(&state, get("/d/abc123")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&state, get("/d/not-a-short-id")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_content_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (state, gateway) = test_state(&dir);
    gateway.insert("F1", "hello");
    gateway.expire("F1");
    let short_id = state.store.generate_and_save("F1").unwrap();

    let response = send(&state, get(&format!("/d/{short_id}"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unresolvable_download_url_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let (state, gateway) = test_state(&dir);
    gateway.insert("F1", "hello");
    gateway.fail_url_lookups("F1", 1);
    let short_id = state.store.generate_and_save("F1").unwrap();

    let response = send(&state, get(&format!("/d/{short_id}"))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_chunked_blob_download() {
    let dir = tempfile::tempdir().unwrap();
    let (state, gateway) = test_state(&dir);
    gateway.insert("F-c1", "12345");
    gateway.insert("F-c2", "67890");
    let c1 = state.store.generate_and_save("F-c1").unwrap();
    let c2 = state.store.generate_and_save("F-c2").unwrap();

    let manifest = BlobManifest {
        filename: "big.bin".to_string(),
        size: Some(10),
        chunks: vec![c1, c2],
    };
    gateway.insert("F-m", manifest.encode());
    let short_id = state.store.generate_and_save("F-m").unwrap();

    let response = send(&state, get(&format!("/d/{short_id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_TYPE),
        Some("application/octet-stream")
    );
    assert_eq!(
        header_str(&response, header::CONTENT_DISPOSITION),
        Some("attachment; filename=\"big.bin\"")
    );
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("10"));
    assert_eq!(body_bytes(response).await, b"1234567890");
}

#[tokio::test]
async fn test_chunked_blob_with_missing_chunk_aborts_body() {
    let dir = tempfile::tempdir().unwrap();
    let (state, gateway) = test_state(&dir);
    gateway.insert("F-c1", "12345");
    let c1 = state.store.generate_and_save("F-c1").unwrap();

    gateway.insert("F-m", format!("tgstate-blob\nbig.bin\n{c1}\nzzzzzz"));
    let short_id = state.store.generate_and_save("F-m").unwrap();

    let response = send(&state, get(&format!("/d/{short_id}"))).await;
    // Headers were already committed when the missing chunk was reached
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
}

#[tokio::test]
async fn test_malformed_manifest_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let (state, gateway) = test_state(&dir);
    gateway.insert("F-m", "tgstate-blob\nbig.bin");
    let short_id = state.store.generate_and_save("F-m").unwrap();

    let response = send(&state, get(&format!("/d/{short_id}"))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health_reports_short_id_count() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _gateway) = test_state(&dir);
    state.store.generate_and_save("F1").unwrap();

    let response = send(&state, get("/_internal/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["short_ids"], 1);
}

#[tokio::test]
async fn test_password_form_sets_cookie() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _gateway) = test_state(&dir);

    let request = Request::builder()
        .method("POST")
        .uri("/pwd")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("p=secret"))
        .unwrap();
    let response = send(&state, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_str(&response, header::LOCATION), Some("/"));
    let cookie = header_str(&response, header::SET_COOKIE).unwrap();
    assert!(cookie.starts_with("p=secret;"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
}

#[tokio::test]
async fn test_password_cookie_round_trips_separators() {
    let dir = tempfile::tempdir().unwrap();
    let password = "a b;c,d";
    let (state, _gateway) =
        test_state_with(&dir, |config| config.password = Some(password.to_string()));

    let request = Request::builder()
        .method("POST")
        .uri("/pwd")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("p=a+b%3Bc%2Cd"))
        .unwrap();
    let response = send(&state, request).await;
    let set_cookie = header_str(&response, header::SET_COOKIE).unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    assert_eq!(cookie, "p=a%20b%3Bc%2Cd");

    let mut request = multipart_upload("/api", "a.txt", b"a");
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}
