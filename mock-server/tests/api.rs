use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, Product, Upload};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

fn multipart_request(boundary: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/uploads/")
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(body.to_string())
        .unwrap()
}

// --- products ---

#[tokio::test]
async fn get_seeded_product() {
    let resp = app()
        .oneshot(empty_request("GET", "/api/v1/products/1111/"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let product: Product = body_json(resp).await;
    assert_eq!(product.title, "Desk lamp");
}

#[tokio::test]
async fn get_unknown_product_is_404_json() {
    let resp = app()
        .oneshot(empty_request("GET", "/api/v1/products/9999/"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "not found");
}

#[tokio::test]
async fn delete_product_then_get_is_404() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", "/api/v1/products/1111/"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/api/v1/products/1111/"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", "/api/v1/products/1111/"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- echo ---

#[tokio::test]
async fn echo_reports_query_and_headers() {
    let request = Request::builder()
        .uri("/api/v1/echo/?q=red%20lamp&tag=a&tag=b")
        .header(http::header::USER_AGENT, "courier/1.0.0")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.query.as_deref(), Some("q=red%20lamp&tag=a&tag=b"));
    assert_eq!(echo.user_agent.as_deref(), Some("courier/1.0.0"));
}

#[tokio::test]
async fn echo_reports_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/echo/")
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body("a=1&b=2".to_string())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.body, "a=1&b=2");
    assert_eq!(
        echo.content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );
}

// --- failures ---

#[tokio::test]
async fn bad_request_is_400_with_json() {
    let resp = app()
        .oneshot(empty_request("POST", "/api/v1/bad/"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "bad request");
}

#[tokio::test]
async fn text_route_is_not_json() {
    let resp = app()
        .oneshot(empty_request("GET", "/api/v1/text/"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert!(serde_json::from_slice::<serde_json::Value>(&body).is_err());
}

// --- uploads ---

#[tokio::test]
async fn upload_accepts_well_formed_body() {
    let body = "--B\r\n\
Content-Disposition: form-data; name=\"avatar\"; filename=\"a.jpg\"\r\n\
Content-Type: image/jpeg\r\n\r\n\
xy\r\n\
\r\n--B--\r\n";
    let resp = app()
        .oneshot(multipart_request("B", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let upload: Upload = body_json(resp).await;
    assert_eq!(upload.filename, "a.jpg");
    assert_eq!(upload.bytes, body.len());
}

#[tokio::test]
async fn upload_rejects_wrong_boundary() {
    let resp = app()
        .oneshot(multipart_request("OTHER", "--B\r\n\r\n--B--\r\n"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_requires_multipart_content_type() {
    let resp = app()
        .oneshot(empty_request("POST", "/api/v1/uploads/"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
