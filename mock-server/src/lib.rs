use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub title: String,
}

/// What the server saw of a request, echoed back as JSON.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub body: String,
}

/// Summary of a received multipart upload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Upload {
    pub id: Uuid,
    pub filename: String,
    pub bytes: usize,
}

pub type Db = Arc<RwLock<HashMap<String, Product>>>;

pub fn app() -> Router {
    let mut seed = HashMap::new();
    seed.insert(
        "1111".to_string(),
        Product {
            id: "1111".to_string(),
            title: "Desk lamp".to_string(),
        },
    );
    let db: Db = Arc::new(RwLock::new(seed));
    Router::new()
        .route(
            "/api/v1/products/{id}/",
            get(get_product).delete(delete_product),
        )
        .route("/api/v1/echo/", get(echo).post(echo).put(echo).delete(echo))
        .route("/api/v1/bad/", post(bad_request))
        .route("/api/v1/broken/", get(server_error))
        .route("/api/v1/text/", get(plain_text))
        .route("/api/v1/uploads/", post(upload))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn get_product(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Product>, (StatusCode, Json<Value>)> {
    let products = db.read().await;
    products
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))))
}

async fn delete_product(State(db): State<Db>, Path(id): Path<String>) -> StatusCode {
    let mut products = db.write().await;
    products
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .unwrap_or(StatusCode::NOT_FOUND)
}

async fn echo(
    method: axum::http::Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(Echo {
        method: method.to_string(),
        query,
        content_type: header_text(header::CONTENT_TYPE),
        user_agent: header_text(header::USER_AGENT),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn bad_request() -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": "bad request"})))
}

async fn server_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "boom"})),
    )
}

async fn plain_text() -> &'static str {
    "definitely not json"
}

async fn upload(
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Upload>), (StatusCode, Json<Value>)> {
    let rejected = |reason: &str| (StatusCode::BAD_REQUEST, Json(json!({"error": reason})));

    let boundary = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("multipart/form-data; boundary="))
        .ok_or_else(|| rejected("expected multipart/form-data"))?;

    let text = String::from_utf8_lossy(&body);
    if !text.starts_with(&format!("--{boundary}\r\n"))
        || !text.ends_with(&format!("\r\n--{boundary}--\r\n"))
    {
        return Err(rejected("malformed multipart body"));
    }
    let filename = text
        .split("filename=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .ok_or_else(|| rejected("missing filename"))?;

    Ok((
        StatusCode::CREATED,
        Json(Upload {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            bytes: body.len(),
        }),
    ))
}
