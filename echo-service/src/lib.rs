//! # Echo Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide an HTTP server that reflects
//! requests back to the caller, for integration testing `tether_core` and the `tether` CLI.
//! It is not intended for production use.
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, RawQuery},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::IntoResponse,
    routing::{any, get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::net::TcpListener;

/// Everything the server saw about a request sent to `/api/inspect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Lower-cased header names. Repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub content_type: Option<String>,
    /// The raw body, decoded lossily as UTF-8.
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/api/echo/{id}", get(echo_id))
        .route("/api/json", post(echo_json))
        .route("/api/text", get(text))
        .route("/api/status/{code}", any(status))
        .route("/api/inspect", any(inspect))
        .route("/api/inspect/{*rest}", any(inspect))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo_id(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "id": id }))
}

async fn echo_json(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(body)
}

async fn text() -> &'static str {
    "hello tether"
}

async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {code}"))
}

async fn inspect(
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Inspection> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers.iter() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Json(Inspection {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers: collected,
        content_type,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
