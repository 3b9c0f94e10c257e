// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Request handlers. Authentication is handled in front of this service.

use axum::extract::{Query, State};
use axum::Json;
use base64::Engine;
use bytes::Bytes;
use http::{header, HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::ApiError;
use super::App;
use crate::audit::{parse_limit, AuditEntry};
use crate::constants::audit::kinds;
use crate::tls::TlsStatus;
use crate::types::Snapshot;
use crate::vault::KeyStatus;

type ApiResult<T> = Result<T, ApiError>;

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    limit: Option<String>,
}

pub async fn list_logs(
    State(app): State<Arc<App>>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<AuditEntry>> {
    Json(app.audit.list(parse_limit(query.limit.as_deref())))
}

pub async fn get_config(State(app): State<Arc<App>>) -> ApiResult<Json<Value>> {
    let outcome = app.engine.fetch_from_first_available_source().await?;
    app.audit.info(kinds::PULL, "Config stored locally");

    Ok(Json(json!({
        "ok": true,
        "parsedCount": outcome.parsed_count,
        "source": outcome.source,
    })))
}

/// Answers 200 whatever the per-target outcome; the audit log carries the details.
pub async fn commit_config(State(app): State<Arc<App>>) -> ApiResult<Json<Value>> {
    let report = app.engine.commit_to_all_targets().await?;

    Ok(Json(json!({
        "ok": true,
        "delivered": report.delivered.len(),
        "failed": report.failed.len(),
    })))
}

pub async fn show_config(State(app): State<Arc<App>>) -> ApiResult<Json<Value>> {
    let snapshot = app.store.snapshot().await?;
    let text = snapshot.serialize();

    Ok(Json(json!({ "entries": snapshot, "text": text })))
}

#[derive(Deserialize)]
struct ConfigBody {
    entries: BTreeMap<String, String>,
}

/// Replace the local snapshot from `text/plain` config text or a JSON `{"entries": {...}}` body.
pub async fn replace_config(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let is_text = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/plain"));

    let snapshot = if is_text {
        Snapshot::parse(&String::from_utf8_lossy(&body))
    } else {
        let parsed: ConfigBody = serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid config body: {}", e)))?;
        Snapshot::try_from(parsed.entries)?
    };

    let count = snapshot.len();
    app.store.replace_snapshot(snapshot).await?;
    Ok(Json(json!({ "ok": true, "count": count })))
}

pub async fn tls_status(State(app): State<Arc<App>>) -> Json<TlsStatus> {
    Json(app.tls.status())
}

pub async fn tls_reload(State(app): State<Arc<App>>) -> ApiResult<Json<Value>> {
    let addr = app.tls.reload().await?;
    Ok(Json(json!({ "ok": true, "listening": addr.to_string() })))
}

/// Raw PKCS#12 archive as the request body
pub async fn upload_pfx(
    State(app): State<Arc<App>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    app.tls.upload_combined(&body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true }))))
}

/// Base64-encoded PEM files
#[derive(Deserialize)]
pub struct PemUpload {
    key: Option<String>,
    cert: Option<String>,
    chain: Option<String>,
}

pub async fn upload_pem(
    State(app): State<Arc<App>>,
    Json(upload): Json<PemUpload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let key = decode_field("key", upload.key.as_deref())?;
    let cert = decode_field("cert", upload.cert.as_deref())?;
    let chain = decode_field("chain", upload.chain.as_deref())?;

    app.tls
        .upload_separate(key.as_deref(), cert.as_deref(), chain.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true }))))
}

pub async fn ssh_key_status(State(app): State<Arc<App>>) -> Json<KeyStatus> {
    Json(app.vault.status())
}

/// Base64-encoded key pair; the public half is optional
#[derive(Deserialize)]
pub struct KeyUpload {
    private: Option<String>,
    public: Option<String>,
}

pub async fn upload_ssh_keys(
    State(app): State<Arc<App>>,
    Json(upload): Json<KeyUpload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let private = decode_field("private", upload.private.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("private key required".to_string()))?;
    let public = decode_field("public", upload.public.as_deref())?;

    app.vault.store_private_key(&private, public.as_deref())?;
    app.audit.info(kinds::SSH_KEYS, "SSH key pair uploaded");
    Ok((StatusCode::CREATED, Json(json!({ "ok": true }))))
}

pub async fn remove_ssh_keys(State(app): State<Arc<App>>) -> ApiResult<StatusCode> {
    app.vault.remove()?;
    app.audit.info(kinds::SSH_KEYS, "SSH key pair removed");
    Ok(StatusCode::NO_CONTENT)
}

fn decode_field(name: &str, value: Option<&str>) -> ApiResult<Option<Vec<u8>>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            base64::engine::general_purpose::STANDARD
                .decode(v.trim())
                .map_err(|e| ApiError::BadRequest(format!("Invalid base64 in '{}': {}", name, e)))
        })
        .transpose()
}
