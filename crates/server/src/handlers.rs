//! Request handlers.
//!
//! Each handler translates one request into one registry call and the result
//! back into a response. Nothing here touches a store directly.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::IntoResponse;
use fetchbox_registry::RecordId;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Remote URL to download.
    pub uri: String,
}

/// `POST /upload?uri=<url>`: register a remote file, responding with its id.
pub async fn upload(State(state): State<AppState>, Query(params): Query<UploadParams>) -> ApiResult<String> {
    let id = state.registry.register(&params.uri).await?;
    Ok(id.to_string())
}

/// `GET /download/{id}`: stream the file's content.
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let download = state.registry.fetch(&RecordId::from(id)).await?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(download.size));
    headers.insert(header::CONTENT_DISPOSITION, attachment(&download.record.name));
    Ok((headers, Body::from_stream(ReaderStream::new(download.content))))
}

/// `Content-Disposition` naming the download, as an RFC 6266 quoted-string.
/// Names a header can't carry fall back to a bare `attachment`.
fn attachment(name: &str) -> HeaderValue {
    let mut value = String::with_capacity(name.len() + 24);
    value.push_str("attachment; filename=\"");
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            value.push('\\');
        }
        value.push(c);
    }
    value.push('"');
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// `DELETE /delete/{id}`
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    let deletion = state.registry.delete(&RecordId::from(id)).await?;
    Ok(format!("Deleted file: {}", deletion.record().name))
}

/// `PUT /rename/{id}/new/{new_name}`: responds with the new name.
pub async fn rename(
    State(state): State<AppState>,
    Path((id, new_name)): Path<(String, String)>,
) -> ApiResult<String> {
    state.registry.rename(&RecordId::from(id), &new_name).await.map_err(Into::into)
}

/// `PUT /description/{id}`: the request body is the new description;
/// responds with the description as persisted.
pub async fn describe(State(state): State<AppState>, Path(id): Path<String>, description: String) -> ApiResult<String> {
    let confirmed = state.registry.describe(&RecordId::from(id), &description).await?;
    Ok(confirmed.value)
}

/// `GET /description/{id}`
pub async fn description(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    Ok(state.registry.description(&RecordId::from(id)).await?)
}
