//! HTTP client for a running fetchbox server.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use fetchbox_storage::validate_name;
use reqwest::{RequestBuilder, Response, header};
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).or_raise(|| ErrorKind::ServerUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            exn::bail!(ErrorKind::ServerUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("fetchbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Request)?;
        Ok(Self { http, base_url })
    }

    /// Append percent-encoded `segments` to the base URL's path.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().ok().ok_or_raise(|| ErrorKind::ServerUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.or_raise(|| ErrorKind::Request)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(error) => format!("{} ({})", error.message, error.code),
            Err(_) => body,
        };
        exn::bail!(ErrorKind::Response { status: status.as_u16(), message })
    }

    async fn text(&self, request: RequestBuilder) -> Result<String> {
        self.send(request).await?.text().await.or_raise(|| ErrorKind::Request)
    }

    /// Returns the id of the new file.
    pub async fn register(&self, source: &str) -> Result<String> {
        let mut url = self.url(&["upload"])?;
        url.query_pairs_mut().append_pair("uri", source);
        self.text(self.http.post(url)).await
    }

    /// Download the content of `id` into `output`, or into a file named after
    /// it in the current directory. Returns the path written and its size.
    pub async fn download(&self, id: &str, output: Option<&Path>) -> Result<(String, u64)> {
        let url = self.url(&["download", id])?;
        let mut response = self.send(self.http.get(url)).await?;
        let path = match output {
            Some(path) => path.display().to_string(),
            None => attachment_name(response.headers().get(header::CONTENT_DISPOSITION)).unwrap_or_else(|| id.to_string()),
        };
        let mut file = tokio::fs::File::create_new(&path).await.or_raise(|| ErrorKind::Output(path.clone()))?;
        let mut written = 0;
        while let Some(chunk) = response.chunk().await.or_raise(|| ErrorKind::Request)? {
            file.write_all(&chunk).await.or_raise(|| ErrorKind::Output(path.clone()))?;
            written += chunk.len() as u64;
        }
        file.flush().await.or_raise(|| ErrorKind::Output(path.clone()))?;
        Ok((path, written))
    }

    /// Returns the description as stored by the server.
    pub async fn describe(&self, id: &str, description: &str) -> Result<String> {
        let url = self.url(&["description", id])?;
        self.text(self.http.put(url).body(description.to_string())).await
    }

    pub async fn description(&self, id: &str) -> Result<String> {
        let url = self.url(&["description", id])?;
        self.text(self.http.get(url)).await
    }

    pub async fn rename(&self, id: &str, new_name: &str) -> Result<String> {
        let url = self.url(&["rename", id, "new", new_name])?;
        self.text(self.http.put(url)).await
    }

    pub async fn delete(&self, id: &str) -> Result<String> {
        let url = self.url(&["delete", id])?;
        self.text(self.http.delete(url)).await
    }
}

/// Safe file name from an `attachment; filename=<name>` header, where the
/// name is a token or a quoted-string.
fn attachment_name(value: Option<&header::HeaderValue>) -> Option<String> {
    let value = value?.to_str().ok()?;
    let (_, rest) = value.split_once("filename=")?;
    let name = match rest.strip_prefix('"') {
        Some(quoted) => {
            let mut name = String::new();
            let mut chars = quoted.chars();
            loop {
                match chars.next()? {
                    '"' => break,
                    '\\' => name.push(chars.next()?),
                    c => name.push(c),
                }
            }
            name
        },
        None => rest.split(';').next()?.trim().to_string(),
    };
    validate_name(&name).ok()?;
    Some(name)
}
