//! HTTP transport for Gradio Spaces on Hugging Face.
//!
//! Spaces expose a uniform REST surface: upload files, start a call, then
//! poll a server-sent-events endpoint until the call completes. The TTS and
//! video clients share this transport and differ only in the api_name and
//! the positional argument list they send.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Connect timeout for all Space requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the lightweight reachability probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

/// Translate a Space id like `owner/Name` into its hosted root URL.
pub fn space_root_url(space: &str) -> String {
    let slug = space.replace('/', "-").to_lowercase();
    format!("https://{}.hf.space", slug)
}

/// Client for one Gradio Space.
#[derive(Clone)]
pub struct GradioClient {
    client: reqwest::Client,
    root_url: String,
    timeout: Duration,
}

impl GradioClient {
    /// Create a client for a Space root URL.
    ///
    /// `timeout` bounds the long-running phases (result polling, file
    /// transfer), not the initial connect.
    pub fn new(root_url: String, hf_token: Option<&str>, timeout_secs: u64) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = hf_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AppError::Internal(format!("Invalid HF token format: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            root_url: root_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Root URL of the Space.
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// A file reference for a path the Space already knows (from upload).
    pub fn file_ref(path: &str) -> JsonValue {
        json!({ "path": path, "meta": { "_type": "gradio.FileData" } })
    }

    /// A file reference for a publicly reachable URL.
    pub fn url_ref(url: &str) -> JsonValue {
        json!({ "url": url, "meta": { "_type": "gradio.FileData" } })
    }

    /// Upload bytes to the Space and return the server-side path.
    pub async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> AppResult<String> {
        let url = format!("{}/gradio_api/upload", self.root_url);

        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("files", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Space upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Space upload returned {}: {}",
                status, body
            )));
        }

        let paths: Vec<String> = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid upload response: {}", e)))?;

        paths
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ExternalService("Space upload returned no path".to_string()))
    }

    /// Start a call and return its event id.
    pub async fn call(&self, api_name: &str, data: Vec<JsonValue>) -> AppResult<String> {
        let url = format!("{}/gradio_api/call/{}", self.root_url, api_name);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "data": data }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Space call failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Space call {} returned {}: {}",
                api_name, status, body
            )));
        }

        let call: CallResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid call response: {}", e)))?;

        Ok(call.event_id)
    }

    /// Wait for a call's result.
    ///
    /// The result endpoint is an SSE stream that the Space keeps open until
    /// the call finishes, so one request (bounded by the client timeout)
    /// covers the whole generation.
    pub async fn poll_result(&self, api_name: &str, event_id: &str) -> AppResult<Vec<JsonValue>> {
        let url = format!("{}/gradio_api/call/{}/{}", self.root_url, api_name, event_id);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Space result poll failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Space result poll returned {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::ExternalService(format!("Space result stream failed: {}", e)))?;

        parse_sse_result(&body)
    }

    /// Start a call and wait for its result.
    pub async fn call_and_wait(
        &self,
        api_name: &str,
        data: Vec<JsonValue>,
    ) -> AppResult<Vec<JsonValue>> {
        let event_id = self.call(api_name, data).await?;
        debug!(api_name, event_id, "Space call started");
        self.poll_result(api_name, &event_id).await
    }

    /// Download a result file by server path or absolute URL.
    pub async fn fetch_file(&self, path_or_url: &str) -> AppResult<Vec<u8>> {
        let url = if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}/gradio_api/file={}", self.root_url, path_or_url)
        };

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Space file fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Space file fetch returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ExternalService(format!("Space file read failed: {}", e)))?;

        Ok(bytes.to_vec())
    }

    /// Probe whether the Space answers at all.
    pub async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(&self.root_url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Extract the downloadable location from a file reference in a result.
    ///
    /// Completed calls return file outputs as objects carrying `url` and/or
    /// `path`. Prefer the URL since it works regardless of Space routing.
    pub fn file_location(value: &JsonValue) -> Option<String> {
        if let Some(url) = value.get("url").and_then(JsonValue::as_str) {
            return Some(url.to_string());
        }
        if let Some(path) = value.get("path").and_then(JsonValue::as_str) {
            return Some(path.to_string());
        }
        value.as_str().map(String::from)
    }
}

/// Parse the SSE body of a finished call.
///
/// Blocks look like `event: complete\ndata: [...]`; error events carry a
/// message (or null) in their data line.
fn parse_sse_result(body: &str) -> AppResult<Vec<JsonValue>> {
    let mut event = "";
    for line in body.lines() {
        let line = line.trim_end();
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim();
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            match event {
                "complete" => {
                    let values: Vec<JsonValue> = serde_json::from_str(data).map_err(|e| {
                        AppError::ExternalService(format!("Invalid Space result payload: {}", e))
                    })?;
                    return Ok(values);
                }
                "error" => {
                    let detail = if data.is_empty() || data == "null" {
                        "no detail".to_string()
                    } else {
                        data.to_string()
                    };
                    return Err(AppError::ExternalService(format!(
                        "Space call failed: {}",
                        detail
                    )));
                }
                _ => {}
            }
        }
    }

    Err(AppError::ExternalService(
        "Space result stream ended without completion".to_string(),
    ))
}
