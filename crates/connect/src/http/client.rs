// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Generic signed HTTP client for venue request/response calls.
//!
//! One-shot calls independent of any streaming session. The underlying
//! connection-pooled client is created lazily once and shared by all
//! callers of one [`VenueHttpClient`]; the engine imposes no retry,
//! throttling, or default timeout policy; those layer above `execute`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::Method;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::{
    adapter::VenueAdapter,
    consts::TRADELINK_USER_AGENT,
    error::{HttpError, HttpResult},
};

/// One request/response call to a venue.
#[derive(Debug, Clone)]
pub struct VenueRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the adapter's base URL.
    pub path: String,
    /// Query parameters; the signing hook may append to these.
    pub params: Vec<(String, String)>,
    /// Optional JSON body; the signing hook may replace or extend it.
    pub body: Option<Value>,
    /// Request headers; the signing hook may add e.g. an API-key header.
    pub headers: HashMap<String, String>,
}

impl VenueRequest {
    /// Creates a request with the given method and path.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            headers: HashMap::new(),
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Decoded response body.
///
/// Bodies that fail JSON decoding are carried as raw text rather than
/// failing the call; the classifier decides what that means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Structured JSON body.
    Json(Value),
    /// Raw text fallback for non-JSON bodies.
    Text(String),
    /// Empty body.
    Empty,
}

impl ResponseBody {
    /// Returns the structured body, if any.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` for an empty body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// One venue response: transport status, headers, and decoded body.
#[derive(Debug, Clone)]
pub struct VenueResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Decoded body.
    pub body: ResponseBody,
}

/// Executes one-shot signed request/response calls against a venue.
pub struct VenueHttpClient {
    adapter: Arc<dyn VenueAdapter>,
    timeout: Option<Duration>,
    client: OnceCell<reqwest::Client>,
}

impl std::fmt::Debug for VenueHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueHttpClient")
            .field("adapter", &self.adapter.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl VenueHttpClient {
    /// Creates a client with no per-call timeout (the engine default).
    #[must_use]
    pub fn new(adapter: Arc<dyn VenueAdapter>) -> Self {
        Self {
            adapter,
            timeout: None,
            client: OnceCell::new(),
        }
    }

    /// Creates a client with a client-level request timeout.
    #[must_use]
    pub fn with_timeout(adapter: Arc<dyn VenueAdapter>, timeout: Duration) -> Self {
        Self {
            adapter,
            timeout: Some(timeout),
            client: OnceCell::new(),
        }
    }

    /// Returns the shared connection-pooled client, building it on first
    /// use. Creation is idempotent under concurrent callers.
    async fn client(&self) -> HttpResult<&reqwest::Client> {
        self.client
            .get_or_try_init(|| async {
                let mut builder = reqwest::Client::builder().user_agent(TRADELINK_USER_AGENT);
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder
                    .build()
                    .map_err(|e| HttpError::Network(e.to_string()))
            })
            .await
    }

    /// Executes one request, signing it first when `signed` is set, and
    /// passing the decoded response through the adapter's classifier before
    /// returning it.
    ///
    /// # Errors
    ///
    /// Returns signing, transport, or classification errors. A 2xx status
    /// with a logical error body fails here via the classifier.
    pub async fn execute(
        &self,
        mut request: VenueRequest,
        signed: bool,
    ) -> HttpResult<VenueResponse> {
        if signed {
            self.adapter.sign(&mut request)?;
        }

        let url = format!(
            "{}{}",
            self.adapter.http_base_url(),
            normalize_path(&request.path)
        );
        tracing::debug!(
            target: "tradelink::http",
            method = %request.method,
            path = %request.path,
            signed,
            "Request started",
        );
        let started = std::time::Instant::now();

        let client = self.client().await?;
        let mut builder = client.request(request.method.clone(), &url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        let bytes = response.bytes().await?;
        let body = decode_body(&bytes);

        tracing::debug!(
            target: "tradelink::http",
            method = %request.method,
            path = %request.path,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed",
        );

        self.adapter.classify_response(status, &headers, &body)?;

        Ok(VenueResponse {
            status,
            headers,
            body,
        })
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn decode_body(bytes: &[u8]) -> ResponseBody {
    if bytes.is_empty() {
        return ResponseBody::Empty;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => ResponseBody::Json(value),
        Err(_) => ResponseBody::Text(String::from_utf8_lossy(bytes).to_string()),
    }
}
