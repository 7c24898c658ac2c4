//! HTTP transport and the response policy applied on top of it.
//!
//! [`Transport`] issues one raw GET. [`ApiClient`] turns a raw response into
//! either usable data, an empty fallback (401/403) or an error.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SourceError;

/// Query parameters for one request.
pub type Params = Vec<(String, String)>;

/// A received HTTP response with its body decoded as far as possible.
///
/// A body that is not valid JSON is kept as a JSON string.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub url: String,
    pub body: Value,
}

impl ApiResponse {
    /// Status reported inside the body envelope, e.g. `{"status": 403}`.
    pub fn reported_status(&self) -> Option<u16> {
        self.body
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
    }

    fn is_access_denied(&self) -> Option<u16> {
        [self.reported_status(), Some(self.status)]
            .into_iter()
            .flatten()
            .find(|s| matches!(*s, 401 | 403))
    }

    fn into_fallback(self) -> Self {
        Self {
            body: json!({ "data": [] }),
            ..self
        }
    }
}

/// Issues a single GET request relative to the configured endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<ApiResponse, SourceError>;
}

/// `reqwest` transport rooted at `{baseUrl}/{apiBase}`.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<ApiResponse, SourceError> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                code: error_code(&e),
                url: url.clone(),
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let text = response.text().await.map_err(|e| SourceError::Transport {
            code: error_code(&e),
            url: final_url.clone(),
        })?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(ApiResponse {
            status,
            url: final_url,
            body,
        })
    }
}

fn error_code(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "ETIMEDOUT".to_string()
    } else if err.is_connect() {
        "ECONNREFUSED".to_string()
    } else if err.is_body() || err.is_decode() {
        "EBODY".to_string()
    } else {
        "EREQUEST".to_string()
    }
}

/// Applies the response policy on top of a [`Transport`].
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch `path`.
    ///
    /// A 401/403 (HTTP status or body `status`) is logged and answered with
    /// `{"data": []}`. Any other non-2xx status is an error.
    pub async fn fetch(&self, path: &str, params: &[(String, String)]) -> Result<ApiResponse, SourceError> {
        let response = self.transport.get(path, params).await?;

        if let Some(status) = response.is_access_denied() {
            warn!("Error: Status {} - {}", status, response.url);
            return Ok(response.into_fallback());
        }

        if !(200..300).contains(&response.status) {
            return Err(SourceError::UnexpectedStatus {
                status: response.status,
                url: response.url,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-process transport serving canned responses by path and page.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    pub(crate) enum Canned {
        Ok(u16, Value),
        Unreachable,
    }

    #[derive(Default)]
    pub(crate) struct MockTransport {
        routes: Mutex<HashMap<(String, Option<String>), Canned>>,
        requests: Mutex<Vec<(String, Option<String>)>>,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Serve `body` for `path` (and `?page=page` when given).
        pub(crate) fn route(self, path: &str, page: Option<u32>, body: Value) -> Self {
            self.route_status(path, page, 200, body)
        }

        pub(crate) fn route_status(self, path: &str, page: Option<u32>, status: u16, body: Value) -> Self {
            self.routes
                .lock()
                .unwrap()
                .insert((path.to_string(), page.map(|p| p.to_string())), Canned::Ok(status, body));
            self
        }

        pub(crate) fn unreachable(self, path: &str, page: Option<u32>) -> Self {
            self.routes
                .lock()
                .unwrap()
                .insert((path.to_string(), page.map(|p| p.to_string())), Canned::Unreachable);
            self
        }

        /// Hold every request open for `delay` before answering.
        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Most requests that were ever open at the same time.
        pub(crate) fn peak_in_flight(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }

        pub(crate) fn requests(&self) -> Vec<(String, Option<String>)> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn request_count(&self, path: &str) -> usize {
            self.requests().iter().filter(|(p, _)| p == path).count()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, path: &str, params: &[(String, String)]) -> Result<ApiResponse, SourceError> {
            let page = params
                .iter()
                .find(|(k, _)| k == "page")
                .map(|(_, v)| v.clone());
            let key = (path.to_string(), page);
            self.requests.lock().unwrap().push(key.clone());

            let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(open, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let url = format!("http://cms.test/api/gridsome/{}", path);
            let routes = self.routes.lock().unwrap();
            let response = match routes.get(&key) {
                Some(Canned::Ok(status, body)) => Ok(ApiResponse {
                    status: *status,
                    url,
                    body: body.clone(),
                }),
                Some(Canned::Unreachable) => Err(SourceError::Transport {
                    code: "ECONNREFUSED".to_string(),
                    url,
                }),
                None => Ok(ApiResponse {
                    status: 404,
                    url,
                    body: json!({"error": "not found"}),
                }),
            };
            response
        }
    }
}
