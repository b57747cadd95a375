use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;

use crate::error::TransportError;

/// Network capability: raw bytes for a URL, or a failure.
pub trait Transport: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransportError>> + Send + 'a>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("rill/", env!("CARGO_PKG_VERSION")).into()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Request(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(TransportError::Status {
                    status: resp.status().as_u16(),
                });
            }

            let body = resp
                .bytes()
                .await
                .map_err(|e| TransportError::Request(format!("reading body: {e}")))?;
            Ok(body.to_vec())
        })
    }
}

/// Transport that serves canned bodies, for tests and offline runs.
#[derive(Default)]
pub struct StubTransport {
    responses: HashMap<String, Result<Vec<u8>, String>>,
    requests: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_failure(mut self, url: &str, reason: &str) -> Self {
        self.responses
            .insert(url.to_string(), Err(reason.to_string()));
        self
    }

    /// URLs fetched so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Transport for StubTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(url.to_string());
            }
            match self.responses.get(url) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(reason)) => Err(TransportError::Request(reason.clone())),
                None => Err(TransportError::NotFound(url.to_string())),
            }
        })
    }
}
