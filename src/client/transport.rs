use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde_json::Value;
use thiserror::Error;

use super::config::ClientConfig;
use crate::error::{DatasourceError, DatasourceResult};

/// A failed attempt.
///
/// `status()` is zero when no response reached the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Unreachable(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Undecodable body with HTTP {status}: {message}")]
    Decode { status: u16, message: String },
}

impl TransportError {
    pub fn status(&self) -> u16 {
        match self {
            TransportError::Unreachable(_) => 0,
            TransportError::Status { status, .. } => *status,
            TransportError::Decode { status, .. } => *status,
        }
    }
}

/// One call against the API, relative to the base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// GET payloads become query parameters, any other method sends them as the body
    pub fn new(method: Method, path: impl Into<String>, payload: Option<Value>) -> Self {
        let path = path.into();
        if method != Method::GET {
            return Self {
                method,
                path,
                params: Vec::new(),
                body: payload,
            };
        }

        let params = match payload {
            Some(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::Null => None,
                    Value::String(s) => Some((key, s)),
                    other => Some((key, other.to_string())),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            method,
            path,
            params,
            body: None,
        }
    }
}

/// Executes a single attempt of a request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError>;
}

/// `reqwest` backed transport attaching the configured credentials
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    basic_auth: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> DatasourceResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(config.with_credentials || config.basic_auth.is_some())
            .build()
            .map_err(|e| DatasourceError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            basic_auth: config.basic_auth.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(header::ACCEPT, "application/json");

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(auth) = &self.basic_auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let status = response.status();
        // a status line arrived, so a broken body is still a server answer
        let text = response.text().await.map_err(|e| {
            if status.is_success() {
                TransportError::Decode {
                    status: status.as_u16(),
                    message: e.to_string(),
                }
            } else {
                TransportError::Status {
                    status: status.as_u16(),
                    body: String::new(),
                }
            }
        })?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Decode {
            status: status.as_u16(),
            message: e.to_string(),
        })
    }
}
