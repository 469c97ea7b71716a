use thiserror::Error;

use crate::query::QueryError;
use crate::template::TemplateError;

/// Errors surfaced to the caller of the datasource
#[derive(Error, Debug)]
pub enum DatasourceError {
    /// The server answered with a non-success status
    #[error("OpenNMS Error: {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Gave up after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Query error: {0}")]
    Query(#[from] QueryError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

impl From<serde_json::Error> for DatasourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for datasource operations
pub type DatasourceResult<T> = Result<T, DatasourceError>;
