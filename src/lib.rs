//! onms-query - Query translation for the OpenNMS measurements API
//!
//! This crate turns a dashboard panel's targets into a single batched
//! measurements request, expanding template variables along the way, and
//! turns the columnar response back into per-label series.

pub mod client;
pub mod error;
pub mod metrics;
pub mod query;
pub mod resource;
pub mod response;
pub mod template;

pub use client::{ClientConfig, Datasource};
pub use error::{DatasourceError, DatasourceResult};
pub use query::{BatchedQuery, QueryBuilder, QueryOptions, Target};
pub use response::{MeasurementsResponse, SeriesResult};
pub use template::{TemplateVariable, TemplateVariables};
