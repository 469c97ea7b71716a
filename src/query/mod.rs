//! Query module for the measurements engine
//! Handles panel targets, time resolution and building of the batched request.

pub mod builder;
pub mod fragment;
pub mod target;
pub mod time;

use thiserror::Error;

use crate::template::TemplateError;
pub use builder::QueryBuilder;
pub use fragment::{
    BatchedQuery, ExpressionFragment, FilterFragment, FilterParameter, SourceFragment,
};
pub use target::{QueryOptions, Target, TimeSpec};
pub use time::TimeError;

/// Errors that can occur while building a query
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Time error: {0}")]
    Time(#[from] TimeError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// Result type for query building
pub type QueryResult<T> = Result<T, QueryError>;
