//! Client module for the measurements API
//! Handles configuration, transport, retries and the datasource facade.

pub mod config;
pub mod datasource;
pub mod models;
pub mod request;
pub mod transport;

pub use config::ClientConfig;
pub use datasource::Datasource;
pub use request::RequestClient;
pub use transport::{ApiRequest, HttpTransport, Transport, TransportError};
