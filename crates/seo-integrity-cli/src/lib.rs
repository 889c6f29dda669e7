//! Command-line front end and stdio worker for `seo-integrity`.

pub mod commands;
pub mod config;
pub mod error;
pub mod transport;

pub use config::{load_config, resolve_config_path};
pub use error::{WorkerError, WorkerResult};
pub use transport::StdioTransport;
