//! Axum HTTP API server for Unmark.
//!
//! This crate provides:
//! - Upload, process, progress, download and cleanup endpoints
//! - The in-memory job registry
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod state;
pub mod storage;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use registry::{JobRegistry, RegistryError, RegistryProgress};
pub use routes::create_router;
pub use state::AppState;
pub use storage::StorageLayout;
