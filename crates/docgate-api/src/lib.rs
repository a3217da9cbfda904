//! Axum HTTP API for the upload quota gate.
//!
//! This crate provides:
//! - Registration, quota check, plan change and upload endpoints
//! - Client address extraction from proxy headers
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod client_ip;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, LedgerBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
