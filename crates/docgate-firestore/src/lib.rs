//! Firestore REST API client.
//!
//! This crate provides:
//! - A REST client with service account or emulator authentication
//! - Retry with backoff, request tracing and metrics
//! - The Firestore-backed usage ledger

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod usage_ledger;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use usage_ledger::FirestoreLedger;
