//! Tests for Firestore client configuration and error classification.

use std::time::Duration;

use serial_test::serial;

use crate::client::FirestoreConfig;
use crate::error::FirestoreError;
use docgate_quota::LedgerError;

const ENV_VARS: [&str; 8] = [
    "GCP_PROJECT_ID",
    "FIREBASE_PROJECT_ID",
    "FIRESTORE_DATABASE_ID",
    "FIRESTORE_CONNECT_TIMEOUT_SECS",
    "FIRESTORE_EMULATOR_HOST",
    "FIRESTORE_RETRY_BASE_MS",
    "FIRESTORE_RETRY_MAX_MS",
    "FIRESTORE_MAX_RETRIES",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

// =============================================================================
// Error Type Tests
// =============================================================================

#[test]
fn test_error_from_http_status_429() {
    let err = FirestoreError::from_http_status(429, "rate limited");
    assert!(matches!(err, FirestoreError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_5xx() {
    for status in [500, 502, 503] {
        let err = FirestoreError::from_http_status(status, "server error");
        assert!(matches!(err, FirestoreError::ServerError(s, _) if s == status));
        assert!(err.is_retryable());
    }
}

#[test]
fn test_error_from_http_status_client_errors() {
    let err = FirestoreError::from_http_status(400, "bad request");
    assert!(matches!(err, FirestoreError::RequestFailed(_)));
    assert!(!err.is_retryable());

    let err = FirestoreError::from_http_status(404, "not found");
    assert!(matches!(err, FirestoreError::NotFound(_)));
    assert!(!err.is_retryable());

    let err = FirestoreError::from_http_status(409, "conflict");
    assert!(matches!(err, FirestoreError::AlreadyExists(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_error_from_http_status_precondition() {
    let err = FirestoreError::from_http_status(412, "precondition");
    assert!(err.is_precondition_failed());

    let err = FirestoreError::from_http_status(400, r#"{"error":{"status":"FAILED_PRECONDITION"}}"#);
    assert!(matches!(err, FirestoreError::PreconditionFailed(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_error_http_status_getter() {
    assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
    assert_eq!(
        FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
        Some(502)
    );
    assert_eq!(FirestoreError::NotFound("doc".into()).http_status(), Some(404));
    assert_eq!(FirestoreError::InvalidResponse("doc".into()).http_status(), None);
}

#[test]
fn test_error_retry_after_ms() {
    assert_eq!(FirestoreError::RateLimited(5000).retry_after_ms(), Some(5000));
    assert_eq!(
        FirestoreError::ServerError(500, "error".into()).retry_after_ms(),
        None
    );
}

#[test]
fn test_error_maps_to_ledger_error() {
    let err: LedgerError = FirestoreError::not_found("users/u1").into();
    assert!(err.is_not_found());

    let err: LedgerError = FirestoreError::ServerError(503, "down".into()).into();
    assert!(matches!(err, LedgerError::Unavailable(_)));

    let err: LedgerError = FirestoreError::invalid_response("garbled").into();
    assert!(matches!(err, LedgerError::InvalidRecord(_)));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
#[serial]
fn test_config_requires_project_id() {
    clear_env();
    assert!(FirestoreConfig::from_env().is_err());

    std::env::set_var("GCP_PROJECT_ID", "");
    assert!(FirestoreConfig::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_config_accepts_firebase_project_id() {
    clear_env();
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "firebase-project");
    assert_eq!(config.database_id, "(default)");
    assert!(config.emulator_host.is_none());
    clear_env();
}

#[test]
#[serial]
fn test_config_prefers_gcp_project_id() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "gcp-project");
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "gcp-project");
    clear_env();
}

#[test]
#[serial]
fn test_config_parses_env_vars() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "15");
    std::env::set_var("FIRESTORE_RETRY_BASE_MS", "50");
    std::env::set_var("FIRESTORE_RETRY_MAX_MS", "2000");
    std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(15));
    assert_eq!(config.retry.base_delay_ms, 50);
    assert_eq!(config.retry.max_delay_ms, 2000);
    assert_eq!(config.emulator_host.as_deref(), Some("localhost:8080"));
    clear_env();
}

#[test]
#[serial]
fn test_config_handles_invalid_env_values() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
    std::env::set_var("FIRESTORE_EMULATOR_HOST", "  ");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert!(config.emulator_host.is_none());
    clear_env();
}
