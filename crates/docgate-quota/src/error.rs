//! Quota gate error types.

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type for quota operations.
pub type QuotaResult<T> = Result<T, QuotaError>;

/// Errors raised by a usage ledger backend.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid ledger record: {0}")]
    InvalidRecord(String),
}

impl LedgerError {
    pub fn not_found(user_id: impl Into<String>) -> Self {
        Self::NotFound(user_id.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(_))
    }
}

/// Errors surfaced by the quota gate.
#[derive(Debug, Clone, Error)]
pub enum QuotaError {
    /// Malformed input. Rejected before touching storage, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The account has no ledger record; its quota cannot be evaluated.
    #[error("User not found: {0}")]
    NotFound(String),

    /// Transient failure while resolving the verdict. The gate recovers
    /// from this with the baseline-only fallback.
    #[error("Quota resolver unavailable: {0}")]
    ResolverUnavailable(String),

    /// The account itself could not be read, so no fallback can be built.
    #[error("Usage ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

impl QuotaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn resolver_unavailable(msg: impl Into<String>) -> Self {
        Self::ResolverUnavailable(msg.into())
    }

    /// Map a ledger failure on the account read path.
    pub fn from_ledger(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(user_id) => Self::NotFound(user_id),
            LedgerError::Unavailable(msg) | LedgerError::InvalidRecord(msg) => Self::LedgerUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ledger_keeps_not_found() {
        let err = QuotaError::from_ledger(LedgerError::not_found("u1"));
        assert!(matches!(err, QuotaError::NotFound(ref id) if id == "u1"));
    }

    #[test]
    fn test_from_ledger_maps_transient_failures() {
        let err = QuotaError::from_ledger(LedgerError::unavailable("timeout"));
        assert!(matches!(err, QuotaError::LedgerUnavailable(_)));
        let err = QuotaError::from_ledger(LedgerError::InvalidRecord("bad".into()));
        assert!(matches!(err, QuotaError::LedgerUnavailable(_)));
    }
}
