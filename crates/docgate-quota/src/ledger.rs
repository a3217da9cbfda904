//! Usage ledger abstraction.
//!
//! The ledger owns durable per-user usage counters and the append-only
//! IP registration history. Implementations must give read-after-write
//! consistency per user: a registration or plan change is visible to the
//! next `get_usage` for the same user.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use docgate_models::{ClientIp, IpRegistration, PlanTier, RegistrationReceipt, UserAccount};

use crate::error::{LedgerError, LedgerResult};

#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Short backend name for logs and readiness output.
    fn backend_name(&self) -> &'static str;

    /// Record an account registration from `ip`.
    ///
    /// Creates the account on the free tier and appends one IP association.
    /// Idempotent per user: a redelivered event leaves exactly one
    /// association and reports `Replayed`. The stored registration IP is
    /// never overwritten.
    async fn record_registration(&self, user_id: &str, ip: &ClientIp) -> LedgerResult<RegistrationReceipt>;

    /// Current plan and upload count. `NotFound` if the user does not exist.
    async fn get_usage(&self, user_id: &str) -> LedgerResult<UserAccount>;

    /// Every account ever registered from `ip`, with registration times.
    async fn get_accounts_for_ip(&self, ip: &ClientIp) -> LedgerResult<Vec<IpRegistration>>;

    /// Live plan tier of each listed account. Unknown ids are omitted.
    async fn get_plan_tiers(&self, user_ids: &[String]) -> LedgerResult<HashMap<String, PlanTier>>;

    /// Apply a plan-change event.
    async fn set_plan(&self, user_id: &str, plan: PlanTier) -> LedgerResult<UserAccount>;

    /// Add accepted uploads to the counter. Returns the new count.
    async fn increment_upload_count(&self, user_id: &str, by: u32) -> LedgerResult<u32>;

    /// Cheap round trip used by the readiness check.
    async fn health_check(&self) -> LedgerResult<()>;
}

/// Run one ledger call under `deadline`. Elapsing it is reported as
/// [`LedgerError::Unavailable`].
pub async fn with_deadline<T, F>(deadline: Duration, operation: &str, call: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::unavailable(format!(
            "{} timed out after {}ms",
            operation,
            deadline.as_millis()
        ))),
    }
}
