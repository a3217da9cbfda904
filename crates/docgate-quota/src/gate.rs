//! Gate client: turns a verdict into a remaining-upload answer.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use docgate_models::{PlanCatalog, QuotaCheck, QuotaVerdict, UserAccount};

use crate::config::QuotaPolicy;
use crate::error::{QuotaError, QuotaResult};
use crate::ledger::{with_deadline, UsageLedger};
use crate::metrics;
use crate::resolver::QuotaResolver;

/// Answers "how many uploads are left" for one account.
///
/// The account is read fresh on every call. Resolver failures degrade to the
/// plan baseline; they never reach the caller.
#[derive(Clone)]
pub struct GateClient {
    ledger: Arc<dyn UsageLedger>,
    resolver: QuotaResolver,
    catalog: Arc<PlanCatalog>,
    policy: Arc<QuotaPolicy>,
}

impl GateClient {
    pub fn new(
        ledger: Arc<dyn UsageLedger>,
        resolver: QuotaResolver,
        catalog: Arc<PlanCatalog>,
        policy: Arc<QuotaPolicy>,
    ) -> Self {
        Self {
            ledger,
            resolver,
            catalog,
            policy,
        }
    }

    /// Read the account and evaluate its quota.
    pub async fn check_quota(&self, user_id: &str) -> QuotaResult<QuotaCheck> {
        let user = self.load_account(user_id).await?;
        Ok(self.check_account(&user).await)
    }

    /// Evaluate an already-loaded account. Infallible by construction.
    pub async fn check_account(&self, user: &UserAccount) -> QuotaCheck {
        let start = Instant::now();

        let (verdict, outcome) = match self.resolver.resolve(user).await {
            Ok(verdict) => {
                let outcome = if verdict.restricted { "restricted" } else { "authoritative" };
                (verdict, outcome)
            }
            Err(e) => {
                warn!(
                    user_id = %user.user_id,
                    plan = %user.plan,
                    error = %e,
                    "Quota resolution failed, falling back to plan baseline"
                );
                (QuotaVerdict::fallback(self.catalog.baseline(user.plan)), "fallback")
            }
        };

        metrics::record_quota_check(outcome, start.elapsed().as_secs_f64());

        let check = QuotaCheck::from_verdict(verdict, user.upload_count);
        debug!(
            user_id = %user.user_id,
            quota = %check.verdict.quota,
            remaining = %check.remaining,
            upload_count = user.upload_count,
            restricted = check.verdict.restricted,
            fallback = check.verdict.fallback,
            "Quota check complete"
        );
        check
    }

    async fn load_account(&self, user_id: &str) -> QuotaResult<UserAccount> {
        with_deadline(self.policy.evaluation_timeout, "account read", self.ledger.get_usage(user_id))
            .await
            .map_err(QuotaError::from_ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use crate::reputation::IpReputation;
    use docgate_models::{ClientIp, PlanTier, Quota, DEFAULT_FALLBACK_IP};

    fn gate(ledger: Arc<MemoryLedger>) -> GateClient {
        let catalog = Arc::new(PlanCatalog::default());
        let policy = Arc::new(QuotaPolicy::default());
        let reputation = IpReputation::new(ledger.clone(), catalog.clone(), policy.clone());
        let resolver = QuotaResolver::new(catalog.clone(), reputation, policy.clone());
        GateClient::new(ledger, resolver, catalog, policy)
    }

    fn ip(raw: &str) -> ClientIp {
        ClientIp::from_raw(Some(raw), DEFAULT_FALLBACK_IP)
    }

    #[tokio::test]
    async fn test_remaining_subtracts_uploads() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.record_registration("u1", &ip("10.0.0.1")).await.unwrap();
        ledger.increment_upload_count("u1", 2).await.unwrap();

        let check = gate(ledger).check_quota("u1").await.unwrap();
        assert_eq!(check.remaining, Quota::Limited(1));
        assert!(check.allows_upload());
    }

    #[tokio::test]
    async fn test_exhausted_quota_refuses_upload() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.record_registration("u1", &ip("10.0.0.1")).await.unwrap();
        ledger.increment_upload_count("u1", 3).await.unwrap();

        let check = gate(ledger).check_quota("u1").await.unwrap();
        assert_eq!(check.remaining, Quota::Limited(0));
        assert!(!check.allows_upload());
    }

    #[tokio::test]
    async fn test_pro_is_unbounded() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.record_registration("u1", &ip("10.0.0.1")).await.unwrap();
        ledger.set_plan("u1", PlanTier::Pro).await.unwrap();
        ledger.increment_upload_count("u1", 500).await.unwrap();

        let check = gate(ledger).check_quota("u1").await.unwrap();
        assert!(check.remaining.is_unbounded());
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let ledger = Arc::new(MemoryLedger::new());
        let err = gate(ledger).check_quota("ghost").await.unwrap_err();
        assert!(matches!(err, QuotaError::NotFound(_)));
    }
}
