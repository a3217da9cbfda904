//! Quota resolution: plan baseline, optionally reduced by the IP signal.

use std::sync::Arc;

use tracing::{debug, info};

use docgate_models::{ClientIp, PlanCatalog, QuotaVerdict, RestrictionType, UserAccount};

use crate::config::QuotaPolicy;
use crate::error::{QuotaError, QuotaResult};
use crate::ledger::with_deadline;
use crate::metrics;
use crate::reputation::{IpReputation, IpSignal};

const SHARED_IP_REASON: &str =
    "Upload quota reduced: multiple free accounts were registered from this network address";

/// Computes the effective quota for an account.
///
/// Any failure to consult the reputation signal surfaces as
/// [`QuotaError::ResolverUnavailable`]. Choosing a fallback is the caller's
/// job.
#[derive(Clone)]
pub struct QuotaResolver {
    catalog: Arc<PlanCatalog>,
    reputation: IpReputation,
    policy: Arc<QuotaPolicy>,
}

impl QuotaResolver {
    pub fn new(catalog: Arc<PlanCatalog>, reputation: IpReputation, policy: Arc<QuotaPolicy>) -> Self {
        Self {
            catalog,
            reputation,
            policy,
        }
    }

    pub async fn resolve(&self, user: &UserAccount) -> QuotaResult<QuotaVerdict> {
        let baseline = self.catalog.baseline(user.plan);

        let Some(ip) = user.registration_ip.as_ref() else {
            debug!(user_id = %user.user_id, "No registration IP on record, using baseline");
            return Ok(QuotaVerdict::unrestricted(baseline));
        };

        let signal = self.lookup(ip).await?;
        if !signal.abusive {
            return Ok(QuotaVerdict::unrestricted(baseline));
        }

        if self.catalog.is_paid(user.plan) {
            debug!(
                user_id = %user.user_id,
                plan = %user.plan,
                ip = %ip,
                "Shared IP flagged, paid plan is exempt"
            );
            metrics::record_abuse_detection(true);
            return Ok(QuotaVerdict::unrestricted(baseline));
        }

        let reduced = baseline.reduced(self.policy.restricted_quota_divisor);
        info!(
            user_id = %user.user_id,
            ip = %ip,
            matched_accounts = signal.matched_account_count,
            free_accounts = signal.free_account_count,
            baseline = %baseline,
            quota = %reduced,
            "Restricting quota for shared IP"
        );
        metrics::record_abuse_detection(false);

        Ok(QuotaVerdict::restricted(
            reduced,
            RestrictionType::SharedIpAbuse,
            SHARED_IP_REASON,
        ))
    }

    async fn lookup(&self, ip: &ClientIp) -> QuotaResult<IpSignal> {
        with_deadline(self.policy.evaluation_timeout, "IP reputation lookup", self.reputation.evaluate(ip))
            .await
            .map_err(|e| QuotaError::resolver_unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::UsageLedger;
    use crate::memory::MemoryLedger;
    use docgate_models::{PlanTier, Quota, DEFAULT_FALLBACK_IP};

    fn ip(raw: &str) -> ClientIp {
        ClientIp::from_raw(Some(raw), DEFAULT_FALLBACK_IP)
    }

    fn resolver(ledger: Arc<MemoryLedger>) -> QuotaResolver {
        let catalog = Arc::new(PlanCatalog::default());
        let policy = Arc::new(QuotaPolicy::default());
        let reputation = IpReputation::new(ledger, catalog.clone(), policy.clone());
        QuotaResolver::new(catalog, reputation, policy)
    }

    async fn shared_ip_ledger(users: &[&str]) -> Arc<MemoryLedger> {
        let ledger = Arc::new(MemoryLedger::new());
        for user in users {
            ledger.record_registration(user, &ip("1.2.3.4")).await.unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn test_clean_free_user_gets_baseline() {
        let ledger = shared_ip_ledger(&["a"]).await;
        let user = ledger.get_usage("a").await.unwrap();
        let verdict = resolver(ledger).resolve(&user).await.unwrap();
        assert_eq!(verdict, QuotaVerdict::unrestricted(Quota::Limited(3)));
    }

    #[tokio::test]
    async fn test_free_user_on_abusive_ip_is_restricted() {
        let ledger = shared_ip_ledger(&["a", "b", "c", "d"]).await;
        let user = ledger.get_usage("d").await.unwrap();
        let verdict = resolver(ledger).resolve(&user).await.unwrap();
        assert!(verdict.restricted);
        assert_eq!(verdict.quota, Quota::Limited(1));
        assert_eq!(verdict.restriction_type, Some(RestrictionType::SharedIpAbuse));
        assert!(verdict.reason.is_some());
        assert!(!verdict.fallback);
    }

    #[tokio::test]
    async fn test_paid_user_on_abusive_ip_keeps_baseline() {
        let ledger = shared_ip_ledger(&["a", "b", "c", "d", "e", "paid"]).await;
        ledger.set_plan("paid", PlanTier::Basic).await.unwrap();
        let user = ledger.get_usage("paid").await.unwrap();
        let verdict = resolver(ledger).resolve(&user).await.unwrap();
        assert_eq!(verdict, QuotaVerdict::unrestricted(Quota::Limited(15)));
    }

    #[tokio::test]
    async fn test_account_without_registration_ip_is_clean() {
        let ledger = shared_ip_ledger(&["a", "b", "c", "d"]).await;
        let mut user = ledger.get_usage("d").await.unwrap();
        user.registration_ip = None;
        let verdict = resolver(ledger).resolve(&user).await.unwrap();
        assert!(!verdict.restricted);
    }
}
