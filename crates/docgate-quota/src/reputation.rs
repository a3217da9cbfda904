//! Shared-IP reputation signal.
//!
//! Classifies a registration address as abusive when many accounts, several
//! of them on free tiers, were created from it. This is a heuristic: callers
//! only ever use it to reduce a quota, never to block an account.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use docgate_models::{ClientIp, PlanCatalog, PlanTier};

use crate::config::QuotaPolicy;
use crate::error::LedgerResult;
use crate::ledger::UsageLedger;

/// Outcome of evaluating one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpSignal {
    pub abusive: bool,
    /// Distinct accounts registered from the address within the lookback window.
    pub matched_account_count: usize,
    /// How many of those are currently on an unpaid tier.
    pub free_account_count: usize,
}

impl IpSignal {
    fn clean(matched_account_count: usize) -> Self {
        Self {
            abusive: false,
            matched_account_count,
            free_account_count: 0,
        }
    }
}

/// Read-only reputation evaluator over the usage ledger.
#[derive(Clone)]
pub struct IpReputation {
    ledger: Arc<dyn UsageLedger>,
    catalog: Arc<PlanCatalog>,
    policy: Arc<QuotaPolicy>,
}

impl IpReputation {
    pub fn new(ledger: Arc<dyn UsageLedger>, catalog: Arc<PlanCatalog>, policy: Arc<QuotaPolicy>) -> Self {
        Self {
            ledger,
            catalog,
            policy,
        }
    }

    /// Evaluate an address against the current registration history.
    pub async fn evaluate(&self, ip: &ClientIp) -> LedgerResult<IpSignal> {
        let registrations = self.ledger.get_accounts_for_ip(ip).await?;

        let cutoff = self.policy.lookback.map(|window| Utc::now() - window);
        let mut seen = HashSet::new();
        let accounts: Vec<String> = registrations
            .into_iter()
            .filter(|r| cutoff.map_or(true, |cutoff| r.registered_at >= cutoff))
            .filter(|r| seen.insert(r.user_id.clone()))
            .map(|r| r.user_id)
            .collect();

        let matched = accounts.len();
        if matched <= self.policy.abuse_threshold as usize {
            return Ok(IpSignal::clean(matched));
        }

        let tiers = self.ledger.get_plan_tiers(&accounts).await?;
        // Accounts the ledger no longer knows are counted as free.
        let free = accounts
            .iter()
            .map(|id| tiers.get(id).copied().unwrap_or(PlanTier::Free))
            .filter(|tier| !self.catalog.is_paid(*tier))
            .count();

        let abusive = free >= self.policy.min_free_accounts as usize;
        debug!(
            ip = %ip,
            matched_accounts = matched,
            free_accounts = free,
            abusive,
            "Evaluated IP reputation"
        );

        Ok(IpSignal {
            abusive,
            matched_account_count: matched,
            free_account_count: free,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use docgate_models::DEFAULT_FALLBACK_IP;

    fn ip(raw: &str) -> ClientIp {
        ClientIp::from_raw(Some(raw), DEFAULT_FALLBACK_IP)
    }

    fn reputation(ledger: Arc<MemoryLedger>, policy: QuotaPolicy) -> IpReputation {
        IpReputation::new(ledger, Arc::new(PlanCatalog::default()), Arc::new(policy))
    }

    async fn seed(ledger: &MemoryLedger, users: &[&str], addr: &str) {
        for user in users {
            ledger.record_registration(user, &ip(addr)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_unknown_ip_is_clean() {
        let ledger = Arc::new(MemoryLedger::new());
        let signal = reputation(ledger, QuotaPolicy::default())
            .evaluate(&ip("1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(signal, IpSignal::clean(0));
    }

    #[tokio::test]
    async fn test_at_threshold_is_clean() {
        let ledger = Arc::new(MemoryLedger::new());
        seed(&ledger, &["a", "b", "c"], "1.2.3.4").await;
        let signal = reputation(ledger, QuotaPolicy::default())
            .evaluate(&ip("1.2.3.4"))
            .await
            .unwrap();
        assert!(!signal.abusive);
        assert_eq!(signal.matched_account_count, 3);
    }

    #[tokio::test]
    async fn test_above_threshold_with_free_accounts_is_abusive() {
        let ledger = Arc::new(MemoryLedger::new());
        seed(&ledger, &["a", "b", "c", "d"], "1.2.3.4").await;
        let signal = reputation(ledger, QuotaPolicy::default())
            .evaluate(&ip("1.2.3.4"))
            .await
            .unwrap();
        assert!(signal.abusive);
        assert_eq!(signal.matched_account_count, 4);
        assert_eq!(signal.free_account_count, 4);
    }

    #[tokio::test]
    async fn test_mostly_paid_accounts_are_not_abusive() {
        let ledger = Arc::new(MemoryLedger::new());
        seed(&ledger, &["a", "b", "c", "d"], "1.2.3.4").await;
        for user in ["a", "b", "c"] {
            ledger.set_plan(user, PlanTier::Basic).await.unwrap();
        }
        let signal = reputation(ledger, QuotaPolicy::default())
            .evaluate(&ip("1.2.3.4"))
            .await
            .unwrap();
        assert!(!signal.abusive);
        assert_eq!(signal.free_account_count, 1);
    }

    #[tokio::test]
    async fn test_lookback_window_ignores_old_registrations() {
        let ledger = Arc::new(MemoryLedger::new());
        let old = Utc::now() - chrono::Duration::days(90);
        for user in ["a", "b", "c"] {
            ledger.record_registration_at(user, &ip("1.2.3.4"), old).await.unwrap();
        }
        seed(&ledger, &["d"], "1.2.3.4").await;

        let policy = QuotaPolicy {
            lookback: Some(chrono::Duration::days(30)),
            ..QuotaPolicy::default()
        };
        let signal = reputation(ledger, policy).evaluate(&ip("1.2.3.4")).await.unwrap();
        assert!(!signal.abusive);
        assert_eq!(signal.matched_account_count, 1);
    }
}
