//! In-memory usage ledger.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use docgate_models::{
    ClientIp, IpRegistration, PlanTier, RegistrationOutcome, RegistrationReceipt, UserAccount,
};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::UsageLedger;

/// Process-local ledger.
///
/// Suitable for development and tests. State is lost on restart and is not
/// shared between replicas; production deployments use the Firestore ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    users: HashMap<String, UserAccount>,
    /// IP -> (user id -> registration time). Keyed by user so redelivery
    /// cannot add a second association.
    ip_index: HashMap<ClientIp, BTreeMap<String, DateTime<Utc>>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account at a fixed time. Used to seed history in tests.
    pub async fn record_registration_at(
        &self,
        user_id: &str,
        ip: &ClientIp,
        at: DateTime<Utc>,
    ) -> LedgerResult<RegistrationReceipt> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.users.get(user_id) {
            let stored_ip = existing.registration_ip.clone().unwrap_or_else(|| ip.clone());
            if &stored_ip != ip {
                warn!(
                    user_id = %user_id,
                    stored_ip = %stored_ip,
                    replayed_ip = %ip,
                    "Registration replay with a different IP, keeping original"
                );
            }
            return Ok(RegistrationReceipt {
                user_id: user_id.to_string(),
                registration_ip: stored_ip,
                outcome: RegistrationOutcome::Replayed,
            });
        }

        state
            .users
            .insert(user_id.to_string(), UserAccount::registered(user_id, ip.clone(), at));
        state
            .ip_index
            .entry(ip.clone())
            .or_default()
            .entry(user_id.to_string())
            .or_insert(at);

        info!(user_id = %user_id, ip = %ip, "Recorded registration");
        Ok(RegistrationReceipt {
            user_id: user_id.to_string(),
            registration_ip: ip.clone(),
            outcome: RegistrationOutcome::Created,
        })
    }

    /// Number of accounts held.
    pub async fn len(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn record_registration(&self, user_id: &str, ip: &ClientIp) -> LedgerResult<RegistrationReceipt> {
        self.record_registration_at(user_id, ip, Utc::now()).await
    }

    async fn get_usage(&self, user_id: &str) -> LedgerResult<UserAccount> {
        self.state
            .read()
            .await
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(user_id))
    }

    async fn get_accounts_for_ip(&self, ip: &ClientIp) -> LedgerResult<Vec<IpRegistration>> {
        let state = self.state.read().await;
        let registrations = state
            .ip_index
            .get(ip)
            .map(|accounts| {
                accounts
                    .iter()
                    .map(|(user_id, registered_at)| IpRegistration {
                        user_id: user_id.clone(),
                        ip: ip.clone(),
                        registered_at: *registered_at,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(registrations)
    }

    async fn get_plan_tiers(&self, user_ids: &[String]) -> LedgerResult<HashMap<String, PlanTier>> {
        let state = self.state.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.users.get(id).map(|user| (id.clone(), user.plan)))
            .collect())
    }

    async fn set_plan(&self, user_id: &str, plan: PlanTier) -> LedgerResult<UserAccount> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::not_found(user_id))?;
        user.plan = plan;
        user.updated_at = Utc::now();
        debug!(user_id = %user_id, plan = %plan, "Updated plan");
        Ok(user.clone())
    }

    async fn increment_upload_count(&self, user_id: &str, by: u32) -> LedgerResult<u32> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::not_found(user_id))?;
        user.upload_count = user.upload_count.saturating_add(by);
        user.updated_at = Utc::now();
        Ok(user.upload_count)
    }

    async fn health_check(&self) -> LedgerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_models::DEFAULT_FALLBACK_IP;

    fn ip(raw: &str) -> ClientIp {
        ClientIp::from_raw(Some(raw), DEFAULT_FALLBACK_IP)
    }

    #[tokio::test]
    async fn test_registration_creates_free_account() {
        let ledger = MemoryLedger::new();
        let receipt = ledger.record_registration("u1", &ip("1.2.3.4")).await.unwrap();
        assert!(receipt.created());

        let user = ledger.get_usage("u1").await.unwrap();
        assert_eq!(user.plan, PlanTier::Free);
        assert_eq!(user.upload_count, 0);
        assert_eq!(user.registration_ip, Some(ip("1.2.3.4")));
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_idempotent() {
        let ledger = MemoryLedger::new();
        ledger.record_registration("u1", &ip("1.2.3.4")).await.unwrap();
        let replay = ledger.record_registration("u1", &ip("1.2.3.4")).await.unwrap();
        assert_eq!(replay.outcome, RegistrationOutcome::Replayed);

        let accounts = ledger.get_accounts_for_ip(&ip("1.2.3.4")).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_registration_ip_is_immutable() {
        let ledger = MemoryLedger::new();
        ledger.record_registration("u1", &ip("1.2.3.4")).await.unwrap();
        let replay = ledger.record_registration("u1", &ip("5.6.7.8")).await.unwrap();
        assert_eq!(replay.registration_ip, ip("1.2.3.4"));

        assert!(ledger.get_accounts_for_ip(&ip("5.6.7.8")).await.unwrap().is_empty());
        let user = ledger.get_usage("u1").await.unwrap();
        assert_eq!(user.registration_ip, Some(ip("1.2.3.4")));
    }

    #[tokio::test]
    async fn test_get_usage_unknown_user() {
        let ledger = MemoryLedger::new();
        let err = ledger.get_usage("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_health_check_and_empty_set_plan() {
        let ledger = MemoryLedger::new();
        tokio_test::assert_ok!(ledger.health_check().await);
        tokio_test::assert_err!(ledger.set_plan("ghost", PlanTier::Basic).await);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_plan_change_is_read_back() {
        let ledger = MemoryLedger::new();
        ledger.record_registration("u1", &ip("1.2.3.4")).await.unwrap();
        ledger.set_plan("u1", PlanTier::Pro).await.unwrap();
        assert_eq!(ledger.get_usage("u1").await.unwrap().plan, PlanTier::Pro);

        let tiers = ledger
            .get_plan_tiers(&["u1".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers["u1"], PlanTier::Pro);
    }

    #[tokio::test]
    async fn test_increment_upload_count() {
        let ledger = MemoryLedger::new();
        ledger.record_registration("u1", &ip("1.2.3.4")).await.unwrap();
        assert_eq!(ledger.increment_upload_count("u1", 1).await.unwrap(), 1);
        assert_eq!(ledger.increment_upload_count("u1", 2).await.unwrap(), 3);
        assert_eq!(ledger.get_usage("u1").await.unwrap().upload_count, 3);

        let err = ledger.increment_upload_count("ghost", 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_accounts_for_ip_lists_every_registration() {
        let ledger = MemoryLedger::new();
        for user in ["a", "b", "c"] {
            ledger.record_registration(user, &ip("9.9.9.9")).await.unwrap();
        }
        ledger.record_registration("d", &ip("8.8.8.8")).await.unwrap();

        let accounts = ledger.get_accounts_for_ip(&ip("9.9.9.9")).await.unwrap();
        let ids: Vec<_> = accounts.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
