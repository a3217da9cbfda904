//! Quota service façade.
//!
//! One cloneable handle over the ledger, reputation signal, resolver and
//! gate client. Built once at startup and shared by every request.

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use docgate_models::{ClientIp, PlanCatalog, PlanTier, QuotaCheck, RegistrationReceipt, UserAccount};

use crate::config::QuotaPolicy;
use crate::error::{LedgerResult, QuotaError, QuotaResult};
use crate::gate::GateClient;
use crate::ledger::{with_deadline, UsageLedger};
use crate::metrics;
use crate::reputation::{IpReputation, IpSignal};
use crate::resolver::QuotaResolver;

/// Longest accepted user id.
pub const MAX_USER_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct QuotaService {
    ledger: Arc<dyn UsageLedger>,
    reputation: IpReputation,
    gate: GateClient,
    policy: Arc<QuotaPolicy>,
}

impl QuotaService {
    pub fn new(ledger: Arc<dyn UsageLedger>, catalog: PlanCatalog, policy: QuotaPolicy) -> Self {
        let catalog = Arc::new(catalog);
        let policy = Arc::new(policy);
        let reputation = IpReputation::new(ledger.clone(), catalog.clone(), policy.clone());
        let resolver = QuotaResolver::new(catalog.clone(), reputation.clone(), policy.clone());
        let gate = GateClient::new(ledger.clone(), resolver, catalog, policy.clone());

        Self {
            ledger,
            reputation,
            gate,
            policy,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn UsageLedger> {
        &self.ledger
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Record a registration event. A missing or placeholder IP is stored as
    /// the configured fallback address.
    pub async fn record_registration(
        &self,
        user_id: &str,
        raw_ip: Option<&str>,
    ) -> QuotaResult<RegistrationReceipt> {
        let user_id = validate_user_id(user_id)?;
        let ip = ClientIp::from_raw(raw_ip, &self.policy.fallback_ip);

        let receipt = self
            .bounded("registration write", self.ledger.record_registration(user_id, &ip))
            .await?;

        metrics::record_registration(if receipt.created() { "created" } else { "replayed" });
        Ok(receipt)
    }

    pub async fn check_quota(&self, user_id: &str) -> QuotaResult<QuotaCheck> {
        let user_id = validate_user_id(user_id)?;
        self.gate.check_quota(user_id).await
    }

    /// Apply a plan-change event. The next quota check sees the new tier.
    pub async fn change_plan(&self, user_id: &str, plan: PlanTier) -> QuotaResult<UserAccount> {
        let user_id = validate_user_id(user_id)?;
        let account = self
            .bounded("plan change", self.ledger.set_plan(user_id, plan))
            .await?;
        info!(user_id = %user_id, plan = %plan, "Plan changed");
        Ok(account)
    }

    /// Count one accepted upload. Returns the new upload count.
    pub async fn record_upload(&self, user_id: &str) -> QuotaResult<u32> {
        let user_id = validate_user_id(user_id)?;
        self.bounded("upload count update", self.ledger.increment_upload_count(user_id, 1))
            .await
    }

    /// Evaluate an address for operators.
    pub async fn ip_reputation(&self, raw_ip: &str) -> QuotaResult<(ClientIp, IpSignal)> {
        if raw_ip.trim().is_empty() {
            return Err(QuotaError::validation("IP address is required"));
        }
        let ip = ClientIp::from_raw(Some(raw_ip), &self.policy.fallback_ip);
        let signal = self
            .bounded("IP reputation lookup", self.reputation.evaluate(&ip))
            .await?;
        Ok((ip, signal))
    }

    /// Every ledger call shares the policy's evaluation deadline.
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = LedgerResult<T>>,
    ) -> QuotaResult<T> {
        with_deadline(self.policy.evaluation_timeout, operation, call)
            .await
            .map_err(QuotaError::from_ledger)
    }
}

/// Trim and check a user id before it reaches storage.
pub fn validate_user_id(user_id: &str) -> QuotaResult<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(QuotaError::validation("userId is required"));
    }
    if trimmed.len() > MAX_USER_ID_LEN {
        return Err(QuotaError::validation(format!(
            "userId must be at most {} characters",
            MAX_USER_ID_LEN
        )));
    }
    if trimmed.contains('/') {
        return Err(QuotaError::validation("userId must not contain '/'"));
    }
    Ok(trimmed)
}
