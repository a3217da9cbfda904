//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use docgate_firestore::{FirestoreClient, FirestoreLedger};
use docgate_models::PlanCatalog;
use docgate_quota::{plan_catalog_from_env, MemoryLedger, QuotaPolicy, QuotaService, UsageLedger};

use crate::config::{ApiConfig, LedgerBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub quota: QuotaService,
}

impl AppState {
    /// Create application state from the environment.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let catalog = plan_catalog_from_env().context("invalid plan catalog configuration")?;
        let policy = QuotaPolicy::from_env();

        let ledger: Arc<dyn UsageLedger> = match config.ledger_backend {
            LedgerBackend::Memory => Arc::new(MemoryLedger::new()),
            LedgerBackend::Firestore => {
                let client = FirestoreClient::from_env()
                    .await
                    .context("failed to create Firestore client")?;
                Arc::new(FirestoreLedger::new(client))
            }
        };

        info!(
            backend = ledger.backend_name(),
            abuse_threshold = policy.abuse_threshold,
            min_free_accounts = policy.min_free_accounts,
            "Usage ledger ready"
        );

        Ok(Self::with_ledger(config, ledger, catalog, policy))
    }

    /// Build state around an existing ledger.
    pub fn with_ledger(
        config: ApiConfig,
        ledger: Arc<dyn UsageLedger>,
        catalog: PlanCatalog,
        policy: QuotaPolicy,
    ) -> Self {
        Self {
            config,
            quota: QuotaService::new(ledger, catalog, policy),
        }
    }
}
