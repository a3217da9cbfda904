//! Upload quota gate.
//!
//! This crate provides:
//! - The usage ledger abstraction and an in-memory backend
//! - The shared-IP reputation signal
//! - Quota resolution and the fail-open gate client
//! - A cloneable service façade for the API layer

pub mod config;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod reputation;
pub mod resolver;
pub mod service;

pub use config::{plan_catalog_from_env, QuotaPolicy};
pub use error::{LedgerError, LedgerResult, QuotaError, QuotaResult};
pub use gate::GateClient;
pub use ledger::UsageLedger;
pub use memory::MemoryLedger;
pub use reputation::{IpReputation, IpSignal};
pub use resolver::QuotaResolver;
pub use service::{validate_user_id, QuotaService, MAX_USER_ID_LEN};
