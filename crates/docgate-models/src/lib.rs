//! Shared data models for the DocGate upload quota service.
//!
//! This crate provides Serde-serializable types for:
//! - Plan tiers and the plan catalog
//! - Upload allowances (bounded or unbounded)
//! - User accounts and IP registration history
//! - Quota verdicts and the quota-check response

pub mod account;
pub mod client_ip;
pub mod plan;
pub mod quota;
pub mod verdict;

// Re-export common types
pub use account::{IpRegistration, RegistrationOutcome, RegistrationReceipt, UserAccount};
pub use client_ip::{ClientIp, DEFAULT_FALLBACK_IP};
pub use plan::{PlanCatalog, PlanCatalogError, PlanEntry, PlanTier, UnknownPlanError};
pub use quota::{ParseQuotaError, Quota, UNBOUNDED};
pub use verdict::{QuotaCheck, QuotaVerdict, RestrictionType};
