//! Plan tiers and the baseline upload quota table.

use std::collections::HashMap;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::quota::{ParseQuotaError, Quota};

/// Baseline uploads per billing period for each default tier.
pub const FREE_UPLOAD_QUOTA: u32 = 3;
pub const BASIC_UPLOAD_QUOTA: u32 = 15;

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Basic,
    Pro,
}

impl PlanTier {
    /// Every known tier.
    pub const ALL: [PlanTier; 3] = [PlanTier::Free, PlanTier::Basic, PlanTier::Pro];

    /// Parse from a stored value (case-insensitive), falling back to `Free`.
    ///
    /// Used when reading accounts: an unknown plan string gets the most
    /// restrictive tier rather than failing the read.
    pub fn parse_or_free(s: &str) -> Self {
        s.parse().unwrap_or(PlanTier::Free)
    }

    /// Get the plan name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned for plan names that match no tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan '{0}'")]
pub struct UnknownPlanError(pub String);

impl FromStr for PlanTier {
    type Err = UnknownPlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "basic" => Ok(PlanTier::Basic),
            "pro" => Ok(PlanTier::Pro),
            _ => Err(UnknownPlanError(s.to_string())),
        }
    }
}

/// One row of the plan catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanEntry {
    /// Baseline uploads per billing period.
    pub quota: Quota,
    /// Paid tiers have passed a payment control and are exempt from IP restrictions.
    pub paid: bool,
}

impl PlanEntry {
    pub const fn new(quota: Quota, paid: bool) -> Self {
        Self { quota, paid }
    }
}

/// Entry used for a tier missing from an overridden table.
const MISSING_TIER_ENTRY: PlanEntry = PlanEntry::new(Quota::Limited(FREE_UPLOAD_QUOTA), false);

/// Errors building a catalog from configuration strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanCatalogError {
    #[error("malformed plan quota entry '{0}', expected <plan>=<quota>")]
    MalformedEntry(String),

    #[error(transparent)]
    UnknownPlan(#[from] UnknownPlanError),

    #[error(transparent)]
    InvalidQuota(#[from] ParseQuotaError),
}

/// Static mapping from tier to baseline quota.
///
/// Kept as data so that new tiers or new numbers never require edits to
/// the resolution logic. The same catalog backs both the authoritative
/// resolution path and the degraded fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    entries: HashMap<PlanTier, PlanEntry>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let entries = HashMap::from([
            (PlanTier::Free, PlanEntry::new(Quota::Limited(FREE_UPLOAD_QUOTA), false)),
            (PlanTier::Basic, PlanEntry::new(Quota::Limited(BASIC_UPLOAD_QUOTA), true)),
            (PlanTier::Pro, PlanEntry::new(Quota::Unbounded, true)),
        ]);
        Self { entries }
    }
}

impl PlanCatalog {
    /// Replace one row of the table.
    pub fn with_entry(mut self, tier: PlanTier, entry: PlanEntry) -> Self {
        self.entries.insert(tier, entry);
        self
    }

    /// Catalog row for a tier.
    pub fn entry(&self, tier: PlanTier) -> PlanEntry {
        self.entries.get(&tier).copied().unwrap_or(MISSING_TIER_ENTRY)
    }

    /// Baseline quota for a tier.
    pub fn baseline(&self, tier: PlanTier) -> Quota {
        self.entry(tier).quota
    }

    /// Whether a tier is a paid tier.
    pub fn is_paid(&self, tier: PlanTier) -> bool {
        self.entry(tier).paid
    }

    /// Apply overrides on top of the default table.
    ///
    /// `quotas` is a comma-separated list such as `free=3,basic=15,pro=unbounded`.
    /// `paid`, when given, is a comma-separated list of tiers that count as paid;
    /// every other tier is then treated as unpaid.
    pub fn from_overrides(quotas: Option<&str>, paid: Option<&str>) -> Result<Self, PlanCatalogError> {
        let mut catalog = Self::default();

        if let Some(quotas) = quotas {
            for item in quotas.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let (plan, quota) = item
                    .split_once('=')
                    .ok_or_else(|| PlanCatalogError::MalformedEntry(item.to_string()))?;
                let tier: PlanTier = plan.parse()?;
                let quota: Quota = quota.parse()?;
                let paid = catalog.is_paid(tier);
                catalog = catalog.with_entry(tier, PlanEntry::new(quota, paid));
            }
        }

        if let Some(paid) = paid {
            let paid_tiers = paid
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<PlanTier>())
                .collect::<Result<Vec<_>, _>>()?;
            for tier in PlanTier::ALL {
                let quota = catalog.baseline(tier);
                catalog = catalog.with_entry(tier, PlanEntry::new(quota, paid_tiers.contains(&tier)));
            }
        }

        Ok(catalog)
    }
}
