//! Quota verdicts and the quota-check response shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::quota::Quota;

/// Classification of an IP-based restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RestrictionType {
    /// Many accounts, several of them free, registered from one address.
    SharedIpAbuse,
}

impl RestrictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestrictionType::SharedIpAbuse => "shared-ip-abuse",
        }
    }
}

impl std::fmt::Display for RestrictionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective allowance for an account at evaluation time. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaVerdict {
    /// Total allowance for the period, possibly reduced by a restriction.
    pub quota: Quota,
    /// True when IP heuristics reduced the baseline.
    pub restricted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction_type: Option<RestrictionType>,
    /// True when produced by the degraded path after a resolution failure.
    pub fallback: bool,
}

impl QuotaVerdict {
    /// Baseline allowance with no restriction.
    pub fn unrestricted(quota: Quota) -> Self {
        Self {
            quota,
            restricted: false,
            reason: None,
            restriction_type: None,
            fallback: false,
        }
    }

    /// Reduced allowance with its cause.
    pub fn restricted(quota: Quota, restriction_type: RestrictionType, reason: impl Into<String>) -> Self {
        Self {
            quota,
            restricted: true,
            reason: Some(reason.into()),
            restriction_type: Some(restriction_type),
            fallback: false,
        }
    }

    /// Baseline allowance produced without consulting the IP signal.
    pub fn fallback(quota: Quota) -> Self {
        Self {
            fallback: true,
            ..Self::unrestricted(quota)
        }
    }
}

/// Answer to a quota check: what is left, plus the verdict it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCheck {
    pub remaining: Quota,
    #[serde(flatten)]
    pub verdict: QuotaVerdict,
}

impl QuotaCheck {
    /// Apply a verdict to the uploads already consumed.
    pub fn from_verdict(verdict: QuotaVerdict, upload_count: u32) -> Self {
        Self {
            remaining: verdict.quota.remaining_after(upload_count),
            verdict,
        }
    }

    /// Whether another upload may be accepted. Zero remaining is a hard stop.
    pub fn allows_upload(&self) -> bool {
        !self.remaining.is_exhausted()
    }
}
