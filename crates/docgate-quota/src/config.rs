//! Quota policy configuration.

use std::time::Duration;

use docgate_models::{PlanCatalog, PlanCatalogError, DEFAULT_FALLBACK_IP};

/// Tunable abuse-prevention policy.
///
/// The specific constants are product policy, not law: every field can be
/// overridden from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaPolicy {
    /// An IP is suspicious when more than this many accounts registered from it.
    pub abuse_threshold: u32,
    /// Minimum number of free-tier accounts among them for an abuse verdict.
    pub min_free_accounts: u32,
    /// Only registrations within this window count. `None` means all time.
    pub lookback: Option<chrono::Duration>,
    /// Restricted accounts get `baseline / divisor` uploads, never fewer than one.
    pub restricted_quota_divisor: u32,
    /// Upper bound on a single ledger or reputation lookup.
    pub evaluation_timeout: Duration,
    /// Address stored for registrations that carry no usable IP.
    pub fallback_ip: String,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            abuse_threshold: 3,
            min_free_accounts: 2,
            lookback: None,
            restricted_quota_divisor: 3,
            evaluation_timeout: Duration::from_millis(2000),
            fallback_ip: DEFAULT_FALLBACK_IP.to_string(),
        }
    }
}

impl QuotaPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let lookback_days: u32 = std::env::var("IP_LOOKBACK_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        Self {
            abuse_threshold: std::env::var("IP_ABUSE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.abuse_threshold),
            min_free_accounts: std::env::var("IP_MIN_FREE_ACCOUNTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_free_accounts),
            lookback: (lookback_days > 0).then(|| chrono::Duration::days(i64::from(lookback_days))),
            restricted_quota_divisor: std::env::var("RESTRICTED_QUOTA_DIVISOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|d: &u32| *d > 0)
                .unwrap_or(defaults.restricted_quota_divisor),
            evaluation_timeout: Duration::from_millis(
                std::env::var("QUOTA_EVALUATION_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            fallback_ip: std::env::var("REGISTRATION_FALLBACK_IP")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.fallback_ip),
        }
    }
}

/// Build the plan catalog from `PLAN_QUOTAS` and `PAID_PLANS`.
pub fn plan_catalog_from_env() -> Result<PlanCatalog, PlanCatalogError> {
    let quotas = std::env::var("PLAN_QUOTAS").ok();
    let paid = std::env::var("PAID_PLANS").ok();
    PlanCatalog::from_overrides(quotas.as_deref(), paid.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_models::{PlanTier, Quota};
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "IP_ABUSE_THRESHOLD",
        "IP_MIN_FREE_ACCOUNTS",
        "IP_LOOKBACK_DAYS",
        "RESTRICTED_QUOTA_DIVISOR",
        "QUOTA_EVALUATION_TIMEOUT_MS",
        "REGISTRATION_FALLBACK_IP",
        "PLAN_QUOTAS",
        "PAID_PLANS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_policy_defaults() {
        clear_env();
        let policy = QuotaPolicy::from_env();
        assert_eq!(policy, QuotaPolicy::default());
        assert_eq!(policy.abuse_threshold, 3);
        assert!(policy.lookback.is_none());
        assert_eq!(policy.fallback_ip, "127.0.0.1");
    }

    #[test]
    #[serial]
    fn test_policy_parses_env_vars() {
        clear_env();
        std::env::set_var("IP_ABUSE_THRESHOLD", "5");
        std::env::set_var("IP_LOOKBACK_DAYS", "30");
        std::env::set_var("RESTRICTED_QUOTA_DIVISOR", "2");
        std::env::set_var("QUOTA_EVALUATION_TIMEOUT_MS", "250");
        std::env::set_var("REGISTRATION_FALLBACK_IP", "::1");
        let policy = QuotaPolicy::from_env();
        assert_eq!(policy.abuse_threshold, 5);
        assert_eq!(policy.lookback, Some(chrono::Duration::days(30)));
        assert_eq!(policy.restricted_quota_divisor, 2);
        assert_eq!(policy.evaluation_timeout, Duration::from_millis(250));
        assert_eq!(policy.fallback_ip, "::1");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_policy_handles_invalid_env_values() {
        clear_env();
        std::env::set_var("IP_ABUSE_THRESHOLD", "lots");
        std::env::set_var("RESTRICTED_QUOTA_DIVISOR", "0");
        std::env::set_var("REGISTRATION_FALLBACK_IP", "  ");
        let policy = QuotaPolicy::from_env();
        assert_eq!(policy.abuse_threshold, 3);
        assert_eq!(policy.restricted_quota_divisor, 3);
        assert_eq!(policy.fallback_ip, "127.0.0.1");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_catalog_from_env() {
        clear_env();
        std::env::set_var("PLAN_QUOTAS", "free=2,basic=20");
        let catalog = plan_catalog_from_env().unwrap();
        assert_eq!(catalog.baseline(PlanTier::Free), Quota::Limited(2));
        assert_eq!(catalog.baseline(PlanTier::Basic), Quota::Limited(20));

        std::env::set_var("PLAN_QUOTAS", "gold=1");
        assert!(plan_catalog_from_env().is_err());
        clear_env();
    }
}
