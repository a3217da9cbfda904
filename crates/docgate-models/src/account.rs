//! User accounts and IP registration records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::client_ip::ClientIp;
use crate::plan::PlanTier;

/// A user account as seen by the quota gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Opaque user identifier.
    pub user_id: String,
    /// Current subscription tier.
    #[serde(rename = "planType")]
    pub plan: PlanTier,
    /// Uploads accepted in the current billing period.
    pub upload_count: u32,
    /// Address captured at account creation. Absent only for accounts
    /// created outside the registration path.
    #[serde(rename = "registrationIP")]
    pub registration_ip: Option<ClientIp>,
    pub registered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// A freshly registered free-tier account.
    pub fn registered(user_id: impl Into<String>, ip: ClientIp, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            plan: PlanTier::Free,
            upload_count: 0,
            registration_ip: Some(ip),
            registered_at: Some(at),
            created_at: at,
            updated_at: at,
        }
    }
}

/// One entry of an IP's registration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpRegistration {
    pub user_id: String,
    pub ip: ClientIp,
    pub registered_at: DateTime<Utc>,
}

/// Whether a registration call wrote new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationOutcome {
    /// First delivery: account and IP association were written.
    Created,
    /// Redelivery of an already-recorded registration; nothing changed.
    Replayed,
}

/// Result of recording a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    pub user_id: String,
    /// The address stored on the account. On replay this is the original
    /// address, which may differ from the one in the replayed event.
    pub registration_ip: ClientIp,
    pub outcome: RegistrationOutcome,
}

impl RegistrationReceipt {
    pub fn created(&self) -> bool {
        self.outcome == RegistrationOutcome::Created
    }
}
