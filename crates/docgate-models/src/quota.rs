//! Upload allowance values.

use std::fmt;
use std::str::FromStr;

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject, SubschemaValidation};
use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire label for an allowance without an upper bound.
pub const UNBOUNDED: &str = "unbounded";

/// An upload allowance: either a fixed number of uploads or no limit at all.
///
/// Serializes as a JSON number or as the string `"unbounded"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quota {
    Limited(u32),
    Unbounded,
}

impl Quota {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Quota::Unbounded)
    }

    /// Allowance left after `used` uploads, floored at zero.
    pub fn remaining_after(&self, used: u32) -> Quota {
        match self {
            Quota::Limited(limit) => Quota::Limited(limit.saturating_sub(used)),
            Quota::Unbounded => Quota::Unbounded,
        }
    }

    /// Stricter cap used for restricted accounts: `limit / divisor`, never below 1.
    ///
    /// An unbounded allowance stays unbounded. A zero allowance stays zero.
    pub fn reduced(&self, divisor: u32) -> Quota {
        match self {
            Quota::Limited(0) => Quota::Limited(0),
            Quota::Limited(limit) => Quota::Limited((limit / divisor.max(1)).max(1)),
            Quota::Unbounded => Quota::Unbounded,
        }
    }

    /// True when no uploads are left.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Quota::Limited(0))
    }

    pub fn limit(&self) -> Option<u32> {
        match self {
            Quota::Limited(limit) => Some(*limit),
            Quota::Unbounded => None,
        }
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quota::Limited(limit) => write!(f, "{}", limit),
            Quota::Unbounded => f.write_str(UNBOUNDED),
        }
    }
}

/// Error returned when a quota literal is neither a number nor `unbounded`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quota '{0}': expected a non-negative integer or 'unbounded'")]
pub struct ParseQuotaError(pub String);

impl FromStr for Quota {
    type Err = ParseQuotaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(UNBOUNDED) || trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(Quota::Unbounded);
        }
        trimmed
            .parse::<u32>()
            .map(Quota::Limited)
            .map_err(|_| ParseQuotaError(s.to_string()))
    }
}

impl Serialize for Quota {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Quota::Limited(limit) => serializer.serialize_u32(*limit),
            Quota::Unbounded => serializer.serialize_str(UNBOUNDED),
        }
    }
}

impl<'de> Deserialize<'de> for Quota {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u32),
            Label(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(limit) => Ok(Quota::Limited(limit)),
            Repr::Label(label) => label.parse().map_err(D::Error::custom),
        }
    }
}

impl JsonSchema for Quota {
    fn schema_name() -> String {
        "Quota".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let number = SchemaObject {
            instance_type: Some(InstanceType::Integer.into()),
            ..Default::default()
        };
        let unbounded = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(vec![serde_json::Value::String(UNBOUNDED.to_string())]),
            ..Default::default()
        };

        SchemaObject {
            subschemas: Some(Box::new(SubschemaValidation {
                one_of: Some(vec![number.into(), unbounded.into()]),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
