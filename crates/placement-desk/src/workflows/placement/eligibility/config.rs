use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::super::domain::AttributeKind;

/// What to do with criteria keys that name no known attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Drop the key, record it as unrecognized, keep the mapping.
    Ignore,
    /// Discard the whole mapping.
    Reject,
}

impl FromStr for UnknownFieldPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown field policy '{other}' (expected ignore|reject)")),
        }
    }
}

/// Attribute names the resolver understands and how their values compare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySchema {
    fields: BTreeMap<String, AttributeKind>,
    unknown_fields: UnknownFieldPolicy,
}

impl EligibilitySchema {
    pub fn new<N, C>(numeric: &[N], categorical: &[C]) -> Self
    where
        N: AsRef<str>,
        C: AsRef<str>,
    {
        let mut fields = BTreeMap::new();
        for name in categorical {
            fields.insert(name.as_ref().trim().to_lowercase(), AttributeKind::Categorical);
        }
        for name in numeric {
            fields.insert(name.as_ref().trim().to_lowercase(), AttributeKind::Numeric);
        }
        fields.remove("");

        Self {
            fields,
            unknown_fields: UnknownFieldPolicy::Ignore,
        }
    }

    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    pub fn kind_of(&self, field: &str) -> Option<AttributeKind> {
        self.fields.get(field).copied()
    }

    pub fn unknown_fields(&self) -> UnknownFieldPolicy {
        self.unknown_fields
    }
}

impl Default for EligibilitySchema {
    fn default() -> Self {
        Self::new(&["cgpa"][..], &["place", "sex"][..])
    }
}
