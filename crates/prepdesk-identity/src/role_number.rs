//! Validated role-number identifiers.
//!
//! # Purpose
//! A role number is the numeric admit-card identifier a student receives for
//! an exam track. IBA tracks issue 6-digit numbers and FBS tracks issue
//! 7-digit numbers; one student frequently holds both.
//!
//! # Key invariants
//! - The inner string is always 6 or 7 ASCII digits.
//! - Leading zeros are significant and preserved.
use crate::errors::{IdentityError, IdentityResult};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Exam track implied by the length of a role number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Track {
    Iba,
    Fbs,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[schema(value_type = String, example = "123456")]
pub struct RoleNumber(String);

impl RoleNumber {
    pub fn parse(raw: &str) -> IdentityResult<Self> {
        let value = raw.trim();
        let digits_only = value.bytes().all(|byte| byte.is_ascii_digit());
        if !digits_only || !(6..=7).contains(&value.len()) {
            return Err(IdentityError::InvalidRoleNumber(raw.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn track(&self) -> Track {
        if self.0.len() == 6 {
            Track::Iba
        } else {
            Track::Fbs
        }
    }
}

impl std::fmt::Display for RoleNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoleNumber {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl<'de> Deserialize<'de> for RoleNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RoleNumber::parse(&raw).map_err(serde::de::Error::custom)
    }
}
