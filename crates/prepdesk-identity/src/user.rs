//! Stored user records and the identity view handed to signed-in callers.
//!
//! # Purpose
//! [`User`] is the persisted record keyed by lower-cased email. [`UserInfo`]
//! is the tagged projection returned by the session endpoint so clients can
//! branch on `kind` instead of probing optional fields.
use crate::errors::{IdentityError, IdentityResult};
use crate::role_number::{RoleNumber, Track};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn parse(raw: &str) -> IdentityResult<Self> {
        match raw.trim() {
            "student" => Ok(Self::Student),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(IdentityError::InvalidRole(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse per-track flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccessTypes {
    #[serde(rename = "IBA", default)]
    pub iba: bool,
    #[serde(rename = "FBS", default)]
    pub fbs: bool,
}

impl AccessTypes {
    pub fn all() -> Self {
        Self {
            iba: true,
            fbs: true,
        }
    }

    pub fn allows(&self, track: Track) -> bool {
        match track {
            Track::Iba => self.iba,
            Track::Fbs => self.fbs,
        }
    }
}

/// Fine-grained flags, one per university/track mock series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MockAccess {
    pub du_iba: bool,
    pub bup_iba: bool,
    pub du_fbs: bool,
    pub bup_fbs: bool,
}

impl MockAccess {
    pub fn all() -> Self {
        Self {
            du_iba: true,
            bup_iba: true,
            du_fbs: true,
            bup_fbs: true,
        }
    }

    pub fn get(&self, variant: MockVariant) -> bool {
        match variant {
            MockVariant::DuIba => self.du_iba,
            MockVariant::BupIba => self.bup_iba,
            MockVariant::DuFbs => self.du_fbs,
            MockVariant::BupFbs => self.bup_fbs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MockVariant {
    DuIba,
    BupIba,
    DuFbs,
    BupFbs,
}

impl MockVariant {
    pub const ALL: [MockVariant; 4] = [
        MockVariant::DuIba,
        MockVariant::BupIba,
        MockVariant::DuFbs,
        MockVariant::BupFbs,
    ];

    pub fn track(&self) -> Track {
        match self {
            Self::DuIba | Self::BupIba => Track::Iba,
            Self::DuFbs | Self::BupFbs => Track::Fbs,
        }
    }

    pub fn parse(raw: &str) -> IdentityResult<Self> {
        match raw.trim() {
            "duIba" => Ok(Self::DuIba),
            "bupIba" => Ok(Self::BupIba),
            "duFbs" => Ok(Self::DuFbs),
            "bupFbs" => Ok(Self::BupFbs),
            other => Err(IdentityError::UnknownMockVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub role_numbers: BTreeSet<RoleNumber>,
    #[serde(default)]
    pub access_types: AccessTypes,
    #[serde(default)]
    pub mock_access: MockAccess,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Fresh active record with no access flags; `email` is normalized.
    pub fn new(email: &str, name: impl Into<String>, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            email: crate::email::normalize_email(email),
            name: name.into(),
            role,
            role_numbers: BTreeSet::new(),
            access_types: AccessTypes::default(),
            mock_access: MockAccess::default(),
            permissions: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn info(&self) -> UserInfo {
        if self.is_admin() {
            UserInfo::Admin {
                email: self.email.clone(),
                name: self.name.clone(),
                role: self.role,
                permissions: self.permissions.clone(),
            }
        } else {
            UserInfo::Student {
                email: self.email.clone(),
                name: self.name.clone(),
                role_numbers: self.role_numbers.iter().cloned().collect(),
                access_types: self.access_types,
                mock_access: self.mock_access,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserInfo {
    Admin {
        email: String,
        name: String,
        role: Role,
        permissions: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Student {
        email: String,
        name: String,
        role_numbers: Vec<RoleNumber>,
        access_types: AccessTypes,
        mock_access: MockAccess,
    },
}
