//! Access gate: maps a stored user onto the flags a request is judged by.
//!
//! # Key invariants
//! - Admin roles see every flag set, whatever is stored.
//! - A student's mock flag is the stored flag OR the flag of its track.
//! - Missing or inactive users fail closed with [`AccessProfile::denied`].
use crate::role_number::Track;
use crate::user::{AccessTypes, MockAccess, MockVariant, Role, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessProfile {
    pub role: Option<Role>,
    pub is_admin: bool,
    pub access_types: AccessTypes,
    pub mock_access: MockAccess,
}

impl AccessProfile {
    pub fn denied() -> Self {
        Self {
            role: None,
            is_admin: false,
            access_types: AccessTypes::default(),
            mock_access: MockAccess::default(),
        }
    }

    pub fn is_denied(&self) -> bool {
        self.role.is_none()
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Some(Role::SuperAdmin)
    }

    pub fn has_iba(&self) -> bool {
        self.access_types.allows(Track::Iba)
    }

    pub fn has_fbs(&self) -> bool {
        self.access_types.allows(Track::Fbs)
    }

    pub fn allows(&self, variant: MockVariant) -> bool {
        self.mock_access.get(variant)
    }
}

pub fn resolve_access(user: Option<&User>) -> AccessProfile {
    let Some(user) = user.filter(|user| user.active) else {
        return AccessProfile::denied();
    };

    if user.is_admin() {
        return AccessProfile {
            role: Some(user.role),
            is_admin: true,
            access_types: AccessTypes::all(),
            mock_access: MockAccess::all(),
        };
    }

    let types = user.access_types;
    let stored = user.mock_access;
    AccessProfile {
        role: Some(user.role),
        is_admin: false,
        access_types: types,
        mock_access: MockAccess {
            du_iba: stored.du_iba || types.iba,
            bup_iba: stored.bup_iba || types.iba,
            du_fbs: stored.du_fbs || types.fbs,
            bup_fbs: stored.bup_fbs || types.fbs,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn student() -> User {
        User::new("s@example.com", "S", Role::Student, Utc::now())
    }

    #[test]
    fn unknown_user_is_denied() {
        let profile = resolve_access(None);
        assert_eq!(profile, AccessProfile::denied());
        assert!(profile.is_denied());
        assert!(!profile.has_iba());
        for variant in MockVariant::ALL {
            assert!(!profile.allows(variant));
        }
    }

    #[test]
    fn inactive_user_is_denied() {
        let mut user = student();
        user.access_types = AccessTypes::all();
        user.active = false;
        assert_eq!(resolve_access(Some(&user)), AccessProfile::denied());
    }

    #[test]
    fn admins_get_everything() {
        let admin = User::new("a@example.com", "A", Role::Admin, Utc::now());
        let profile = resolve_access(Some(&admin));
        assert!(profile.is_admin);
        assert!(!profile.is_super_admin());
        assert!(profile.has_iba() && profile.has_fbs());
        assert_eq!(profile.mock_access, MockAccess::all());
    }

    #[test]
    fn track_flag_implies_mock_flags() {
        let mut user = student();
        user.access_types.iba = true;
        user.mock_access.du_fbs = true;
        let profile = resolve_access(Some(&user));

        assert!(profile.allows(MockVariant::DuIba));
        assert!(profile.allows(MockVariant::BupIba));
        assert!(profile.allows(MockVariant::DuFbs));
        assert!(!profile.allows(MockVariant::BupFbs));
        assert!(!profile.has_fbs());
    }
}
