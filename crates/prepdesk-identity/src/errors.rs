use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid role number: {0}")]
    InvalidRoleNumber(String),
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("unknown result kind: {0}")]
    UnknownResultKind(String),
    #[error("unknown mock variant: {0}")]
    UnknownMockVariant(String),
    #[error("duplicate roster entry for {0}")]
    DuplicateEntry(String),
    #[error("refusing to demote super_admin {0}")]
    SuperAdminDemotion(String),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            IdentityError::InvalidRoleNumber("12".to_string()),
            IdentityError::InvalidEmail("nope".to_string()),
            IdentityError::InvalidRole("owner".to_string()),
            IdentityError::UnknownResultKind("weekly".to_string()),
            IdentityError::UnknownMockVariant("duArts".to_string()),
            IdentityError::DuplicateEntry("a@b.c".to_string()),
            IdentityError::SuperAdminDemotion("root@b.c".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
