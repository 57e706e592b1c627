//! Registration intake records.
use chrono::{DateTime, Utc};
use prepdesk_identity::{Track, is_plausible_email, normalize_email};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("name is required")]
    MissingName,
    #[error("email is not valid")]
    InvalidEmail,
    #[error("phone is not valid")]
    InvalidPhone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub track: Track,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub track: Track,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NewRegistration {
    /// Checks the fields and returns the stored form.
    pub fn into_registration(
        self,
        id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Registration, RegistrationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(RegistrationError::MissingName);
        }
        if !is_plausible_email(&self.email) {
            return Err(RegistrationError::InvalidEmail);
        }
        let phone = self.phone.trim().to_string();
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        let phone_chars_ok = phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
        if !phone_chars_ok || !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
            return Err(RegistrationError::InvalidPhone);
        }
        Ok(Registration {
            id: id.into(),
            name,
            email: normalize_email(&self.email),
            phone,
            track: self.track,
            institution: non_blank(self.institution),
            message: non_blank(self.message),
            created_at,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
