//! Roster import and role-number backfill planning.
//!
//! # Purpose
//! The access-control document is the hand-maintained roster the programme
//! office edits. It is an import format: the portal reconciles it into the
//! user collection record by record and never reads it on a request path.
//! This module decides, per record, what the store should do. The portal's
//! executor applies the decisions and tallies the reports.
//!
//! # Key invariants
//! - One bad record yields a [`SyncFailure`] and never aborts the batch.
//! - A record whose role already matches is skipped, so a second pass over the
//!   same document creates and updates nothing.
//! - Backfill compares role-number sets, not sequences.
use crate::directory::{StudentsDirectory, deserialize_identifier};
use crate::email::{is_plausible_email, normalize_email};
use crate::errors::{IdentityError, IdentityResult};
use crate::role_number::RoleNumber;
use crate::user::{AccessTypes, MockAccess, Role, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use utoipa::ToSchema;

fn default_true() -> bool {
    true
}

fn default_admin_role() -> Role {
    Role::Admin
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccessControlDocument {
    #[serde(default)]
    pub admins: Vec<AdminEntry>,
    #[serde(default)]
    pub students: Vec<StudentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AdminEntry {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_admin_role")]
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentEntry {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "deserialize_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub role_numbers: Vec<String>,
    #[serde(default)]
    pub access_types: AccessTypes,
    #[serde(default)]
    pub mock_access: MockAccess,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// What to do when the document disagrees with a stored super-admin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RolePolicy {
    /// The document is authoritative, even for super-admins.
    JsonWins,
    /// Refuse to change an existing super-admin's role.
    #[default]
    ProtectSuperAdmins,
}

impl std::str::FromStr for RolePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "json-wins" => Ok(Self::JsonWins),
            "protect-super-admins" => Ok(Self::ProtectSuperAdmins),
            other => Err(format!(
                "unknown role policy {other:?}; expected json-wins or protect-super-admins"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RosterEntry {
    Admin(AdminEntry),
    Student(StudentEntry),
}

impl RosterEntry {
    pub fn email(&self) -> &str {
        match self {
            Self::Admin(entry) => &entry.email,
            Self::Student(entry) => &entry.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    Create(User),
    Update(User),
    Skip,
    Refuse(IdentityError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncFailure {
    pub email: String,
    pub message: String,
}

impl SyncFailure {
    pub fn new(email: impl Into<String>, message: impl ToString) -> Self {
        Self {
            email: email.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BackfillReport {
    pub updated: usize,
    pub unchanged: usize,
    pub errors: Vec<SyncFailure>,
}

impl AccessControlDocument {
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Flattens both arrays into one ordered list. An email listed twice keeps
    /// its first appearance, admins before students; later copies come back
    /// as failures.
    pub fn entries(&self) -> (Vec<RosterEntry>, Vec<SyncFailure>) {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut duplicates = Vec::new();

        let all = self
            .admins
            .iter()
            .cloned()
            .map(RosterEntry::Admin)
            .chain(self.students.iter().cloned().map(RosterEntry::Student));

        for entry in all {
            let email = normalize_email(entry.email());
            if seen.insert(email.clone()) {
                entries.push(entry);
            } else {
                duplicates.push(SyncFailure::new(
                    email.clone(),
                    IdentityError::DuplicateEntry(email),
                ));
            }
        }
        (entries, duplicates)
    }

    pub fn student(&self, email: &str) -> Option<&StudentEntry> {
        self.students
            .iter()
            .find(|entry| normalize_email(&entry.email) == normalize_email(email))
    }
}

fn checked_email(raw: &str) -> IdentityResult<String> {
    if is_plausible_email(raw) {
        Ok(normalize_email(raw))
    } else {
        Err(IdentityError::InvalidEmail(raw.to_string()))
    }
}

impl AdminEntry {
    pub fn to_user(&self, now: DateTime<Utc>) -> IdentityResult<User> {
        let email = checked_email(&self.email)?;
        if !self.role.is_admin() {
            return Err(IdentityError::InvalidRole(self.role.to_string()));
        }
        let mut user = User::new(&email, self.name.trim(), self.role, now);
        user.permissions = self.permissions.clone();
        user.active = self.active;
        user.access_types = AccessTypes::all();
        user.mock_access = MockAccess::all();
        Ok(user)
    }
}

impl StudentEntry {
    /// Role numbers named by this entry; `studentId` only counts when it is
    /// itself a valid role number.
    pub fn parsed_role_numbers(&self) -> IdentityResult<BTreeSet<RoleNumber>> {
        let mut numbers = self
            .role_numbers
            .iter()
            .map(|raw| RoleNumber::parse(raw))
            .collect::<IdentityResult<BTreeSet<_>>>()?;
        if let Some(number) = self
            .student_id
            .as_deref()
            .and_then(|id| RoleNumber::parse(id).ok())
        {
            numbers.insert(number);
        }
        Ok(numbers)
    }

    pub fn to_user(&self, now: DateTime<Utc>) -> IdentityResult<User> {
        let email = checked_email(&self.email)?;
        let mut user = User::new(&email, self.name.trim(), Role::Student, now);
        user.role_numbers = self.parsed_role_numbers()?;
        user.access_types = self.access_types;
        user.mock_access = self.mock_access;
        user.active = self.active;
        Ok(user)
    }
}

fn plan(
    incoming: IdentityResult<User>,
    existing: Option<&User>,
    policy: RolePolicy,
) -> SyncAction {
    let incoming = match incoming {
        Ok(user) => user,
        Err(err) => return SyncAction::Refuse(err),
    };
    let Some(existing) = existing else {
        return SyncAction::Create(incoming);
    };
    if existing.role == incoming.role {
        return SyncAction::Skip;
    }
    if policy == RolePolicy::ProtectSuperAdmins && existing.role == Role::SuperAdmin {
        return SyncAction::Refuse(IdentityError::SuperAdminDemotion(existing.email.clone()));
    }

    let mut updated = existing.clone();
    updated.role = incoming.role;
    updated.name = incoming.name;
    updated.permissions = incoming.permissions;
    updated.active = incoming.active;
    updated.access_types = incoming.access_types;
    updated.mock_access = incoming.mock_access;
    if incoming.role == Role::Student {
        updated.role_numbers = incoming.role_numbers;
    }
    updated.updated_at = incoming.updated_at;
    SyncAction::Update(updated)
}

pub fn plan_admin_sync(
    entry: &AdminEntry,
    existing: Option<&User>,
    policy: RolePolicy,
    now: DateTime<Utc>,
) -> SyncAction {
    plan(entry.to_user(now), existing, policy)
}

pub fn plan_student_sync(
    entry: &StudentEntry,
    existing: Option<&User>,
    policy: RolePolicy,
    now: DateTime<Utc>,
) -> SyncAction {
    plan(entry.to_user(now), existing, policy)
}

pub fn plan_entry_sync(
    entry: &RosterEntry,
    existing: Option<&User>,
    policy: RolePolicy,
    now: DateTime<Utc>,
) -> SyncAction {
    match entry {
        RosterEntry::Admin(entry) => plan_admin_sync(entry, existing, policy, now),
        RosterEntry::Student(entry) => plan_student_sync(entry, existing, policy, now),
    }
}

/// Union of every role number known for `user`: stored numbers, matching
/// directory keys and ids, and the roster entry's own identifiers. Values
/// that are not valid role numbers are dropped.
pub fn collect_role_numbers(
    user: &User,
    directory: &StudentsDirectory,
    roster: Option<&StudentEntry>,
) -> BTreeSet<RoleNumber> {
    let mut numbers = user.role_numbers.clone();

    for entry in directory.by_email(&user.email) {
        numbers.extend(
            entry
                .identifiers()
                .filter_map(|identifier| RoleNumber::parse(identifier).ok()),
        );
    }

    if let Some(roster) = roster {
        let raw = roster.role_numbers.iter().map(String::as_str);
        numbers.extend(
            raw.chain(roster.student_id.as_deref())
                .filter_map(|identifier| RoleNumber::parse(identifier).ok()),
        );
    }
    numbers
}

/// Returns the updated user when its role numbers change; `None` otherwise.
/// Only students are considered.
pub fn plan_backfill(
    user: &User,
    directory: &StudentsDirectory,
    roster: Option<&AccessControlDocument>,
    now: DateTime<Utc>,
) -> Option<User> {
    if user.role != Role::Student {
        return None;
    }
    let entry = roster.and_then(|doc| doc.student(&user.email));
    let numbers = collect_role_numbers(user, directory, entry);
    if numbers == user.role_numbers {
        return None;
    }
    let mut updated = user.clone();
    updated.role_numbers = numbers;
    updated.updated_at = now;
    Some(updated)
}
