//! Identity reconciliation against a result sheet.
//!
//! # Purpose
//! Result books are keyed by whatever identifier the grading desk had to hand:
//! a 6-digit IBA number, a 7-digit FBS number, or a legacy directory id. A
//! student may hold several of those, and the portal must find their one row.
//!
//! # Key invariants
//! - Strategies run in a fixed priority order and the first hit wins.
//! - Results are never merged across identifiers.
//! - Matching is exact apart from email case; nothing fuzzy.
//!
//! # Examples
//! ```rust
//! use prepdesk_identity::{find_student_result, ResultQuery, StudentsDirectory, TestResult};
//! use std::collections::HashMap;
//!
//! let mut results = HashMap::new();
//! results.insert("123456".to_string(), TestResult::default());
//! let query = ResultQuery::default().with_role_numbers(["1234567", "123456"]);
//! let lookup = find_student_result(&results, &StudentsDirectory::default(), &query);
//! assert_eq!(lookup.identifier(), Some("123456"));
//! ```
use crate::directory::{DirectoryEntry, StudentsDirectory};
use crate::results::TestResult;
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// A role number the caller holds is a direct key.
    RoleNumber,
    /// An admin-selected identifier is a direct key.
    Selected,
    /// The directory record for the caller's email.
    DirectoryEmail,
    /// Directory records linked to the selected identifier.
    DirectoryLinked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultQuery {
    pub email: Option<String>,
    pub selected: Option<String>,
    pub role_numbers: Vec<String>,
}

impl ResultQuery {
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_selected(mut self, selected: impl Into<String>) -> Self {
        self.selected = Some(selected.into());
        self
    }

    pub fn with_role_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_numbers = numbers.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultLookup<'a> {
    Found {
        identifier: String,
        strategy: MatchStrategy,
        result: &'a TestResult,
    },
    Absent,
}

impl ResultLookup<'_> {
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Found { identifier, .. } => Some(identifier),
            Self::Absent => None,
        }
    }

    pub fn strategy(&self) -> Option<MatchStrategy> {
        match self {
            Self::Found { strategy, .. } => Some(*strategy),
            Self::Absent => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

pub fn find_student_result<'a>(
    results: &'a HashMap<String, TestResult>,
    directory: &StudentsDirectory,
    query: &ResultQuery,
) -> ResultLookup<'a> {
    let hit = |candidate: &str, strategy: MatchStrategy| {
        let candidate = candidate.trim();
        results
            .get_key_value(candidate)
            .map(|(identifier, result)| ResultLookup::Found {
                identifier: identifier.clone(),
                strategy,
                result,
            })
    };

    for number in &query.role_numbers {
        if let Some(found) = hit(number, MatchStrategy::RoleNumber) {
            return found;
        }
    }

    let selected = query
        .selected
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(selected) = selected
        && let Some(found) = hit(selected, MatchStrategy::Selected)
    {
        return found;
    }

    if let Some(email) = query.email.as_deref().filter(|email| !email.trim().is_empty()) {
        // Only the first entry for the email; linked records are strategy 4.
        if let Some(entry) = directory.by_email(email).next() {
            for identifier in entry.identifiers() {
                if let Some(found) = hit(identifier, MatchStrategy::DirectoryEmail) {
                    return found;
                }
            }
        }
    }

    if let Some(selected) = selected {
        let record = directory
            .by_key(selected)
            .or_else(|| directory.by_id(selected));
        if let Some(record) = record {
            for entry in directory.entries().iter().filter(|e| linked(record, e)) {
                for identifier in entry.identifiers() {
                    if let Some(found) = hit(identifier, MatchStrategy::DirectoryLinked) {
                        return found;
                    }
                }
            }
        }
    }

    ResultLookup::Absent
}

fn linked(record: &DirectoryEntry, candidate: &DirectoryEntry) -> bool {
    let shares_identifier = record
        .identifiers()
        .any(|own| candidate.identifiers().any(|other| other == own));
    let shares_email = record
        .email
        .as_deref()
        .is_some_and(|email| candidate.email_matches(email));
    shares_identifier || shares_email
}
