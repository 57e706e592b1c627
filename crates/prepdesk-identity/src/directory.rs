//! Students directory (`students.json`).
//!
//! # Purpose
//! The directory is the legacy bridge between emails and the identifiers used
//! as keys in result books. Each record is stored under a key (usually a role
//! number) and also carries an `id` that may disagree with the key.
//!
//! # Key invariants
//! - File order is preserved; reconciliation walks entries in that order.
//! - `id` is always held as a string even when the file stores a number.
//! - Email lookups are case-insensitive.
use crate::email::normalize_email;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub key: String,
    pub id: Option<String>,
    pub name: String,
    pub email: Option<String>,
}

impl DirectoryEntry {
    pub fn email_matches(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|own| normalize_email(own) == normalize_email(email))
    }

    /// Key first, then `id` when it differs.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        let id = self.id.as_deref().filter(|id| *id != self.key);
        std::iter::once(self.key.as_str()).chain(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentsDirectory {
    entries: Vec<DirectoryEntry>,
}

impl StudentsDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        let file: DirectoryFile = serde_json::from_str(raw)?;
        Ok(Self {
            entries: file.students.0,
        })
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_key(&self, key: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn by_id(&self, id: &str) -> Option<&DirectoryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.id.as_deref() == Some(id))
    }

    pub fn by_email<'a>(&'a self, email: &'a str) -> impl Iterator<Item = &'a DirectoryEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.email_matches(email))
    }
}

#[derive(Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    students: OrderedEntries,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default, deserialize_with = "deserialize_identifier")]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Default)]
struct OrderedEntries(Vec<DirectoryEntry>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of student records")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, raw)) = map.next_entry::<String, RawEntry>()? {
                    entries.push(DirectoryEntry {
                        key,
                        id: raw.id,
                        name: raw.name,
                        email: raw.email,
                    });
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Text(String),
    Number(serde_json::Number),
}

/// Accepts `"123456"`, `123456` or `null` and yields a trimmed string.
pub(crate) fn deserialize_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawIdentifier>::deserialize(deserializer)?;
    Ok(raw
        .map(|raw| match raw {
            RawIdentifier::Text(text) => text.trim().to_string(),
            RawIdentifier::Number(number) => number.to_string(),
        })
        .filter(|value| !value.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "students": {
            "654321": {"id": 654321, "name": "Karim", "email": "karim@example.com"},
            "123456": {"id": "1234567", "name": "Rahim", "email": "Rahim@Example.com"},
            "111111": {"name": "Nameless"}
        }
    }"#;

    #[test]
    fn parse_keeps_file_order_and_stringifies_ids() {
        let directory = StudentsDirectory::from_json_str(SAMPLE).unwrap();
        let keys: Vec<&str> = directory.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["654321", "123456", "111111"]);
        assert_eq!(directory.entries()[0].id.as_deref(), Some("654321"));
        assert_eq!(directory.entries()[2].id, None);
    }

    #[test]
    fn lookups_by_key_id_and_email() {
        let directory = StudentsDirectory::from_json_str(SAMPLE).unwrap();
        assert_eq!(directory.by_key("123456").unwrap().name, "Rahim");
        assert_eq!(directory.by_id("1234567").unwrap().key, "123456");
        let hits: Vec<_> = directory.by_email("RAHIM@example.com").collect();
        assert_eq!(hits.len(), 1);
        assert!(directory.by_email("nobody@example.com").next().is_none());
    }

    #[test]
    fn identifiers_skip_duplicate_id() {
        let directory = StudentsDirectory::from_json_str(SAMPLE).unwrap();
        let first: Vec<&str> = directory.entries()[0].identifiers().collect();
        assert_eq!(first, vec!["654321"]);
        let second: Vec<&str> = directory.entries()[1].identifiers().collect();
        assert_eq!(second, vec!["123456", "1234567"]);
    }

    #[test]
    fn empty_document_is_empty_directory() {
        let directory = StudentsDirectory::from_json_str("{}").unwrap();
        assert!(directory.is_empty());
    }
}
