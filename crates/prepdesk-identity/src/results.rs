//! Result books: static JSON files with one sheet per test.
use crate::errors::{IdentityError, IdentityResult};
use crate::user::MockVariant;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Mock,
    Full,
    Simple,
}

impl ResultKind {
    pub const ALL: [ResultKind; 3] = [ResultKind::Mock, ResultKind::Full, ResultKind::Simple];

    pub fn parse(raw: &str) -> IdentityResult<Self> {
        match raw {
            "mock" => Ok(Self::Mock),
            "full" => Ok(Self::Full),
            "simple" => Ok(Self::Simple),
            other => Err(IdentityError::UnknownResultKind(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Full => "full",
            Self::Simple => "simple",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Mock => "mock-tests.json",
            Self::Full => "full-tests.json",
            Self::Simple => "simple-tests.json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    #[serde(default)]
    pub correct: f64,
    #[serde(default)]
    pub wrong: f64,
    #[serde(default)]
    pub marks: f64,
    #[serde(default)]
    pub passed: bool,
}

/// One student's row. Fields the portal does not interpret ride along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default)]
    pub sections: BTreeMap<String, SectionScore>,
    #[serde(default)]
    pub total_marks: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default)]
    pub passed_all: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSheet {
    #[serde(default)]
    pub results: HashMap<String, TestResult>,
    #[serde(default)]
    pub class_stats: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<MockVariant>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultBook {
    #[serde(default)]
    pub tests: BTreeMap<String, TestSheet>,
}

impl ResultBook {
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn test(&self, name: &str) -> Option<&TestSheet> {
        self.tests.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds_map_to_files() {
        assert_eq!(ResultKind::parse("mock").unwrap().file_name(), "mock-tests.json");
        assert_eq!(ResultKind::Full.file_name(), "full-tests.json");
        assert_eq!(ResultKind::Simple.as_str(), "simple");
        assert!(ResultKind::parse("weekly").is_err());
    }

    #[test]
    fn book_parses_and_preserves_extra_fields() {
        let raw = json!({
            "tests": {
                "Mock 1": {
                    "variant": "duIba",
                    "classStats": {"average": 41.5},
                    "results": {
                        "123456": {
                            "sections": {"English": {"correct": 20, "wrong": 3, "marks": 19.25, "passed": true}},
                            "totalMarks": 55.5,
                            "rank": 3,
                            "passedAll": true,
                            "percentile": 92.1
                        }
                    }
                }
            }
        })
        .to_string();

        let book = ResultBook::from_json_str(&raw).unwrap();
        let sheet = book.test("Mock 1").unwrap();
        assert_eq!(sheet.variant, Some(MockVariant::DuIba));
        let row = &sheet.results["123456"];
        assert_eq!(row.rank, Some(3));
        assert_eq!(row.sections["English"].marks, 19.25);

        let echoed = serde_json::to_value(row).unwrap();
        assert_eq!(echoed["percentile"], json!(92.1));
        assert_eq!(echoed["totalMarks"], json!(55.5));
    }

    #[test]
    fn empty_object_is_empty_book() {
        assert!(ResultBook::from_json_str("{}").unwrap().is_empty());
    }
}
