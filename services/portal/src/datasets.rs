//! Read-only result data loaded at startup.
//!
//! The data directory holds `students.json` (the students directory) and one
//! result book per kind (`mock-tests.json`, `full-tests.json`,
//! `simple-tests.json`). A missing file loads as empty with a warning; a file
//! that exists but does not parse stops startup.
use anyhow::{Context, Result};
use prepdesk_identity::{ResultBook, ResultKind, StudentsDirectory};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const STUDENTS_FILE: &str = "students.json";

#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub directory: StudentsDirectory,
    books: HashMap<ResultKind, ResultBook>,
}

impl Datasets {
    pub fn from_parts(
        directory: StudentsDirectory,
        books: impl IntoIterator<Item = (ResultKind, ResultBook)>,
    ) -> Self {
        Self {
            directory,
            books: books.into_iter().collect(),
        }
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let directory = match read_optional(&dir.join(STUDENTS_FILE))? {
            Some(raw) => StudentsDirectory::from_json_str(&raw)
                .with_context(|| format!("parse {}", dir.join(STUDENTS_FILE).display()))?,
            None => StudentsDirectory::default(),
        };

        let mut books = HashMap::new();
        for kind in ResultKind::ALL {
            let path = dir.join(kind.file_name());
            let book = match read_optional(&path)? {
                Some(raw) => ResultBook::from_json_str(&raw)
                    .with_context(|| format!("parse {}", path.display()))?,
                None => ResultBook::default(),
            };
            books.insert(kind, book);
        }

        tracing::info!(
            data_dir = %dir.display(),
            students = directory.len(),
            "loaded result datasets"
        );
        Ok(Self { directory, books })
    }

    pub fn book(&self, kind: ResultKind) -> Option<&ResultBook> {
        self.books.get(&kind)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "dataset file missing; serving empty data");
            Ok(None)
        }
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}
