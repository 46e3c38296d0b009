use crate::error::{EngineError, Result};
use crate::persist::{read_json_opt, write_json_atomic};
use crate::DocId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const GENERATED_PREFIX: &str = "doc_";

/// A document submitted for indexing. `doc_id` is optional; one is generated
/// when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub doc_id: Option<DocId>,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub summary: String,
    #[serde(default)]
    pub body: String,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { title: title.into(), body: body.into(), ..Self::default() }
    }

    pub fn with_id(mut self, doc_id: impl Into<DocId>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Title, abstract and body joined with spaces.
    pub fn text(&self) -> String {
        [self.title.as_str(), self.summary.as_str(), self.body.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Raw documents persisted as `documents/{doc_id}.json`.
pub struct DocumentStore {
    dir: PathBuf,
    /// Next generated `doc_<n>` number; scanned from disk on first use.
    allocation: Mutex<Option<u64>>,
}

impl DocumentStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), allocation: Mutex::new(None) }
    }

    pub fn path_for(&self, doc_id: &str) -> PathBuf {
        self.dir.join(format!("{doc_id}.json"))
    }

    /// Persist `doc` under its own id, or under a freshly generated
    /// `doc_<n>` one. Returns the id used. Id choice and write happen under
    /// one lock, so a generated id never lands on a file another call is
    /// writing.
    pub fn store(&self, doc: &NewDocument) -> Result<DocId> {
        let mut counter = self.allocation.lock();
        let id = match doc.doc_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                validate_id(id)?;
                if let (Some(next), Some(n)) = (&mut *counter, generated_number(id)) {
                    *next = (*next).max(n + 1);
                }
                id.to_string()
            }
            _ => {
                let n = self.reserve(&mut counter)?;
                *counter = Some(n + 1);
                generated_id(n)
            }
        };
        self.write(&id, doc)?;
        Ok(id)
    }

    pub fn load(&self, doc_id: &str) -> Result<Option<NewDocument>> {
        if validate_id(doc_id).is_err() {
            return Ok(None);
        }
        read_json_opt(&self.path_for(doc_id), "document")
    }

    /// The id the next generated document will get: `doc_<max+1>` over the
    /// stored `doc_<n>` files, `doc_1` when none exist.
    pub fn next_id(&self) -> Result<DocId> {
        let mut counter = self.allocation.lock();
        self.reserve(&mut counter).map(generated_id)
    }

    fn reserve(&self, counter: &mut Option<u64>) -> Result<u64> {
        let mut n = match *counter {
            Some(n) => n,
            None => {
                let max = self.ids()?.iter().filter_map(|id| generated_number(id)).max().unwrap_or(0);
                *counter = Some(max + 1);
                max + 1
            }
        };
        // another process sharing the directory may have taken it since the scan
        while self.path_for(&generated_id(n)).exists() {
            n += 1;
        }
        Ok(n)
    }

    pub fn ids(&self) -> Result<Vec<DocId>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    pub fn count(&self) -> usize {
        self.ids().map(|ids| ids.len()).unwrap_or(0)
    }

    fn write(&self, doc_id: &str, doc: &NewDocument) -> Result<()> {
        let stored = NewDocument { doc_id: Some(doc_id.to_string()), ..doc.clone() };
        write_json_atomic(&self.path_for(doc_id), &stored)
    }
}

fn generated_id(n: u64) -> DocId {
    format!("{GENERATED_PREFIX}{n}")
}

fn generated_number(doc_id: &str) -> Option<u64> {
    doc_id.strip_prefix(GENERATED_PREFIX)?.parse().ok()
}

/// Doc ids become file names, so path separators and dot-prefixed names are refused.
fn validate_id(doc_id: &str) -> Result<()> {
    if doc_id.starts_with('.') || doc_id.contains(['/', '\\']) || doc_id.contains('\0') {
        return Err(EngineError::InvalidDocument(format!("unusable doc_id {doc_id:?}")));
    }
    Ok(())
}
