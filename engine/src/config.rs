use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SHARD_SIZE: u32 = 100_000;
pub const DEFAULT_CANDIDATE_LIMIT: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Index root directory; every persisted file lives below it.
    pub root: PathBuf,
    /// Number of word IDs per barrel. Overridden by `meta.json` when present.
    pub shard_size: u32,
    /// Stage-1 keyword candidates kept for vector reranking.
    pub candidate_limit: usize,
    pub remove_stopwords: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./index"),
            shard_size: DEFAULT_SHARD_SIZE,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            remove_stopwords: true,
        }
    }
}

impl EngineConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), ..Self::default() }
    }

    pub fn with_shard_size(mut self, shard_size: u32) -> Self {
        self.shard_size = shard_size.max(1);
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    pub fn paths(&self) -> IndexPaths {
        IndexPaths::new(&self.root)
    }
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn lexicon(&self) -> PathBuf { self.root.join("lexicon.json") }
    pub fn forward_index(&self) -> PathBuf { self.root.join("forward_index.json") }
    pub fn inverted_index(&self) -> PathBuf { self.root.join("inverted_index.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn barrels_dir(&self) -> PathBuf { self.root.join("barrels") }
    pub fn embeddings_dir(&self) -> PathBuf { self.root.join("embeddings") }
    pub fn documents_dir(&self) -> PathBuf { self.root.join("documents") }
}
