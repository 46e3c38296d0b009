use crate::barrels::BarrelStore;
use crate::config::{EngineConfig, IndexPaths};
use crate::documents::{DocumentStore, NewDocument};
use crate::embedding::{EmbeddingOracle, EmbeddingStore};
use crate::error::Result;
use crate::lexicon::Lexicon;
use crate::persist::load_meta;
use crate::tokenizer::{StandardTokenizer, Tokenizer};
use crate::DocId;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Caller-owned search engine state. Every operation goes through a handle
/// to one of these; several engines over different roots can coexist.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) paths: IndexPaths,
    pub(crate) lexicon: RwLock<Lexicon>,
    pub(crate) barrels: BarrelStore,
    pub(crate) embeddings: EmbeddingStore,
    pub(crate) documents: DocumentStore,
    pub(crate) tokenizer: Arc<dyn Tokenizer>,
    pub(crate) oracle: Option<Arc<dyn EmbeddingOracle>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_words: usize,
    pub shards: usize,
    pub total_documents: usize,
    pub embeddings: usize,
    pub shard_size: u32,
}

impl Engine {
    /// Load the lexicon and index metadata under `config.root`. A missing
    /// lexicon is a cold start; a corrupt lexicon or meta file is fatal.
    pub fn open(mut config: EngineConfig) -> Result<Self> {
        let paths = config.paths();
        if let Some(meta) = load_meta(&paths)? {
            if meta.shard_size != config.shard_size {
                tracing::warn!(configured = config.shard_size, persisted = meta.shard_size, "using persisted shard size");
                config.shard_size = meta.shard_size;
            }
        }
        let lexicon = Lexicon::load(&paths.lexicon())?;
        tracing::info!(words = lexicon.size(), root = %paths.root.display(), "engine opened");

        Ok(Self {
            barrels: BarrelStore::new(paths.barrels_dir(), config.shard_size),
            embeddings: EmbeddingStore::new(paths.embeddings_dir()),
            documents: DocumentStore::new(paths.documents_dir()),
            tokenizer: Arc::new(StandardTokenizer::new(config.remove_stopwords)),
            lexicon: RwLock::new(lexicon),
            oracle: None,
            paths,
            config,
        })
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn EmbeddingOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn paths(&self) -> &IndexPaths { &self.paths }

    pub fn barrels(&self) -> &BarrelStore { &self.barrels }

    pub fn embeddings(&self) -> &EmbeddingStore { &self.embeddings }

    pub fn has_oracle(&self) -> bool { self.oracle.is_some() }

    /// Read access to the lexicon for callers that need more than lookups.
    pub fn with_lexicon<R>(&self, f: impl FnOnce(&Lexicon) -> R) -> R {
        f(&self.lexicon.read())
    }

    /// Re-read the lexicon from disk, e.g. after an offline rebuild.
    pub fn reload_lexicon(&self) -> Result<()> {
        let lexicon = Lexicon::load(&self.paths.lexicon())?;
        *self.lexicon.write() = lexicon;
        Ok(())
    }

    /// Persist a raw document without indexing it; used by bulk builds.
    pub fn store_document(&self, doc: &NewDocument) -> Result<DocId> {
        self.documents.store(doc)
    }

    pub fn document(&self, doc_id: &str) -> Option<NewDocument> {
        match self.documents.load(doc_id) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(%doc_id, error = %e, "failed to read stored document");
                None
            }
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            total_words: self.lexicon.read().size(),
            shards: self.barrels.shard_ids().map(|ids| ids.len()).unwrap_or(0),
            total_documents: self.documents.count(),
            embeddings: self.embeddings.stored(),
            shard_size: self.barrels.shard_size(),
        }
    }
}
