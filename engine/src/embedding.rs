//! Document embeddings.
//!
//! A document vector is the centroid of the vectors of its tokens that the
//! [`EmbeddingOracle`] recognizes. Vectors are stored one file per document
//! (`embeddings/{doc_id}.bin`, bincode `Vec<f32>`) and cached in memory the
//! first time a query needs them.

use crate::error::{EngineError, Result};
use crate::persist::write_atomic;
use crate::DocId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of token vectors, e.g. a pre-trained word-vector table.
pub trait EmbeddingOracle: Send + Sync {
    fn vector_for(&self, token: &str) -> Option<&[f32]>;
    fn dimension(&self) -> usize;
}

/// Word vectors in the GloVe text format: `word v1 v2 ... vd` per line.
#[derive(Debug, Default)]
pub struct WordVectors {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl WordVectors {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| EngineError::load("word vectors", path, e))?;
        let mut out = Self::default();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            let vector = parts
                .map(str::parse::<f32>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| EngineError::load("word vectors", path, format!("line {}: {e}", lineno + 1)))?;
            out.insert(word.to_string(), vector)?;
        }
        tracing::info!(words = out.len(), dimension = out.dimension, "word vectors loaded");
        Ok(out)
    }

    /// The first inserted vector fixes the dimensionality.
    pub fn insert(&mut self, word: String, vector: Vec<f32>) -> Result<()> {
        if self.vectors.is_empty() && self.dimension == 0 {
            self.dimension = vector.len();
        } else if vector.len() != self.dimension {
            return Err(EngineError::DimensionMismatch { expected: self.dimension, found: vector.len() });
        }
        self.vectors.insert(word, vector);
        Ok(())
    }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }
}

impl FromIterator<(String, Vec<f32>)> for WordVectors {
    /// Entries whose dimension disagrees with the first are dropped.
    fn from_iter<T: IntoIterator<Item = (String, Vec<f32>)>>(iter: T) -> Self {
        let mut out = Self::default();
        for (word, vector) in iter {
            let _ = out.insert(word, vector);
        }
        out
    }
}

impl EmbeddingOracle for WordVectors {
    fn vector_for(&self, token: &str) -> Option<&[f32]> {
        self.vectors.get(token).map(Vec::as_slice)
    }

    fn dimension(&self) -> usize { self.dimension }
}

/// Mean of the recognized tokens' vectors, `None` if no token is recognized.
pub fn centroid<S: AsRef<str>>(tokens: &[S], oracle: &dyn EmbeddingOracle) -> Option<Vec<f32>> {
    let dim = oracle.dimension();
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;
    for token in tokens {
        if let Some(v) = oracle.vector_for(token.as_ref()) {
            if v.len() != dim { continue; }
            for (acc, x) in sum.iter_mut().zip(v) {
                *acc += x;
            }
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let n = count as f32;
    sum.iter_mut().for_each(|x| *x /= n);
    Some(sum)
}

/// Cosine similarity; 0 when either side has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

pub struct EmbeddingStore {
    dir: PathBuf,
    cache: RwLock<HashMap<DocId, Arc<Vec<f32>>>>,
}

impl EmbeddingStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), cache: RwLock::new(HashMap::new()) }
    }

    pub fn path_for(&self, doc_id: &str) -> PathBuf {
        self.dir.join(format!("{doc_id}.bin"))
    }

    pub fn save(&self, doc_id: &str, vector: Vec<f32>) -> Result<()> {
        let bytes = bincode::serialize(&vector)?;
        write_atomic(&self.path_for(doc_id), &bytes)?;
        self.cache.write().insert(doc_id.to_string(), Arc::new(vector));
        Ok(())
    }

    /// Cached vector, loading it from disk on first use. Misses are not
    /// cached so a document embedded later becomes visible.
    pub fn get(&self, doc_id: &str) -> Result<Option<Arc<Vec<f32>>>> {
        if let Some(v) = self.cache.read().get(doc_id) {
            return Ok(Some(Arc::clone(v)));
        }
        let bytes = match fs::read(self.path_for(doc_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let vector: Vec<f32> = bincode::deserialize(&bytes)?;
        // two racing loaders read the same file; whichever lands first wins
        let mut cache = self.cache.write();
        let entry = cache.entry(doc_id.to_string()).or_insert_with(|| Arc::new(vector));
        Ok(Some(Arc::clone(entry)))
    }

    /// Compute and persist the document centroid. `Ok(false)` when no token
    /// has a vector.
    pub fn embed_document<S: AsRef<str>>(&self, doc_id: &str, tokens: &[S], oracle: &dyn EmbeddingOracle) -> Result<bool> {
        match centroid(tokens, oracle) {
            Some(vector) => {
                self.save(doc_id, vector)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn cached(&self) -> usize { self.cache.read().len() }

    pub fn stored(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("bin"))
                    .count()
            })
            .unwrap_or(0)
    }
}
