pub mod barrels;
pub mod builder;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod forward;
pub mod hybrid;
pub mod ingest;
pub mod inverted;
pub mod lexicon;
pub mod persist;
pub mod query;
pub mod tokenizer;

pub use config::{EngineConfig, IndexPaths};
pub use documents::NewDocument;
pub use embedding::{EmbeddingOracle, WordVectors};
pub use engine::{Engine, EngineStats};
pub use error::{EngineError, Result};
pub use ingest::IndexResult;
pub use lexicon::Lexicon;
pub use tokenizer::{StandardTokenizer, Tokenizer};

/// Lexicon-assigned word identifier. `0` is reserved for "unknown".
pub type WordId = u32;
/// Externally visible document identifier, e.g. `doc_17` or a corpus paper id.
pub type DocId = String;
