use crate::barrels::BarrelStore;
use crate::config::IndexPaths;
use crate::embedding::{EmbeddingOracle, EmbeddingStore};
use crate::error::Result;
use crate::forward::ForwardIndex;
use crate::inverted::InvertedIndex;
use crate::lexicon::Lexicon;
use crate::DocId;
use serde::Serialize;
use std::fs;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildSummary {
    pub documents: usize,
    pub words: usize,
    pub postings: usize,
    pub shards: usize,
    pub embeddings: usize,
}

/// Offline bulk build from tokenized documents:
/// lexicon → forward index → inverted index → barrels (and embeddings when an
/// oracle is given). Writes every artifact under `paths.root`, replacing any
/// previous barrels. Must not run while another writer mutates the same root.
pub fn build_index(
    paths: &IndexPaths,
    shard_size: u32,
    docs: &[(DocId, Vec<String>)],
    oracle: Option<&dyn EmbeddingOracle>,
) -> Result<BuildSummary> {
    fs::create_dir_all(&paths.root)?;

    let mut lexicon = Lexicon::load(&paths.lexicon())?;
    lexicon.build(docs.iter().map(|(_, tokens)| tokens));
    lexicon.save(&paths.lexicon())?;
    tracing::info!(words = lexicon.size(), "lexicon saved");

    let forward = ForwardIndex::build(docs.iter().map(|(d, t)| (d, t.as_slice())), &lexicon);
    forward.save(&paths.forward_index())?;
    tracing::info!(documents = forward.len(), "forward index saved");

    let inverted = InvertedIndex::build(&forward);
    inverted.save(&paths.inverted_index())?;
    tracing::info!(words = inverted.len(), "inverted index saved");

    let barrels = BarrelStore::new(paths.barrels_dir(), shard_size);
    let shards = barrels.write_all(&inverted)?;

    let mut embeddings = 0;
    if let Some(oracle) = oracle {
        let store = EmbeddingStore::new(paths.embeddings_dir());
        for (doc_id, tokens) in docs {
            if store.embed_document(doc_id, tokens.as_slice(), oracle)? {
                embeddings += 1;
            }
        }
        tracing::info!(embeddings, "document embeddings saved");
    }

    Ok(BuildSummary {
        documents: forward.len(),
        words: lexicon.size(),
        postings: inverted.posting_count(),
        shards,
        embeddings,
    })
}
