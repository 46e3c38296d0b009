use crate::error::Result;
use crate::lexicon::Lexicon;
use crate::persist::write_json_atomic;
use crate::{DocId, WordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// doc → {wordID: term frequency}. A build-time intermediate only.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ForwardIndex {
    index: BTreeMap<DocId, BTreeMap<WordId, u32>>,
}

impl ForwardIndex {
    /// Count lexicon words per document. Tokens missing from the lexicon are
    /// ignored; a repeated doc_id keeps its first entry.
    pub fn build<'a, I>(docs: I, lexicon: &Lexicon) -> Self
    where
        I: IntoIterator<Item = (&'a DocId, &'a [String])>,
    {
        let mut index: BTreeMap<DocId, BTreeMap<WordId, u32>> = BTreeMap::new();
        for (doc_id, tokens) in docs {
            if index.contains_key(doc_id) {
                tracing::warn!(%doc_id, "duplicate document in build input, keeping first");
                continue;
            }
            let mut freqs = BTreeMap::new();
            for token in tokens {
                let wid = lexicon.id_for(token);
                if wid != 0 {
                    *freqs.entry(wid).or_insert(0) += 1;
                }
            }
            index.insert(doc_id.clone(), freqs);
        }
        Self { index }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocId, &BTreeMap<WordId, u32>)> {
        self.index.iter()
    }

    pub fn get(&self, doc_id: &str) -> Option<&BTreeMap<WordId, u32>> {
        self.index.get(doc_id)
    }

    pub fn len(&self) -> usize { self.index.len() }

    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.index)
    }
}
