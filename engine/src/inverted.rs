use crate::error::Result;
use crate::forward::ForwardIndex;
use crate::persist::write_json_atomic;
use crate::{DocId, WordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// wordID → [doc_id], in forward-index iteration order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    index: BTreeMap<WordId, Vec<DocId>>,
}

impl InvertedIndex {
    pub fn build(forward: &ForwardIndex) -> Self {
        let mut inverted = Self::default();
        for (doc_id, freqs) in forward.iter() {
            for &wid in freqs.keys() {
                inverted.insert(wid, doc_id.clone());
            }
        }
        inverted
    }

    pub fn insert(&mut self, word_id: WordId, doc_id: DocId) {
        self.index.entry(word_id).or_default().push(doc_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WordId, &Vec<DocId>)> {
        self.index.iter()
    }

    pub fn get(&self, word_id: WordId) -> Option<&[DocId]> {
        self.index.get(&word_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize { self.index.len() }

    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    pub fn posting_count(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.index)
    }
}
