//! Keyword retrieval: single word, conjunctive multi-word, and prefix
//! completion over the lexicon.

use crate::engine::Engine;
use crate::{DocId, WordId};
use rayon::prelude::*;
use std::collections::HashMap;

impl Engine {
    /// Documents containing `word`, best first. Unknown words and unreadable
    /// barrels both yield an empty list.
    pub fn search_single(&self, word: &str) -> Vec<(DocId, u32)> {
        let word = normalize(word);
        let word_id = self.lexicon.read().id_for(&word);
        if word_id == 0 {
            tracing::debug!(%word, "word not in lexicon");
            return Vec::new();
        }
        rank(self.fetch(word_id))
    }

    /// Strict AND over whitespace-separated words. Each surviving document
    /// keeps the score it had for the first word.
    pub fn search_multi(&self, query: &str) -> Vec<(DocId, u32)> {
        let words: Vec<String> = query.split_whitespace().map(normalize).collect();
        if words.is_empty() {
            return Vec::new();
        }

        // resolve ids under one read lock, then fetch postings independently
        let ids: Vec<WordId> = {
            let lexicon = self.lexicon.read();
            words.iter().map(|w| lexicon.id_for(w)).collect()
        };
        if ids.contains(&0) {
            return Vec::new();
        }
        let per_word: Vec<Vec<(DocId, u32)>> = ids.par_iter().map(|&id| self.fetch(id)).collect();

        let mut per_word = per_word.into_iter();
        let Some(first) = per_word.next() else { return Vec::new() };
        let mut results: HashMap<DocId, u32> = first.into_iter().collect();
        for postings in per_word {
            if results.is_empty() {
                break;
            }
            let present: HashMap<DocId, u32> = postings.into_iter().collect();
            results.retain(|doc, _| present.contains_key(doc));
        }
        rank(results.into_iter().collect())
    }

    /// Up to `top_n` lexicon words starting with `prefix`, most recently
    /// assigned first. An empty prefix suggests nothing.
    pub fn autocomplete(&self, prefix: &str, top_n: usize) -> Vec<String> {
        let prefix = normalize(prefix);
        if prefix.is_empty() || top_n == 0 {
            return Vec::new();
        }
        let lexicon = self.lexicon.read();
        let mut matches: Vec<(&str, WordId)> = lexicon.words_with_prefix(&prefix).collect();
        matches.sort_unstable_by(|a, b| b.1.cmp(&a.1));
        matches.into_iter().take(top_n).map(|(w, _)| w.to_string()).collect()
    }

    fn fetch(&self, word_id: WordId) -> Vec<(DocId, u32)> {
        match self.barrels.postings_for(word_id) {
            Ok(postings) => postings,
            Err(e) => {
                tracing::warn!(word_id, error = %e, "failed to read postings");
                Vec::new()
            }
        }
    }
}

fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Score descending, doc_id ascending on ties.
pub(crate) fn rank(mut results: Vec<(DocId, u32)>) -> Vec<(DocId, u32)> {
    results.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    results
}
