//! Bidirectional word ↔ ID vocabulary.
//!
//! The lexicon is the only place word IDs are handed out. IDs start at 1,
//! grow monotonically and are never reused, so every ID ever written to a
//! barrel keeps pointing at the same word.

use crate::error::Result;
use crate::persist::{read_json_opt, write_json_atomic};
use crate::tokenizer::is_valid_word;
use crate::WordId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Lexicon {
    word_to_id: BTreeMap<String, WordId>,
    id_to_word: HashMap<WordId, String>,
    next_id: WordId,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self { word_to_id: BTreeMap::new(), id_to_word: HashMap::new(), next_id: 1 }
    }
}

impl Lexicon {
    pub fn new() -> Self { Self::default() }

    /// Assign IDs to every valid word of the batch that is not yet known,
    /// in sorted order starting from the next free ID.
    pub fn build<I, T, S>(&mut self, token_lists: I)
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words = BTreeSet::new();
        for tokens in token_lists {
            for token in tokens {
                let token = token.as_ref();
                if is_valid_word(token) && !self.word_to_id.contains_key(token) {
                    words.insert(token.to_string());
                }
            }
        }
        for word in words {
            self.allocate(word);
        }
    }

    /// `0` for unknown words.
    pub fn id_for(&self, word: &str) -> WordId {
        self.word_to_id.get(word).copied().unwrap_or(0)
    }

    /// Empty string for unknown IDs.
    pub fn word_for(&self, id: WordId) -> &str {
        self.id_to_word.get(&id).map(String::as_str).unwrap_or("")
    }

    pub fn size(&self) -> usize { self.word_to_id.len() }

    pub fn is_empty(&self) -> bool { self.word_to_id.is_empty() }

    pub fn next_id(&self) -> WordId { self.next_id }

    /// Existing ID, or a freshly allocated one. Invalid words are never
    /// allocated and return `0`.
    pub fn add_if_absent(&mut self, word: &str) -> WordId {
        if let Some(&id) = self.word_to_id.get(word) {
            return id;
        }
        if !is_valid_word(word) {
            return 0;
        }
        self.allocate(word.to_string())
    }

    fn allocate(&mut self, word: String) -> WordId {
        let id = self.next_id;
        self.next_id += 1;
        self.id_to_word.insert(id, word.clone());
        self.word_to_id.insert(word, id);
        id
    }

    /// Forget every word allocated at or after `next_id`, restoring the
    /// counter. Undoes allocations whose save did not reach disk.
    pub(crate) fn rollback_to(&mut self, next_id: WordId) {
        if next_id >= self.next_id {
            return;
        }
        for id in next_id..self.next_id {
            if let Some(word) = self.id_to_word.remove(&id) {
                self.word_to_id.remove(&word);
            }
        }
        self.next_id = next_id;
    }

    /// Words starting with `prefix`, paired with their IDs, in word order.
    pub fn words_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, WordId)> + 'a {
        self.word_to_id
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(w, _)| w.starts_with(prefix))
            .map(|(w, &id)| (w.as_str(), id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, WordId)> {
        self.word_to_id.iter().map(|(w, &id)| (w.as_str(), id))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.word_to_id)
    }

    /// A missing file yields an empty lexicon; an unreadable or corrupt one is
    /// a load error.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(word_to_id) = read_json_opt::<BTreeMap<String, WordId>>(path, "lexicon")? else {
            tracing::info!(path = %path.display(), "no lexicon found, starting empty");
            return Ok(Self::default());
        };
        Ok(Self::from_map(word_to_id))
    }

    fn from_map(word_to_id: BTreeMap<String, WordId>) -> Self {
        let id_to_word: HashMap<WordId, String> =
            word_to_id.iter().map(|(w, &id)| (id, w.clone())).collect();
        let next_id = word_to_id.values().copied().max().map_or(1, |max| max + 1);
        Self { word_to_id, id_to_word, next_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn build_assigns_sorted_sequential_ids() {
        let mut lex = Lexicon::new();
        lex.build(vec![vec!["vaccine", "covid"], vec!["covid", "x", "Bad"]]);
        assert_eq!(lex.id_for("covid"), 1);
        assert_eq!(lex.id_for("vaccine"), 2);
        assert_eq!(lex.id_for("x"), 0);
        assert_eq!(lex.id_for("Bad"), 0);
        assert_eq!(lex.word_for(2), "vaccine");
        assert_eq!(lex.word_for(9), "");
        assert_eq!(lex.size(), 2);
    }

    #[test]
    fn ids_are_stable_across_later_insertions() {
        let mut lex = Lexicon::new();
        lex.build(vec![vec!["beta", "delta"]]);
        let beta = lex.id_for("beta");
        assert_eq!(lex.add_if_absent("alpha"), 3);
        lex.build(vec![vec!["aardvark", "zulu", "beta"]]);
        assert_eq!(lex.id_for("beta"), beta);
        assert_eq!(lex.id_for("alpha"), 3);
        assert_eq!(lex.id_for("aardvark"), 4);
        assert_eq!(lex.id_for("zulu"), 5);
        assert_eq!(lex.add_if_absent("zulu"), 5);
        assert_eq!(lex.add_if_absent("Zulu"), 0);
        assert_eq!(lex.next_id(), 6);
    }

    #[test]
    fn save_load_round_trip_recomputes_next_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lexicon.json");
        let mut lex = Lexicon::new();
        lex.build(vec![vec!["covid", "vaccine", "trial"]]);
        lex.save(&path).unwrap();

        let mut back = Lexicon::load(&path).unwrap();
        let original: Vec<_> = lex.iter().map(|(w, id)| (w.to_string(), id)).collect();
        let reloaded: Vec<_> = back.iter().map(|(w, id)| (w.to_string(), id)).collect();
        assert_eq!(original, reloaded);
        assert_eq!(back.add_if_absent("dose"), 4);
    }

    #[test]
    fn missing_file_is_cold_start_corrupt_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lexicon.json");
        assert!(Lexicon::load(&path).unwrap().is_empty());
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(Lexicon::load(&path).is_err());
    }

    #[test]
    fn prefix_scan_stays_within_prefix() {
        let mut lex = Lexicon::new();
        lex.build(vec![vec!["cough", "covid", "cover", "cow", "dog"]]);
        let words: Vec<_> = lex.words_with_prefix("cov").map(|(w, _)| w).collect();
        assert_eq!(words, vec!["cover", "covid"]);
    }

    #[test]
    fn rollback_forgets_unsaved_words() {
        let mut lex = Lexicon::new();
        lex.build(vec![vec!["covid", "vaccine"]]);
        let mark = lex.next_id();
        assert_eq!(lex.add_if_absent("zebra"), 3);
        assert_eq!(lex.add_if_absent("yak"), 4);
        lex.rollback_to(mark);
        assert_eq!(lex.id_for("zebra"), 0);
        assert_eq!(lex.word_for(4), "");
        assert_eq!(lex.size(), 2);
        assert_eq!(lex.add_if_absent("yak"), 3);
    }
}
