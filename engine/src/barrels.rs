//! Sharded posting store.
//!
//! Word IDs are partitioned into barrels of `shard_size` consecutive IDs and
//! each barrel is one JSON file:
//!
//! ```text
//! barrels/barrel_{k}.json = { "<wordID>": ["doc", ...] | { "doc": [pos, ...] } }
//! ```
//!
//! A barrel is the unit of mutation: updating one word rewrites the whole
//! file through an atomic rename, so concurrent readers observe either the
//! old or the new barrel.

use crate::error::Result;
use crate::inverted::InvertedIndex;
use crate::persist::{read_json_opt, write_json_atomic};
use crate::{DocId, WordId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type ShardId = u32;
pub type Shard = BTreeMap<WordId, Posting>;

/// Posting list for one word.
///
/// Bulk builds write `Presence` lists; incremental ingestion writes
/// `Positional` maps. A `Presence` entry is migrated to `Positional` on the
/// first positional write (with empty position lists for the documents it
/// already held) and never goes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Posting {
    Presence(BTreeSet<DocId>),
    Positional(BTreeMap<DocId, Vec<u32>>),
}

impl Default for Posting {
    fn default() -> Self { Posting::Positional(BTreeMap::new()) }
}

impl Posting {
    /// Upsert `doc_id` with its ordered positions, migrating if needed.
    pub fn insert_positions(&mut self, doc_id: DocId, positions: Vec<u32>) {
        if let Posting::Presence(docs) = self {
            let migrated = std::mem::take(docs).into_iter().map(|d| (d, Vec::new())).collect();
            *self = Posting::Positional(migrated);
        }
        if let Posting::Positional(map) = self {
            map.insert(doc_id, positions);
        }
    }

    /// (doc, score) pairs: 1 for presence entries, the occurrence count for
    /// positional ones. Migrated entries with unknown positions count as 1.
    pub fn scores(&self) -> Vec<(DocId, u32)> {
        match self {
            Posting::Presence(docs) => docs.iter().map(|d| (d.clone(), 1)).collect(),
            Posting::Positional(map) => map
                .iter()
                .map(|(d, pos)| (d.clone(), (pos.len() as u32).max(1)))
                .collect(),
        }
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        match self {
            Posting::Presence(docs) => docs.contains(doc_id),
            Posting::Positional(map) => map.contains_key(doc_id),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Posting::Presence(docs) => docs.len(),
            Posting::Positional(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

pub struct BarrelStore {
    dir: PathBuf,
    shard_size: u32,
    locks: Mutex<HashMap<ShardId, Arc<Mutex<()>>>>,
}

impl BarrelStore {
    pub fn new<P: AsRef<Path>>(dir: P, shard_size: u32) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), shard_size: shard_size.max(1), locks: Mutex::new(HashMap::new()) }
    }

    pub fn shard_size(&self) -> u32 { self.shard_size }

    /// `⌊word_id / shard_size⌋`: IDs 1..size-1 share barrel 0, `size` opens barrel 1.
    pub fn shard_for(&self, word_id: WordId) -> ShardId {
        shard_for(word_id, self.shard_size)
    }

    pub fn shard_path(&self, shard: ShardId) -> PathBuf {
        self.dir.join(format!("barrel_{shard}.json"))
    }

    /// An absent barrel file is an empty shard.
    pub fn load_shard(&self, shard: ShardId) -> Result<Shard> {
        Ok(read_json_opt(&self.shard_path(shard), "barrel")?.unwrap_or_default())
    }

    pub fn save_shard(&self, shard: ShardId, data: &Shard) -> Result<()> {
        write_json_atomic(&self.shard_path(shard), data)?;
        tracing::debug!(shard, words = data.len(), "barrel written");
        Ok(())
    }

    /// Read-modify-write of the owning barrel under that barrel's lock.
    pub fn add_occurrence(&self, word_id: WordId, doc_id: &str, positions: Vec<u32>) -> Result<()> {
        let shard = self.shard_for(word_id);
        let lock = self.lock_for(shard);
        let _guard = lock.lock();
        let mut data = self.load_shard(shard)?;
        data.entry(word_id).or_default().insert_positions(doc_id.to_string(), positions);
        self.save_shard(shard, &data)
    }

    pub fn posting(&self, word_id: WordId) -> Result<Option<Posting>> {
        let mut data = self.load_shard(self.shard_for(word_id))?;
        Ok(data.remove(&word_id))
    }

    /// Scored postings for one word; empty when the word has none.
    pub fn postings_for(&self, word_id: WordId) -> Result<Vec<(DocId, u32)>> {
        Ok(self.posting(word_id)?.map(|p| p.scores()).unwrap_or_default())
    }

    /// Replace every barrel with the partitioning of `inverted`: stale barrel
    /// files from an earlier generation are removed first, then each shard is
    /// written once. Returns the number of shards written.
    pub fn write_all(&self, inverted: &InvertedIndex) -> Result<usize> {
        let cleared = self.clear()?;
        if cleared > 0 {
            tracing::info!(cleared, "removed stale barrels");
        }

        let mut groups: BTreeMap<ShardId, Shard> = BTreeMap::new();
        for (&word_id, docs) in inverted.iter() {
            let posting = Posting::Presence(docs.iter().cloned().collect());
            groups.entry(self.shard_for(word_id)).or_default().insert(word_id, posting);
        }
        for (shard, data) in &groups {
            self.save_shard(*shard, data)?;
            tracing::info!(shard, entries = data.len(), "saved barrel");
        }
        Ok(groups.len())
    }

    /// IDs of the barrel files currently on disk.
    pub fn shard_ids(&self) -> Result<Vec<ShardId>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            if let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_prefix("barrel_"))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn clear(&self) -> Result<usize> {
        let ids = self.shard_ids()?;
        for id in &ids {
            fs::remove_file(self.shard_path(*id))?;
        }
        Ok(ids.len())
    }

    fn lock_for(&self, shard: ShardId) -> Arc<Mutex<()>> {
        self.locks.lock().entry(shard).or_default().clone()
    }
}

pub fn shard_for(word_id: WordId, shard_size: u32) -> ShardId {
    word_id / shard_size.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn shard_assignment_is_pure() {
        assert_eq!(shard_for(1, 100_000), 0);
        assert_eq!(shard_for(99_999, 100_000), 0);
        assert_eq!(shard_for(100_000, 100_000), 1);
        assert_eq!(shard_for(199_999, 100_000), 1);
        assert_eq!(shard_for(7, 3), 2);
    }

    #[test]
    fn absent_shard_is_empty() {
        let dir = tempdir().unwrap();
        let store = BarrelStore::new(dir.path(), 10);
        assert!(store.load_shard(4).unwrap().is_empty());
        assert!(store.postings_for(42).unwrap().is_empty());
    }

    #[test]
    fn on_disk_shape_accepts_both_representations() {
        let dir = tempdir().unwrap();
        let store = BarrelStore::new(dir.path(), 100_000);
        fs::write(
            store.shard_path(0),
            r#"{"1": ["doc_b", "doc_a"], "2": {"doc_a": [0, 4, 9]}}"#,
        )
        .unwrap();
        let shard = store.load_shard(0).unwrap();
        assert!(matches!(shard[&1], Posting::Presence(_)));
        assert_eq!(store.postings_for(1).unwrap(), vec![("doc_a".to_string(), 1), ("doc_b".to_string(), 1)]);
        assert_eq!(store.postings_for(2).unwrap(), vec![("doc_a".to_string(), 3)]);
    }

    #[test]
    fn positional_write_migrates_presence_without_losing_members() {
        let dir = tempdir().unwrap();
        let store = BarrelStore::new(dir.path(), 100);
        let mut shard = Shard::new();
        shard.insert(5, Posting::Presence(["doc_a".to_string(), "doc_b".to_string()].into()));
        store.save_shard(0, &shard).unwrap();

        store.add_occurrence(5, "doc_c", vec![1, 3]).unwrap();

        let posting = store.posting(5).unwrap().unwrap();
        assert!(matches!(posting, Posting::Positional(_)));
        assert!(posting.contains("doc_a") && posting.contains("doc_b") && posting.contains("doc_c"));
        let scores: BTreeMap<_, _> = posting.scores().into_iter().collect();
        assert_eq!(scores["doc_a"], 1);
        assert_eq!(scores["doc_c"], 2);
    }

    #[test]
    fn add_occurrence_upserts_and_touches_only_owning_shard() {
        let dir = tempdir().unwrap();
        let store = BarrelStore::new(dir.path(), 10);
        store.add_occurrence(12, "doc_1", vec![0]).unwrap();
        store.add_occurrence(12, "doc_1", vec![0, 2, 7]).unwrap();
        assert_eq!(store.shard_ids().unwrap(), vec![1]);
        assert_eq!(store.postings_for(12).unwrap(), vec![("doc_1".to_string(), 3)]);
    }

    #[test]
    fn concurrent_writers_to_one_shard_do_not_lose_updates() {
        let dir = tempdir().unwrap();
        let store = Arc::new(BarrelStore::new(dir.path(), 1000));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.add_occurrence(i + 1, &format!("doc_{i}"), vec![i]).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.load_shard(0).unwrap().len(), 8);
    }

    #[test]
    fn write_all_clears_previous_generation() {
        let dir = tempdir().unwrap();
        let store = BarrelStore::new(dir.path(), 2);
        store.add_occurrence(9, "old", vec![0]).unwrap();

        let mut inverted = InvertedIndex::default();
        inverted.insert(1, "doc_a".into());
        inverted.insert(3, "doc_a".into());
        inverted.insert(3, "doc_b".into());
        assert_eq!(store.write_all(&inverted).unwrap(), 2);

        assert_eq!(store.shard_ids().unwrap(), vec![0, 1]);
        assert_eq!(store.postings_for(3).unwrap().len(), 2);
        assert!(store.postings_for(9).unwrap().is_empty());
    }
}
