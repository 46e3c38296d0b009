use engine::barrels::Posting;
use engine::builder::build_index;
use engine::tokenizer::tokenize;
use engine::{DocId, EmbeddingOracle, Engine, EngineConfig, Lexicon, NewDocument, WordVectors};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn corpus() -> Vec<(DocId, Vec<String>)> {
    vec![
        ("paper_a".into(), tokenize("Covid vaccine efficacy in covid wards")),
        ("paper_b".into(), tokenize("Vaccine storage logistics")),
    ]
}

fn vectors() -> Arc<WordVectors> {
    Arc::new(
        [
            ("covid".to_string(), vec![1.0, 0.0]),
            ("vaccine".to_string(), vec![0.0, 1.0]),
            ("booster".to_string(), vec![0.0, 1.0]),
        ]
        .into_iter()
        .collect(),
    )
}

fn build(root: &Path, shard_size: u32) -> Engine {
    let config = EngineConfig::new(root).with_shard_size(shard_size);
    build_index(&config.paths(), shard_size, &corpus(), None).unwrap();
    Engine::open(config).unwrap()
}

#[test]
fn bulk_build_writes_presence_postings() {
    let dir = tempdir().unwrap();
    let engine = build(dir.path(), 100_000);

    assert!(dir.path().join("forward_index.json").exists());
    assert!(dir.path().join("inverted_index.json").exists());
    assert_eq!(engine.barrels().shard_ids().unwrap(), vec![0]);

    // presence postings score 1 regardless of frequency
    assert_eq!(engine.search_single("covid"), vec![("paper_a".to_string(), 1)]);
    let vaccine = engine.search_single("vaccine");
    assert_eq!(vaccine.len(), 2);
    assert_eq!(engine.search_multi("covid vaccine"), vec![("paper_a".to_string(), 1)]);
}

#[test]
fn ingest_allocates_words_and_writes_positions() {
    let dir = tempdir().unwrap();
    let engine = build(dir.path(), 100_000);
    let covid_id = engine.with_lexicon(|l| l.id_for("covid"));
    let next = engine.with_lexicon(|l| l.next_id());

    let result = engine.index_document(NewDocument::new("Booster study", "covid booster covid outcomes"));
    assert!(result.success, "{}", result.message);
    assert_eq!(result.doc_id.as_deref(), Some("doc_1"));
    assert_eq!(result.tokens_count, 6);
    assert_eq!(result.unique_words, 4);
    assert_eq!(result.new_words_added, 3);
    assert_eq!(result.failed_postings, 0);
    assert!(!result.embedding_created);

    // existing ids untouched, new ones continue the counter
    assert_eq!(engine.with_lexicon(|l| l.id_for("covid")), covid_id);
    assert_eq!(engine.with_lexicon(|l| l.id_for("booster")), next);

    // lexicon was persisted
    let reloaded = Lexicon::load(&dir.path().join("lexicon.json")).unwrap();
    assert_eq!(reloaded.id_for("outcomes"), engine.with_lexicon(|l| l.id_for("outcomes")));

    // legacy entry migrated, old membership kept
    let posting = engine.barrels().posting(covid_id).unwrap().unwrap();
    assert!(matches!(posting, Posting::Positional(_)));
    assert!(posting.contains("paper_a"));
    assert_eq!(
        engine.search_single("covid"),
        vec![("doc_1".to_string(), 2), ("paper_a".to_string(), 1)]
    );
    assert_eq!(engine.search_multi("booster study"), vec![("doc_1".to_string(), 2)]);
    assert_eq!(engine.autocomplete("bo", 5), vec!["booster".to_string()]);

    assert!(engine.document("doc_1").is_some());
}

#[test]
fn ingest_without_new_words_leaves_lexicon_file_alone() {
    let dir = tempdir().unwrap();
    let engine = build(dir.path(), 100_000);
    let lexicon_path = dir.path().join("lexicon.json");
    let before = fs::read(&lexicon_path).unwrap();
    fs::remove_file(&lexicon_path).unwrap();

    let result = engine.index_document(NewDocument::new("", "vaccine covid"));
    assert!(result.success);
    assert_eq!(result.new_words_added, 0);
    assert!(!lexicon_path.exists());
    assert!(!before.is_empty());
}

#[test]
fn generated_ids_increment_and_explicit_ids_are_kept() {
    let dir = tempdir().unwrap();
    let engine = build(dir.path(), 100_000);

    let first = engine.index_document(NewDocument::new("one", "vaccine trial"));
    let named = engine.index_document(NewDocument::new("two", "vaccine trial").with_id("doc_41"));
    let third = engine.index_document(NewDocument::new("three", "vaccine trial"));
    assert_eq!(first.doc_id.as_deref(), Some("doc_1"));
    assert_eq!(named.doc_id.as_deref(), Some("doc_41"));
    assert_eq!(third.doc_id.as_deref(), Some("doc_42"));
}

#[test]
fn empty_document_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    let engine = build(dir.path(), 100_000);
    let result = engine.index_document(NewDocument::default());
    assert!(!result.success);
    assert!(result.message.contains("no text"));
}

#[test]
fn shard_failure_is_counted_and_other_words_still_indexed() {
    let dir = tempdir().unwrap();
    let engine = build(dir.path(), 2);
    // word id 1 lives in barrel 0; make that barrel unreadable
    let barrel_0 = dir.path().join("barrels/barrel_0.json");
    fs::remove_file(&barrel_0).unwrap();
    fs::create_dir_all(barrel_0.join("blocker")).unwrap();
    let first_word = engine.with_lexicon(|l| l.word_for(1).to_string());

    let result = engine.index_document(NewDocument::new("", format!("{first_word} booster")));
    assert!(result.success);
    assert_eq!(result.failed_postings, 1);
    assert_eq!(engine.search_single("booster"), vec![("doc_1".to_string(), 1)]);
}

#[test]
fn embeddings_are_created_when_oracle_present() {
    let dir = tempdir().unwrap();
    let engine = build(dir.path(), 100_000).with_oracle(vectors());

    let result = engine.index_document(NewDocument::new("", "covid booster"));
    assert!(result.embedding_created);
    let none = engine.index_document(NewDocument::new("", "storage logistics"));
    assert!(none.success);
    assert!(!none.embedding_created);

    let doc_id = result.doc_id.unwrap();
    assert_eq!(engine.embeddings().get(&doc_id).unwrap().unwrap().as_slice(), &[0.5, 0.5]);
    let ranked = engine.search_semantic("covid booster", 5);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].0, doc_id);
}

#[test]
fn bulk_build_embeds_documents_with_oracle() {
    let dir = tempdir().unwrap();
    let config = EngineConfig::new(dir.path());
    let oracle = vectors();
    let summary = build_index(&config.paths(), 100_000, &corpus(), Some(&*oracle as &dyn EmbeddingOracle)).unwrap();
    assert_eq!(summary.documents, 2);
    assert_eq!(summary.embeddings, 2);
    assert_eq!(summary.shards, 1);

    let engine = Engine::open(config).unwrap().with_oracle(oracle);
    let results = engine.search_semantic("vaccine", 10);
    assert_eq!(results[0].0, "paper_b");
}

#[test]
fn failed_lexicon_save_leaves_no_allocations_behind() {
    let dir = tempdir().unwrap();
    let engine = build(dir.path(), 100_000);
    let next = engine.with_lexicon(|l| l.next_id());
    // the atomic save cannot create its temp file
    let blocker = dir.path().join("lexicon.json.tmp");
    fs::create_dir_all(&blocker).unwrap();

    let failed = engine.index_document(NewDocument::new("", "covid zebra"));
    assert!(!failed.success);
    assert_eq!(engine.with_lexicon(|l| l.id_for("zebra")), 0);
    assert_eq!(engine.with_lexicon(|l| l.next_id()), next);
    assert_eq!(engine.stats().total_documents, 0);

    fs::remove_dir(&blocker).unwrap();
    let retried = engine.index_document(NewDocument::new("", "covid zebra"));
    assert!(retried.success, "{}", retried.message);
    assert_eq!(retried.new_words_added, 1);
    assert_eq!(retried.doc_id.as_deref(), Some("doc_1"));

    // after a restart the next new word gets a fresh id, not zebra's
    let reopened = Engine::open(EngineConfig::new(dir.path())).unwrap();
    assert_eq!(reopened.search_single("zebra"), vec![("doc_1".to_string(), 1)]);
    let yak = reopened.index_document(NewDocument::new("", "yak"));
    assert_ne!(reopened.with_lexicon(|l| l.id_for("yak")), reopened.with_lexicon(|l| l.id_for("zebra")));
    assert_eq!(reopened.search_single("yak"), vec![(yak.doc_id.unwrap(), 1)]);
}

#[test]
fn concurrent_ingests_get_distinct_ids_and_all_postings() {
    let dir = tempdir().unwrap();
    let engine = Arc::new(build(dir.path(), 100_000));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.index_document(NewDocument::new(format!("batch {i}"), "vaccine rollout")))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.iter().all(|r| r.success && r.failed_postings == 0));

    let mut ids: Vec<DocId> = results.into_iter().filter_map(|r| r.doc_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    let mut found: Vec<DocId> = engine.search_single("rollout").into_iter().map(|(d, _)| d).collect();
    found.sort();
    assert_eq!(found, ids);
    assert_eq!(engine.search_single("vaccine").len(), 10);
    // "rollout" and "batch" were each allocated exactly once
    let reloaded = Lexicon::load(&dir.path().join("lexicon.json")).unwrap();
    assert_eq!(reloaded.size(), engine.with_lexicon(|l| l.size()));
}
