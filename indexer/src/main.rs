use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use engine::builder::build_index;
use engine::persist::{save_meta, MetaFile, INDEX_VERSION};
use engine::{DocId, EmbeddingOracle, Engine, EngineConfig, NewDocument, StandardTokenizer, Tokenizer, WordVectors};
use serde::{Deserialize, Deserializer};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default, alias = "paper_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    title: String,
    #[serde(default, rename = "abstract", deserialize_with = "text_field")]
    summary: String,
    #[serde(default, alias = "body_text", deserialize_with = "text_field")]
    body: String,
}

/// Accepts a plain string or a list of `{"text": ...}` paragraphs.
fn text_field<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    })
}

impl From<InputDoc> for NewDocument {
    fn from(doc: InputDoc) -> Self {
        NewDocument { doc_id: doc.id, title: doc.title, summary: doc.summary, body: doc.body }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, extend and query a sharded inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Single,
    Multi,
    Semantic,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Word vectors in GloVe text format, used to embed documents
        #[arg(long)]
        vectors: Option<PathBuf>,
        /// Word IDs per barrel
        #[arg(long, default_value_t = engine::config::DEFAULT_SHARD_SIZE)]
        shard_size: u32,
    },
    /// Add one JSON document to an existing index
    Add {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        vectors: Option<PathBuf>,
    },
    /// Run a query against the index
    Search {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        query: String,
        #[arg(long, value_enum, default_value_t = Mode::Multi)]
        mode: Mode,
        #[arg(long, default_value_t = 10)]
        k: usize,
        #[arg(long)]
        vectors: Option<PathBuf>,
    },
    /// Suggest lexicon words for a prefix
    Suggest {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        prefix: String,
        #[arg(long, default_value_t = 10)]
        n: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, vectors, shard_size } => {
            build(&input, &output, vectors.as_deref(), shard_size)
        }
        Commands::Add { index, file, vectors } => {
            let engine = open_engine(&index, vectors.as_deref())?;
            let doc: InputDoc = serde_json::from_reader(BufReader::new(File::open(&file)?))
                .with_context(|| format!("parsing {}", file.display()))?;
            let result = engine.index_document(doc.into());
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Search { index, query, mode, k, vectors } => {
            let engine = open_engine(&index, vectors.as_deref())?;
            let hits: Vec<(DocId, f32)> = match mode {
                Mode::Single => engine.search_single(&query).into_iter().map(|(d, s)| (d, s as f32)).collect(),
                Mode::Multi => engine.search_multi(&query).into_iter().map(|(d, s)| (d, s as f32)).collect(),
                Mode::Semantic => engine.search_semantic(&query, k),
            };
            if hits.is_empty() {
                println!("No results found.");
            }
            for (doc_id, score) in hits.into_iter().take(k) {
                println!("{doc_id} | Score: {score}");
            }
            Ok(())
        }
        Commands::Suggest { index, prefix, n } => {
            let engine = open_engine(&index, None)?;
            for word in engine.autocomplete(&prefix, n) {
                println!("{word}");
            }
            Ok(())
        }
    }
}

fn open_engine(index: &str, vectors: Option<&Path>) -> Result<Engine> {
    let engine = Engine::open(EngineConfig::new(index))?;
    Ok(match vectors {
        Some(path) => engine.with_oracle(Arc::new(WordVectors::load(path)?)),
        None => engine,
    })
}

fn build(input: &str, output: &str, vectors: Option<&Path>, shard_size: u32) -> Result<()> {
    let input_path = Path::new(input);
    let config = EngineConfig::new(output).with_shard_size(shard_size);
    let paths = config.paths();
    fs::create_dir_all(&paths.root)?;

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }

    let mut raw: Vec<NewDocument> = Vec::new();
    for file in &files {
        let before = raw.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut raw)?;
        } else {
            read_json(file, &mut raw)?;
        }
        // single-document files without an id are named after the file
        if raw.len() == before + 1 && raw[before].doc_id.is_none() {
            raw[before].doc_id = file.file_stem().and_then(|s| s.to_str()).map(str::to_string);
        }
    }

    let engine = Engine::open(config.clone())?;
    let tokenizer = StandardTokenizer::new(config.remove_stopwords);
    let mut seen: HashSet<DocId> = HashSet::new();
    let mut tokenized: Vec<(DocId, Vec<String>)> = Vec::with_capacity(raw.len());
    for doc in raw {
        let stored = engine.store_document(&doc)?;
        if !seen.insert(stored.clone()) {
            tracing::warn!(doc_id = %stored, "duplicate doc_id in input, later copy replaces stored text");
            continue;
        }
        tokenized.push((stored, tokenizer.tokenize(&doc.text())));
    }
    tracing::info!(num_docs = tokenized.len(), "ingested documents");

    let oracle = vectors.map(WordVectors::load).transpose()?;
    let summary = build_index(&paths, shard_size, &tokenized, oracle.as_ref().map(|o| o as &dyn EmbeddingOracle))?;

    let meta = MetaFile {
        num_docs: summary.documents as u32,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: INDEX_VERSION,
        shard_size,
    };
    save_meta(&paths, &meta)?;

    tracing::info!(output, words = summary.words, shards = summary.shards, embeddings = summary.embeddings, "index build complete");
    Ok(())
}

fn read_jsonl(file: &Path, out: &mut Vec<NewDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)?;
        out.push(doc.into());
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<NewDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                out.push(doc.into());
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            out.push(doc.into());
        }
        _ => {}
    }
    Ok(())
}
