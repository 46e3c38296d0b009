use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

pub const MIN_WORD_LEN: usize = 2;
pub const MAX_WORD_LEN: usize = 50;

/// Turns raw text into the ordered token sequence the index is built from.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

lazy_static! {
    // letters, optionally joined by hyphens: "covid-vaccine" is one candidate
    static ref RE: Regex = Regex::new(r"\p{L}+(?:-\p{L}+)*").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","an","the","and","or","but","if","in","on","at","to",
            "of","for","with","is","are","was","were","be","been",
            "being","by","as","from","that","this","these","those",
            "we","our","their","it","its","can","may","might","also",
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Lexicon word validity: lowercase ASCII letters only, 2 to 50 chars.
pub fn is_valid_word(word: &str) -> bool {
    (MIN_WORD_LEN..=MAX_WORD_LEN).contains(&word.len()) && word.bytes().all(|b| b.is_ascii_lowercase())
}

fn is_gibberish(token: &str) -> bool {
    if !is_valid_word(token) {
        return true;
    }
    // aaaaaa, ababab
    let distinct: HashSet<u8> = token.bytes().collect();
    distinct.len() <= 2 && token.len() > 5
}

#[derive(Debug, Clone)]
pub struct StandardTokenizer {
    remove_stopwords: bool,
}

impl Default for StandardTokenizer {
    fn default() -> Self { Self { remove_stopwords: true } }
}

impl StandardTokenizer {
    pub fn new(remove_stopwords: bool) -> Self { Self { remove_stopwords } }
}

impl Tokenizer for StandardTokenizer {
    /// NFKC normalization, lowercase, hyphen folding, stopword and garbage removal.
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str().replace('-', "");
            if self.remove_stopwords && is_stopword(&token) { continue; }
            if is_gibberish(&token) { continue; }
            tokens.push(token);
        }
        tokens
    }
}

/// Tokenize with the default configuration.
pub fn tokenize(text: &str) -> Vec<String> {
    StandardTokenizer::default().tokenize(text)
}
