//! Deterministic keyword-frequency analyzer.
//!
//! Ranks source records by relevance, summarizes the top articles from
//! their title and snippet, and extracts key terms by word frequency.
//! Output depends only on the input records, which keeps pipeline runs
//! reproducible.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::collaborators::{Analysis, AnalysisError, Analyzer, RankedArticle, SourceRecord};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of articles kept after ranking.
pub const DEFAULT_MAX_ARTICLES: usize = 5;

/// Number of key terms reported across all articles.
pub const DEFAULT_MAX_KEY_TERMS: usize = 10;

/// Number of keywords extracted per article.
pub const DEFAULT_KEYWORDS_PER_ARTICLE: usize = 5;

/// Words at or below this length are ignored.
const MIN_WORD_LEN: usize = 3;

/// Maximum characters of snippet text used in an article summary.
const MAX_SUMMARY_CHARS: usize = 200;

const STOP_WORDS: &[&str] = &[
    "about", "after", "also", "among", "been", "before", "being", "between", "both", "but",
    "could", "does", "during", "each", "from", "have", "having", "here", "into", "its", "just",
    "more", "most", "much", "only", "other", "over", "same", "some", "such", "than", "that",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "under",
    "until", "very", "were", "what", "when", "where", "which", "while", "will", "with",
    "within", "would", "your",
];

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KeywordAnalyzer {
    pub max_articles: usize,
    pub max_key_terms: usize,
    pub keywords_per_article: usize,
}

impl Default for KeywordAnalyzer {
    fn default() -> Self {
        Self {
            max_articles: DEFAULT_MAX_ARTICLES,
            max_key_terms: DEFAULT_MAX_KEY_TERMS,
            keywords_per_article: DEFAULT_KEYWORDS_PER_ARTICLE,
        }
    }
}

impl KeywordAnalyzer {
    /// Synchronous form of [`Analyzer::analyze`].
    pub fn analyze_sources(&self, sources: &[SourceRecord]) -> Result<Analysis, AnalysisError> {
        if sources.is_empty() {
            return Err(AnalysisError::new("no source records to analyze"));
        }

        let mut ranked: Vec<&SourceRecord> = sources.iter().collect();
        // Stable sort keeps fetch order for equal scores.
        ranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        ranked.truncate(self.max_articles);

        let ranked_articles: Vec<RankedArticle> = ranked
            .iter()
            .enumerate()
            .map(|(i, record)| RankedArticle {
                rank: i as u32 + 1,
                title: record.title.clone(),
                url: record.url.clone(),
                source: record.source.clone(),
                relevance_score: record.relevance_score,
                summary: summarize_record(record),
                keywords: extract_keywords(
                    &format!("{} {}", record.title, record.snippet),
                    self.keywords_per_article,
                ),
            })
            .collect();

        let key_terms = top_terms(
            ranked_articles.iter().flat_map(|a| a.keywords.iter()),
            self.max_key_terms,
        );
        let summary = overall_summary(&ranked_articles, &key_terms);

        Ok(Analysis {
            summary,
            key_terms,
            ranked_articles,
        })
    }
}

#[async_trait]
impl Analyzer for KeywordAnalyzer {
    async fn analyze(&self, sources: &[SourceRecord]) -> Result<Analysis, AnalysisError> {
        self.analyze_sources(sources)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Lowercased words longer than [`MIN_WORD_LEN`], minus stop-words and numbers.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > MIN_WORD_LEN)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
}

/// Most frequent words in `text`, ties broken alphabetically.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    top_terms(tokenize(text).collect::<Vec<_>>().iter(), limit)
}

fn top_terms<'a>(words: impl Iterator<Item = &'a String>, limit: usize) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in words {
        *counts.entry(word.as_str()).or_default() += 1;
    }
    let mut ordered: Vec<(&str, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ordered
        .into_iter()
        .take(limit)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// First sentence of the snippet, capped at [`MAX_SUMMARY_CHARS`].
fn summarize_record(record: &SourceRecord) -> String {
    let snippet = record.snippet.trim();
    if snippet.is_empty() {
        return record.title.clone();
    }
    let sentence = match snippet.find(". ") {
        Some(end) => &snippet[..=end],
        None => snippet,
    };
    if sentence.chars().count() <= MAX_SUMMARY_CHARS {
        sentence.to_string()
    } else {
        let truncated: String = sentence.chars().take(MAX_SUMMARY_CHARS).collect();
        format!("{}...", truncated.trim_end())
    }
}

fn overall_summary(articles: &[RankedArticle], key_terms: &[String]) -> String {
    let sources: BTreeSet<&str> = articles.iter().map(|a| a.source.as_str()).collect();
    let sources = sources.into_iter().collect::<Vec<_>>().join(", ");
    let noun = if articles.len() == 1 { "article" } else { "articles" };

    if key_terms.is_empty() {
        format!("Analyzed {} {noun} from {sources}.", articles.len())
    } else {
        let themes = key_terms.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        format!(
            "Analyzed {} {noun} from {sources}; leading themes: {themes}.",
            articles.len()
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, snippet: &str, source: &str, score: f64) -> SourceRecord {
        SourceRecord {
            title: title.to_string(),
            url: format!("https://example.org/{}", title.replace(' ', "_")),
            snippet: snippet.to_string(),
            source: source.to_string(),
            relevance_score: score,
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = KeywordAnalyzer::default().analyze_sources(&[]).unwrap_err();
        assert_eq!(err.to_string(), "no source records to analyze");
    }

    #[test]
    fn keywords_skip_short_and_stop_words() {
        let keywords = extract_keywords("The qubit and the qubit with superposition 2024", 5);
        assert_eq!(keywords, vec!["qubit", "superposition"]);
    }

    #[test]
    fn keyword_ties_are_alphabetical() {
        let keywords = extract_keywords("zeta alpha mango", 2);
        assert_eq!(keywords, vec!["alpha", "mango"]);
    }

    #[test]
    fn ranks_by_relevance_and_truncates() {
        let sources: Vec<SourceRecord> = (0..7)
            .map(|i| record(&format!("Article {i}"), "text", "HackerNews", i as f64 / 10.0))
            .collect();
        let analysis = KeywordAnalyzer::default().analyze_sources(&sources).unwrap();

        assert_eq!(analysis.ranked_articles.len(), 5);
        assert_eq!(analysis.ranked_articles[0].title, "Article 6");
        assert_eq!(analysis.ranked_articles[0].rank, 1);
        assert_eq!(analysis.ranked_articles[4].title, "Article 2");
    }

    #[test]
    fn key_terms_aggregate_across_articles() {
        let sources = vec![
            record("Quantum computing", "Qubits use superposition. More text", "Wikipedia", 0.9),
            record("Quantum error correction", "Protecting qubits", "HackerNews", 0.7),
        ];
        let analysis = KeywordAnalyzer::default().analyze_sources(&sources).unwrap();

        assert_eq!(analysis.key_terms[0], "quantum");
        assert!(analysis.key_terms.contains(&"qubits".to_string()));
        assert_eq!(analysis.ranked_articles[0].summary, "Qubits use superposition.");
        assert!(analysis.summary.contains("HackerNews, Wikipedia"));
        assert!(analysis.summary.contains("quantum"));
    }

    #[test]
    fn analysis_is_deterministic() {
        let sources = vec![
            record("Rust ownership", "Borrowing rules explained", "Wikipedia", 0.8),
            record("Rust async", "Futures and executors", "HackerNews", 0.8),
        ];
        let analyzer = KeywordAnalyzer::default();
        assert_eq!(
            analyzer.analyze_sources(&sources).unwrap(),
            analyzer.analyze_sources(&sources).unwrap()
        );
    }

    #[test]
    fn long_snippets_are_truncated() {
        let long = "word ".repeat(100);
        let summary = summarize_record(&record("Long", &long, "Wikipedia", 0.5));
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= MAX_SUMMARY_CHARS + 3);
    }
}
