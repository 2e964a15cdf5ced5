//! Recall and precision of generated queries against a hand-collected
//! reference set.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z']+").expect("static regex"));

/// Share of `reference` found in `generated`, plus the number of matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecallScore {
    pub fraction: f64,
    pub matched: usize,
}

impl RecallScore {
    fn from_counts(matched: usize, total: usize) -> Self {
        if total == 0 {
            return Self {
                fraction: 0.0,
                matched: 0,
            };
        }
        Self {
            fraction: matched as f64 / total as f64,
            matched,
        }
    }
}

/// Exact-string recall. Precision is the same call with the arguments
/// swapped.
pub fn recall(reference: &[String], generated: &[String]) -> RecallScore {
    let generated: HashSet<&str> = generated.iter().map(String::as_str).collect();
    let matched = reference
        .iter()
        .filter(|q| generated.contains(q.as_str()))
        .count();
    RecallScore::from_counts(matched, reference.len())
}

/// Word-order, case and punctuation insensitive key of a query.
fn bag_of_words(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut words: Vec<String> = WORD
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect();
    words.sort();
    words
}

/// Recall that ignores word order, case and punctuation. Apostrophes still
/// count.
pub fn recall_unordered(reference: &[String], generated: &[String]) -> RecallScore {
    let generated: HashSet<Vec<String>> = generated.iter().map(|q| bag_of_words(q)).collect();
    let matched = reference
        .iter()
        .filter(|q| generated.contains(&bag_of_words(q)))
        .count();
    RecallScore::from_counts(matched, reference.len())
}

/// All four numbers for one seed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedReport {
    pub seed: String,
    pub recall: RecallScore,
    pub recall_unordered: RecallScore,
    pub precision: RecallScore,
    pub precision_unordered: RecallScore,
    pub generated_len: usize,
    pub reference_len: usize,
}

impl SeedReport {
    pub fn compute(seed: impl Into<String>, reference: &[String], generated: &[String]) -> Self {
        Self {
            seed: seed.into(),
            recall: recall(reference, generated),
            recall_unordered: recall_unordered(reference, generated),
            precision: recall(generated, reference),
            precision_unordered: recall_unordered(generated, reference),
            generated_len: generated.len(),
            reference_len: reference.len(),
        }
    }
}

fn clean_line(line: &str) -> String {
    line.chars()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_lowercase()
}

/// One query per line.
pub fn read_reference(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference file {}", path.display()))?;
    Ok(text.lines().map(clean_line).collect())
}

/// First CSV column of each record; a leading `query` header is skipped.
pub fn read_generated(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open generated file {}", path.display()))?;

    let mut queries = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Malformed row in {}", path.display()))?;
        let first = clean_line(record.get(0).unwrap_or_default()).trim().to_string();
        if i == 0 && first == "query" {
            continue;
        }
        queries.push(first);
    }
    Ok(queries)
}

/// The generated file for a reference file: same name first, then the
/// approved table written by `expand`.
fn generated_counterpart(generated_dir: &Path, reference_file: &Path) -> Option<PathBuf> {
    let name = reference_file.file_name()?;
    let same = generated_dir.join(name);
    if same.is_file() {
        return Some(same);
    }
    let stem = reference_file.file_stem()?.to_string_lossy();
    let approved = generated_dir.join(format!("{stem}_approved.csv"));
    approved.is_file().then_some(approved)
}

/// Reports every reference file that has a generated counterpart, sorted by
/// seed.
pub fn evaluate_directories(reference_dir: &Path, generated_dir: &Path) -> Result<Vec<SeedReport>> {
    let entries = fs::read_dir(reference_dir)
        .with_context(|| format!("Failed to list {}", reference_dir.display()))?;

    let mut reports = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(generated_file) = generated_counterpart(generated_dir, &path) else {
            debug!("No generated queries for {}", path.display());
            continue;
        };
        let seed = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();
        let reference = read_reference(&path)?;
        let generated = read_generated(&generated_file)?;
        reports.push(SeedReport::compute(seed, &reference, &generated));
    }
    reports.sort_by(|a, b| a.seed.cmp(&b.seed));
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recall_counts_exact_matches() {
        let reference = strings(&["coffee beans", "iced coffee", "latte art"]);
        let generated = strings(&["coffee beans", "coffee iced"]);
        let score = recall(&reference, &generated);
        assert_eq!(score.matched, 1);
        assert!((score.fraction - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unordered_ignores_order_case_and_punctuation() {
        let reference = strings(&["Iced, Coffee!", "barista's choice"]);
        let generated = strings(&["coffee iced", "baristas choice"]);
        let score = recall_unordered(&reference, &generated);
        assert_eq!(score.matched, 1);
        assert_eq!(score.fraction, 0.5);
    }

    #[test]
    fn test_empty_reference() {
        let score = recall(&[], &strings(&["a"]));
        assert_eq!(score, RecallScore { fraction: 0.0, matched: 0 });
    }

    #[test]
    fn test_generated_queries_with_commas_read_back_whole() {
        use crate::engine::{OverlapMethod, QueryLog, ScrapeState};
        use crate::store::{CheckpointStore, Checkpointer};

        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let query = crate::query::normalize_query("Decaf,Espresso coffee");
        assert_eq!(query, "decaf,espresso coffee");

        let mut approved = QueryLog::new();
        approved.record("coffee", None, 1.0);
        approved.record(query.clone(), Some("coffee".into()), 0.5);
        let state = ScrapeState::new("coffee", OverlapMethod::LexicalNgram);
        store.save(&approved, &QueryLog::new(), &state).unwrap();

        let read = read_generated(&store.paths("coffee").approved).unwrap();
        assert_eq!(read, strings(&["coffee", "decaf,espresso coffee"]));
    }

    #[test]
    fn test_evaluate_directories() {
        let reference = TempDir::new().unwrap();
        let generated = TempDir::new().unwrap();
        fs::write(reference.path().join("coffee.txt"), "Coffee Beans\niced coffee\n").unwrap();
        fs::write(reference.path().join("tea.txt"), "green tea\n").unwrap();
        fs::write(
            generated.path().join("coffee_approved.csv"),
            "query,parent,score\ncoffee,,1\ncoffee beans,coffee,0.5\n",
        )
        .unwrap();

        let reports = evaluate_directories(reference.path(), generated.path()).unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.seed, "coffee");
        assert_eq!(report.reference_len, 2);
        assert_eq!(report.generated_len, 2);
        assert_eq!(report.recall.matched, 1);
        assert_eq!(report.precision.fraction, 0.5);
    }
}
