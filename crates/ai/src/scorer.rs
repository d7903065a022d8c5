use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lexical match signals between a resume and a job description.
///
/// These feed the generator prompt. They are advisory: a run proceeds
/// without them when scoring fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    /// Share of distinct job terms present anywhere in the resume, in \[0, 1\].
    pub coverage: f64,
    /// BM25 score of the best-matching resume segment.
    pub best_segment_score: f64,
    /// Job terms found in the resume, most frequent in the job text first.
    pub matched_terms: Vec<String>,
    /// Job terms absent from the resume, most frequent in the job text first.
    pub missing_terms: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("invalid scorer parameters: {0}")]
    InvalidParameters(String),
}

/// Computes match signals. Must not block on I/O.
pub trait Scorer: Send + Sync + 'static {
    fn compute(&self, resume_text: &str, job_text: &str) -> Result<Signals, ScoreError>;
}

/// BM25 over resume segments (one segment per non-blank line), with the
/// job description's distinct terms as the query.
#[derive(Debug, Clone)]
pub struct Bm25Scorer {
    k1: f64,
    b: f64,
    /// Cap on the length of `matched_terms` / `missing_terms`.
    max_terms: usize,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            max_terms: 20,
        }
    }
}

impl Bm25Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k1(mut self, k1: f64) -> Self {
        self.k1 = k1;
        self
    }

    pub fn with_b(mut self, b: f64) -> Self {
        self.b = b;
        self
    }

    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = max_terms;
        self
    }
}

impl Scorer for Bm25Scorer {
    fn compute(&self, resume_text: &str, job_text: &str) -> Result<Signals, ScoreError> {
        if !(self.k1.is_finite() && self.k1 >= 0.0) {
            return Err(ScoreError::InvalidParameters(format!("k1 must be >= 0, got {}", self.k1)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(ScoreError::InvalidParameters(format!(
                "b must be in [0, 1], got {}",
                self.b
            )));
        }

        let segments: Vec<Vec<String>> = resume_text
            .lines()
            .map(tokenize)
            .filter(|tokens| !tokens.is_empty())
            .collect();
        if segments.is_empty() {
            return Err(ScoreError::EmptyInput("resume text"));
        }

        let job_tokens = tokenize(job_text);
        if job_tokens.is_empty() {
            return Err(ScoreError::EmptyInput("job text"));
        }

        // Query terms ordered by frequency in the job text, ties alphabetical.
        let mut job_freq: HashMap<&str, usize> = HashMap::new();
        for token in &job_tokens {
            *job_freq.entry(token.as_str()).or_default() += 1;
        }
        let mut query: Vec<(&str, usize)> = job_freq.into_iter().collect();
        query.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let segment_sets: Vec<HashSet<&str>> = segments
            .iter()
            .map(|seg| seg.iter().map(String::as_str).collect())
            .collect();

        let n = segments.len() as f64;
        let avg_len = segments.iter().map(Vec::len).sum::<usize>() as f64 / n;

        let mut best_segment_score = 0.0_f64;
        for segment in &segments {
            let len = segment.len() as f64;
            let mut score = 0.0;
            for (term, _) in &query {
                let tf = segment.iter().filter(|t| t.as_str() == *term).count() as f64;
                if tf == 0.0 {
                    continue;
                }
                let df = segment_sets.iter().filter(|set| set.contains(term)).count() as f64;
                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                let norm = self.k1 * (1.0 - self.b + self.b * len / avg_len);
                score += idf * (tf * (self.k1 + 1.0)) / (tf + norm);
            }
            best_segment_score = best_segment_score.max(score);
        }

        let (matched, missing): (Vec<&str>, Vec<&str>) = query
            .iter()
            .map(|(term, _)| *term)
            .partition(|term| segment_sets.iter().any(|set| set.contains(term)));

        let coverage = matched.len() as f64 / query.len() as f64;

        Ok(Signals {
            coverage,
            best_segment_score,
            matched_terms: matched.into_iter().take(self.max_terms).map(str::to_string).collect(),
            missing_terms: missing.into_iter().take(self.max_terms).map(str::to_string).collect(),
        })
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "our", "that", "the", "their", "this", "to", "we", "will",
    "with", "you", "your",
];

/// Lowercase alphanumeric tokens; `+` and `#` survive so "c++" and "c#" stay distinct.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|raw| !raw.is_empty())
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() > 1 && !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "Senior engineer building Rust services\n\
                          Postgres, Kafka and Kubernetes in production\n\
                          \n\
                          Mentored a team of five";

    #[test]
    fn reports_matched_and_missing_terms() {
        let signals = Bm25Scorer::new()
            .compute(RESUME, "Rust engineer with Postgres and Terraform experience")
            .unwrap();

        assert!(signals.matched_terms.contains(&"rust".to_string()));
        assert!(signals.matched_terms.contains(&"postgres".to_string()));
        assert!(signals.missing_terms.contains(&"terraform".to_string()));
        assert!(signals.coverage > 0.0 && signals.coverage < 1.0);
        assert!(signals.best_segment_score > 0.0);
    }

    #[test]
    fn full_overlap_has_full_coverage() {
        let signals = Bm25Scorer::new().compute(RESUME, "rust postgres kubernetes").unwrap();
        assert_eq!(signals.coverage, 1.0);
        assert!(signals.missing_terms.is_empty());
    }

    #[test]
    fn no_overlap_scores_zero() {
        let signals = Bm25Scorer::new().compute(RESUME, "accountant ledger audit").unwrap();
        assert_eq!(signals.coverage, 0.0);
        assert_eq!(signals.best_segment_score, 0.0);
        assert!(signals.matched_terms.is_empty());
    }

    #[test]
    fn blank_inputs_are_errors() {
        let scorer = Bm25Scorer::new();
        assert_eq!(
            scorer.compute("  \n\t", "rust").unwrap_err(),
            ScoreError::EmptyInput("resume text")
        );
        assert_eq!(
            scorer.compute(RESUME, "the and of").unwrap_err(),
            ScoreError::EmptyInput("job text")
        );
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let err = Bm25Scorer::new().with_b(1.5).compute(RESUME, "rust").unwrap_err();
        assert!(matches!(err, ScoreError::InvalidParameters(_)));
    }

    #[test]
    fn term_lists_are_capped_and_frequency_ordered() {
        let signals = Bm25Scorer::new()
            .with_max_terms(2)
            .compute(RESUME, "go go go java java scala rust")
            .unwrap();
        assert_eq!(signals.missing_terms, vec!["go".to_string(), "java".to_string()]);
        assert_eq!(signals.matched_terms, vec!["rust".to_string()]);
    }

    #[test]
    fn tokenizer_keeps_language_symbols() {
        assert_eq!(tokenize("C++ and C# (Rust)"), vec!["c++", "c#", "rust"]);
    }
}
