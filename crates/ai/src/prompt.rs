//! Prompt construction for the report generator.

use std::fmt::Write as _;

use crate::scorer::Signals;

pub const SYSTEM_PROMPT: &str = "You are an expert ATS (Applicant Tracking System) analyzer. \
You analyze resumes against job descriptions and provide structured JSON responses.";

const RESPONSE_SHAPE: &str = r#"{
  "ats_report": {
    "score": <number between 0.0 and 1.0>,
    "notes": ["<string>", ...]
  },
  "change_plan": {
    "changes": ["<string>", ...]
  }
}"#;

/// Build the user prompt. Signals are included only when scoring succeeded.
pub fn build_prompt(resume_text: &str, job_text: &str, signals: Option<&Signals>) -> String {
    let mut b = String::with_capacity(resume_text.len() + job_text.len() + 1024);

    b.push_str("Analyze the following resume against the job description and provide:\n");
    b.push_str("1. An ATS compatibility score (0.0 to 1.0)\n");
    b.push_str("2. Notes explaining the score\n");
    b.push_str("3. A change plan with specific recommendations\n\n");

    b.push_str("RESUME:\n");
    b.push_str(resume_text);
    b.push_str("\n\n");

    b.push_str("JOB DESCRIPTION:\n");
    b.push_str(job_text);
    b.push_str("\n\n");

    if let Some(signals) = signals {
        b.push_str("LEXICAL MATCH SIGNALS (BM25):\n");
        // Writing into a String cannot fail.
        let _ = writeln!(b, "- keyword coverage: {:.0}%", signals.coverage * 100.0);
        let _ = writeln!(b, "- best segment score: {:.2}", signals.best_segment_score);
        if !signals.matched_terms.is_empty() {
            let _ = writeln!(b, "- matched terms: {}", signals.matched_terms.join(", "));
        }
        if !signals.missing_terms.is_empty() {
            let _ = writeln!(b, "- missing terms: {}", signals.missing_terms.join(", "));
        }
        b.push('\n');
    }

    b.push_str("Respond with a JSON object in this exact format:\n");
    b.push_str(RESPONSE_SHAPE);

    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_signals_omits_signal_block() {
        let prompt = build_prompt("my resume", "the job", None);
        assert!(prompt.contains("RESUME:\nmy resume"));
        assert!(prompt.contains("JOB DESCRIPTION:\nthe job"));
        assert!(!prompt.contains("LEXICAL MATCH SIGNALS"));
        assert!(prompt.ends_with('}'));
    }

    #[test]
    fn prompt_lists_signal_terms() {
        let signals = Signals {
            coverage: 0.5,
            best_segment_score: 1.25,
            matched_terms: vec!["rust".into(), "postgres".into()],
            missing_terms: vec!["terraform".into()],
        };
        let prompt = build_prompt("r", "j", Some(&signals));
        assert!(prompt.contains("keyword coverage: 50%"));
        assert!(prompt.contains("matched terms: rust, postgres"));
        assert!(prompt.contains("missing terms: terraform"));
    }
}
