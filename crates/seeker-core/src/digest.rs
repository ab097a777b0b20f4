//! Text digest of an execution result for the downstream analyzer
//!
//! Large result sets are sampled so the digest stays bounded regardless of how
//! many records the backends returned.

use crate::types::{ExecutionResult, QueryOutcome};
use std::fmt::Write;

/// Records sampled per query by default
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Characters kept per sampled record by default
pub const DEFAULT_MAX_RECORD_CHARS: usize = 500;

/// Digest rendering limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestOptions {
    /// Records sampled per successful query
    pub sample_size: usize,
    /// Characters kept per sampled record
    pub max_record_chars: usize,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            max_record_chars: DEFAULT_MAX_RECORD_CHARS,
        }
    }
}

impl ExecutionResult {
    /// Render with default limits
    #[must_use]
    pub fn digest(&self) -> String {
        self.digest_with(DigestOptions::default())
    }

    /// Render with explicit limits
    #[must_use]
    pub fn digest_with(&self, options: DigestOptions) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Summary: {} total results from {} queries.",
            self.summary.total_records, self.summary.total_queries
        );
        if self.cancelled {
            out.push_str("Note: execution was cancelled before all queries reported.\n");
        }
        out.push('\n');

        for outcome in &self.outcomes {
            render_outcome(&mut out, outcome, options);
            out.push('\n');
        }
        out
    }
}

fn render_outcome(out: &mut String, outcome: &QueryOutcome, options: DigestOptions) {
    let _ = writeln!(out, "Query ID: {}", outcome.query_id);
    let _ = writeln!(out, "Data Source: {}", outcome.backend_kind);
    let _ = writeln!(out, "Status: {}", outcome.status);

    if !outcome.is_success() {
        let _ = writeln!(
            out,
            "Error: {}",
            outcome.error_message.as_deref().unwrap_or("Unknown error")
        );
        return;
    }

    let _ = writeln!(out, "Result Count: {}", outcome.record_count);
    let shown = options.sample_size.min(outcome.records.len());
    if shown > 0 {
        out.push_str("Sample Results:\n");
        for record in outcome.records.iter().take(shown) {
            let text = record.to_string();
            let _ = writeln!(out, "  - {}...", truncate_chars(&text, options.max_record_chars));
        }
    }
    if outcome.records.len() > shown {
        let _ = writeln!(out, "  (and {} more results)", outcome.records.len() - shown);
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ResultAggregator;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn result() -> ExecutionResult {
        let now = Utc::now();
        let records = (0..12).map(|i| json!({ "host": format!("SERVER{i:02}") })).collect();
        ResultAggregator::new().aggregate(
            Uuid::new_v4(),
            now,
            vec![
                QueryOutcome::success("q1", "splunk", records, now, now),
                QueryOutcome::failure("q2", "elastic", "connection refused", now, now),
            ],
        )
    }

    #[test]
    fn digest_has_summary_line() {
        let digest = result().digest();
        assert!(digest.starts_with("Summary: 12 total results from 2 queries."));
    }

    #[test]
    fn digest_samples_and_counts_remainder() {
        let digest = result().digest();
        assert_eq!(digest.matches("  - ").count(), 10);
        assert!(digest.contains("(and 2 more results)"));
        assert!(digest.contains("Error: connection refused"));
    }

    #[test]
    fn digest_truncates_records() {
        let digest = result().digest_with(DigestOptions {
            sample_size: 1,
            max_record_chars: 5,
        });
        assert!(digest.contains("  - {\"hos...\n"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
