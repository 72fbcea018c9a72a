//! SQL extraction from free-form model replies
//!
//! Layers, first hit wins:
//! 1. a fenced code block, optionally tagged `sql`
//! 2. a `query: ...` style labeled line, up to the next blank line
//! 3. the whole reply
//!
//! When a layer matches more than once only the first candidate is used, even
//! if it is empty, and the count is reported so callers can surface the
//! ambiguity.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(?i:sql)?\s*(.*?)\s*```").expect("valid fenced block pattern");
    static ref LABELED_LINE: Regex =
        Regex::new(r"(?is)(?:SQL\s+)?(?:쿼리|query):\s*(.*?)(?:\n\n|$)")
            .expect("valid labeled line pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    FencedBlock,
    LabeledLine,
    WholeText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    /// The candidate statement carried forward.
    pub statement: String,
    pub method: ExtractionMethod,
    /// How many candidates the winning layer found, empty ones included.
    pub candidates: usize,
}

impl Extraction {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

fn captures(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

pub struct SqlExtractor;

impl SqlExtractor {
    /// Recover one candidate statement from `text`. Never fails.
    pub fn extract(text: &str) -> Extraction {
        let layers = [
            (&*FENCED_BLOCK, ExtractionMethod::FencedBlock),
            (&*LABELED_LINE, ExtractionMethod::LabeledLine),
        ];

        for (pattern, method) in layers {
            let found = captures(pattern, text);
            if let Some(first) = found.first() {
                if found.len() > 1 {
                    warn!(
                        method = ?method,
                        candidates = found.len(),
                        "Model reply contains several candidate statements, using the first"
                    );
                }
                return Extraction {
                    statement: first.clone(),
                    method,
                    candidates: found.len(),
                };
            }
        }

        Extraction {
            statement: text.trim().to_string(),
            method: ExtractionMethod::WholeText,
            candidates: 1,
        }
    }
}

/// Shorthand for `SqlExtractor::extract(text).statement`.
pub fn extract_sql(text: &str) -> String {
    SqlExtractor::extract(text).statement
}
