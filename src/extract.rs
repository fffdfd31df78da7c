//! Parsing of free-text judge output into typed scores.
//!
//! The judge is asked to answer in a fixed label format:
//!
//! ```text
//! Factual Accuracy: 4
//! Clarity: 5
//! Neutrality: 3
//! Helpfulness: 4
//! Justification: <text>
//! ```
//!
//! Labels are matched case-insensitively, the first occurrence wins, and a
//! missing or unparseable label yields an absent score rather than a default.

use crate::models::{Criterion, Scores};
use regex::Regex;
use std::sync::LazyLock;

static ACCURACY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:factual\s+)?accuracy:\s*(\d+)").unwrap());
static CLARITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)clarity:\s*(\d+)").unwrap());
static NEUTRALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)neutrality:\s*(\d+)").unwrap());
static HELPFULNESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)helpfulness:\s*(\d+)").unwrap());
static JUSTIFICATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)justification:(.*)").unwrap());

/// Scores and justification parsed out of one judge reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub scores: Scores,
    pub justification: String,
}

/// Extract the four criterion scores and the justification from judge text.
///
/// Never fails: anything that cannot be found is reported as absent (scores)
/// or empty (justification). Values are not range-checked here.
pub fn extract(judge_text: &str) -> Extraction {
    let mut scores = Scores::default();
    for criterion in Criterion::ALL {
        scores.set(criterion, find_score(pattern(criterion), judge_text));
    }

    let justification = JUSTIFICATION
        .captures(judge_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Extraction {
        scores,
        justification,
    }
}

fn pattern(criterion: Criterion) -> &'static Regex {
    match criterion {
        Criterion::FactualAccuracy => &ACCURACY,
        Criterion::Clarity => &CLARITY,
        Criterion::Neutrality => &NEUTRALITY,
        Criterion::Helpfulness => &HELPFULNESS,
    }
}

/// First labelled integer, or `None` if missing or too large for `u32`
fn find_score(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
