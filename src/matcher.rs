//! Free-text answer matching
//!
//! Pure functions: the same submission against the same answer set always
//! yields the same result.

use crate::types::{Answer, MatchMode};
use std::collections::HashSet;

/// Lowercase, trim, drop punctuation, collapse runs of whitespace
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation() && !is_unicode_punctuation(*c))
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_unicode_punctuation(c: char) -> bool {
    matches!(
        c,
        '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' | '\u{2013}' | '\u{2014}' | '\u{2026}'
            | '\u{00BF}' | '\u{00A1}'
    )
}

fn is_match(submission: &str, candidate: &str, mode: MatchMode) -> bool {
    if candidate.is_empty() {
        return false;
    }
    match mode {
        MatchMode::Strict => submission == candidate,
        MatchMode::Fuzzy => submission.contains(candidate) || candidate.contains(submission),
    }
}

/// Find the answer a submission refers to.
///
/// Candidates whose normalized text is in `already_revealed` are skipped.
/// Ties go to the earliest answer in declared order. Returns the index into
/// `answers` together with the answer.
pub fn match_answer<'a>(
    submission: &str,
    answers: &'a [Answer],
    already_revealed: &HashSet<String>,
    mode: MatchMode,
) -> Option<(usize, &'a Answer)> {
    let needle = normalize(submission);
    if needle.is_empty() {
        return None;
    }

    answers.iter().enumerate().find(|(_, answer)| {
        let candidate = normalize(&answer.text);
        !already_revealed.contains(&candidate) && is_match(&needle, &candidate, mode)
    })
}

pub fn calculate_points(frequency: u32, multiplier: u32) -> u32 {
    frequency.saturating_mul(multiplier)
}
