//! Matching dropdown option labels against configured text
//!
//! Option labels carry a live count suffix ("Public Terms (12)") and
//! inconsistent spacing, so every comparison runs on normalized text.

use serde::{Deserialize, Serialize};

/// Drop a trailing count like `" (12)"`
pub fn strip_count_suffix(text: &str) -> &str {
    let trimmed = text.trim_end();
    if let Some(body) = trimmed.strip_suffix(')') {
        if let Some(open) = body.rfind('(') {
            let digits = &body[open + 1..];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return body[..open].trim_end();
            }
        }
    }
    trimmed
}

/// Count suffix removed, whitespace collapsed, lowercased
pub fn normalize_term(text: &str) -> String {
    strip_count_suffix(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Count suffix and all whitespace removed, lowercased.
///
/// Category labels are typed into the tag input without spaces, so this is
/// the form both sides are compared in.
pub fn category_key(text: &str) -> String {
    strip_count_suffix(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// How the desired term matched a set of option labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermMatch {
    None,
    Unique(usize),
    /// Indices of every matching option
    Ambiguous(Vec<usize>),
}

/// Match `desired` against `options`.
///
/// An option matches when the normalized texts are equal or one contains the
/// other, so `"Public Terms"` matches `"Public Terms (12)"`.
pub fn match_terms<S: AsRef<str>>(desired: &str, options: &[S]) -> TermMatch {
    let wanted = normalize_term(desired);
    let hits: Vec<usize> = options
        .iter()
        .enumerate()
        .filter(|(_, option)| {
            let have = normalize_term(option.as_ref());
            !have.is_empty() && (have == wanted || have.contains(&wanted) || wanted.contains(&have))
        })
        .map(|(i, _)| i)
        .collect();

    match hits.as_slice() {
        [] => TermMatch::None,
        [only] => TermMatch::Unique(*only),
        _ => TermMatch::Ambiguous(hits),
    }
}

/// Picks one of several matching options, or declines
pub trait Disambiguator {
    /// Index into `candidates`, or `None` to fail the item
    fn choose(&self, desired: &str, candidates: &[String]) -> Option<usize>;
}

/// Never guesses
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectAmbiguous;

impl Disambiguator for RejectAmbiguous {
    fn choose(&self, _desired: &str, _candidates: &[String]) -> Option<usize> {
        None
    }
}

/// Takes the one candidate whose normalized label equals the desired term
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferExact;

impl Disambiguator for PreferExact {
    fn choose(&self, desired: &str, candidates: &[String]) -> Option<usize> {
        let wanted = normalize_term(desired);
        let mut exact = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| normalize_term(c) == wanted)
            .map(|(i, _)| i);
        match (exact.next(), exact.next()) {
            (Some(i), None) => Some(i),
            _ => None,
        }
    }
}

/// Named policy, for configuration and command lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    #[default]
    Reject,
    PreferExact,
}

impl Disambiguator for AmbiguityPolicy {
    fn choose(&self, desired: &str, candidates: &[String]) -> Option<usize> {
        match self {
            AmbiguityPolicy::Reject => RejectAmbiguous.choose(desired, candidates),
            AmbiguityPolicy::PreferExact => PreferExact.choose(desired, candidates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_count_suffix() {
        assert_eq!(strip_count_suffix("Public Terms (12)"), "Public Terms");
        assert_eq!(strip_count_suffix("Public Terms(3)  "), "Public Terms");
        assert_eq!(strip_count_suffix("Terms (beta)"), "Terms (beta)");
        assert_eq!(strip_count_suffix("()"), "()");
        assert_eq!(strip_count_suffix(""), "");
    }

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term("  Commission   Tier Terms (4) "), "commission tier terms");
        assert_eq!(category_key("Home & Garden (27)"), "home&garden");
    }

    #[test]
    fn test_unique_match() {
        let options = ["Public Terms (12)", "Ulanzi Terms (3)"];
        assert_eq!(match_terms("Public Terms", &options), TermMatch::Unique(0));
        assert_eq!(match_terms("ulanzi  terms", &options), TermMatch::Unique(1));
    }

    #[test]
    fn test_ambiguous_match() {
        let options = ["Public Terms (12)", "Ulanzi Terms (3)"];
        assert_eq!(match_terms("Terms", &options), TermMatch::Ambiguous(vec![0, 1]));
    }

    #[test]
    fn test_no_match() {
        let options = ["Public Terms (12)", ""];
        assert_eq!(match_terms("Commission Tier Terms", &options), TermMatch::None);
    }

    #[test]
    fn test_policies() {
        let candidates = vec!["Public Terms (1)".to_string(), "Public Terms Extended (2)".to_string()];
        assert_eq!(RejectAmbiguous.choose("Public Terms", &candidates), None);
        assert_eq!(PreferExact.choose("Public Terms", &candidates), Some(0));
        assert_eq!(PreferExact.choose("Terms", &candidates), None);
        assert_eq!(AmbiguityPolicy::PreferExact.choose("public terms", &candidates), Some(0));
        assert_eq!(AmbiguityPolicy::default(), AmbiguityPolicy::Reject);
    }
}
