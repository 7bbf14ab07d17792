//! Derives a unique, filesystem/VCS-safe branch slug from a free-text prompt.
//!
//! Pure and deterministic: no I/O, no clock. `existing_branches` is the full
//! set of names to avoid colliding with.

use std::collections::HashSet;

const MAX_LEN: usize = 50;
const MAX_WORDS: usize = 5;
const FALLBACK: &str = "workstream";

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "to", "for", "with", "and", "or", "in", "on", "at", "by", "of", "is", "it",
    "that",
];

/// Derive a slug for `prompt` that does not collide with any entry in `existing_branches`.
pub fn derive(prompt: &str, existing_branches: &HashSet<String>) -> String {
    let base = base_slug(prompt);
    if !existing_branches.contains(&base) {
        return base;
    }
    dedupe(&base, existing_branches)
}

fn base_slug(prompt: &str) -> String {
    let normalized: String = prompt
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, 'a'..='z' | '0'..='9' | ' ' | '-') { c } else { ' ' })
        .collect();

    let words: Vec<&str> = normalized
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .take(MAX_WORDS)
        .collect();

    let joined = words.join("-");
    let truncated = truncate(&joined, MAX_LEN);
    let trimmed = truncated.trim_matches('-').to_string();

    if trimmed.is_empty() {
        FALLBACK.to_string()
    } else {
        trimmed
    }
}

/// Truncate `s` to at most `max_len` bytes, preferring to cut at the last
/// `-` that still fits so words aren't chopped mid-token.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let hard = &s[..max_len];
    match hard.rfind('-') {
        Some(idx) if idx > 0 => hard[..idx].to_string(),
        _ => hard.to_string(),
    }
}

/// Append `-N` for the smallest N >= 2 not already taken, shortening `base`
/// if needed to keep the total length within `MAX_LEN`.
fn dedupe(base: &str, existing: &HashSet<String>) -> String {
    let mut n: u32 = 2;
    loop {
        let suffix = format!("-{n}");
        let budget = MAX_LEN.saturating_sub(suffix.len());
        let shortened = truncate(base, budget).trim_matches('-').to_string();
        let candidate = format!("{shortened}{suffix}");
        if !existing.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn basic_derivation() {
        assert_eq!(
            derive("add the user authentication to the app", &set(&[])),
            "add-user-authentication-app"
        );
    }

    #[test]
    fn collision_appends_suffix() {
        assert_eq!(
            derive(
                "add the user authentication to the app",
                &set(&["add-user-authentication-app"])
            ),
            "add-user-authentication-app-2"
        );
    }

    #[test]
    fn fills_gap_in_suffix_sequence() {
        let existing = set(&["fix-bug", "fix-bug-2", "fix-bug-4"]);
        assert_eq!(derive("fix bug", &existing), "fix-bug-3");
    }

    #[test]
    fn stop_words_dropped() {
        assert_eq!(derive("the fix for a bug", &set(&[])), "fix-bug");
    }

    #[test]
    fn caps_at_five_words() {
        assert_eq!(
            derive("one two three four five six seven", &set(&[])),
            "one-two-three-four-five"
        );
    }

    #[test]
    fn empty_prompt_falls_back() {
        assert_eq!(derive("!!! ### ---", &set(&[])), "workstream");
        assert_eq!(derive("the a an to", &set(&[])), "workstream");
    }

    #[test]
    fn result_never_exceeds_max_len() {
        let long = "this is a very long prompt with many many many words that keeps going on";
        let slug = derive(long, &set(&[]));
        assert!(slug.len() <= MAX_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn result_matches_charset_and_is_absent_from_set() {
        let existing = set(&["ship-the-release"]);
        let slug = derive("Ship The Release!!", &existing);
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(!slug.ends_with('-'));
        assert!(!existing.contains(&slug));
    }

    #[test]
    fn non_alnum_collapses_like_slugify() {
        assert_eq!(
            derive("feat(worker): detect stale PRs", &set(&[])),
            "feat-worker-detect-stale-prs"
        );
    }

    #[test]
    fn dedupe_shortens_base_to_respect_max_len() {
        let long = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let base = base_slug(long);
        assert_eq!(base.len(), MAX_LEN);
        let existing = set(&[&base]);
        let deduped = derive(long, &existing);
        assert!(deduped.len() <= MAX_LEN);
        assert!(deduped.ends_with("-2"));
    }
}
