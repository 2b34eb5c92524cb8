//! Fuzzy string matching for configured titles.
//!
//! Scores are on a 0-100 scale.

use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

/// Discount for scores that ignore word order or repetition.
const UNBASE_SCALE: f64 = 0.95;

/// Normalize a string for comparison purposes.
///
/// Applies NFKC, lowercases, turns anything that is not alphanumeric into a
/// space and collapses whitespace.
pub fn normalize_for_comparison(text: &str) -> String {
    text.nfkc()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Length of the longest common subsequence of two character slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Indel similarity: the share of characters kept when turning one string
/// into the other with insertions and deletions only.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// [`ratio`] after sorting the words of each string.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let sorted = |s: &str| {
        let mut words: Vec<&str> = s.split_whitespace().collect();
        words.sort_unstable();
        words.join(" ")
    };
    ratio(&sorted(a), &sorted(b))
}

/// Words shared by both strings, and the words only in the first and only
/// in the second, each sorted and joined with spaces.
fn token_partition(a: &str, b: &str) -> (String, String, String) {
    let a: BTreeSet<&str> = a.split_whitespace().collect();
    let b: BTreeSet<&str> = b.split_whitespace().collect();
    let join = |words: Vec<&str>| words.join(" ");
    (
        join(a.intersection(&b).copied().collect()),
        join(a.difference(&b).copied().collect()),
        join(b.difference(&a).copied().collect()),
    )
}

/// Similarity of the shared words against each side's full word set.
///
/// A string whose words are all contained in the other scores 100.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let (common, only_a, only_b) = token_partition(a, b);
    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let extend = |rest: &str| {
        if common.is_empty() {
            rest.to_string()
        } else {
            format!("{} {}", common, rest)
        }
    };
    let with_a = extend(&only_a);
    let with_b = extend(&only_b);

    let mut best = ratio(&with_a, &with_b);
    if !common.is_empty() {
        best = best.max(ratio(&common, &with_a)).max(ratio(&common, &with_b));
    }
    best
}

/// Best [`ratio`] of the shorter string against any window of the longer.
///
/// Windows sliding in from either end are shorter than the query.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short: Vec<char> = short.chars().collect();
    let long: Vec<char> = long.chars().collect();
    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let m = short.len();
    let n = long.len();
    let window_ratio = |window: &[char]| {
        200.0 * lcs_len(&short, window) as f64 / (m + window.len()) as f64
    };

    let mut best: f64 = 0.0;
    for start in 0..=n - m {
        best = best.max(window_ratio(&long[start..start + m]));
        if best == 100.0 {
            return best;
        }
    }
    for len in 1..m.min(n + 1) {
        best = best
            .max(window_ratio(&long[..len]))
            .max(window_ratio(&long[n - len..]));
    }
    best
}

/// [`partial_ratio`] over word sets. Any shared word scores 100.
pub fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let (common, only_a, only_b) = token_partition(a, b);
    if !common.is_empty() {
        return 100.0;
    }
    // Without shared words the sorted sets are the differences themselves.
    partial_ratio(&only_a, &only_b)
}

/// Weighted score of two raw strings, on a 0-100 scale.
///
/// Strings of similar length take the best of [`ratio`] and the discounted
/// word-order-insensitive ratios. When one string is at least half as long
/// again as the other, substring alignment is scored too, discounted more
/// heavily the larger the length gap.
pub fn score(a: &str, b: &str) -> f64 {
    let a = normalize_for_comparison(a);
    let b = normalize_for_comparison(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    let len_ratio = len_a.max(len_b) / len_a.min(len_b);

    let mut best = ratio(&a, &b);
    if len_ratio < 1.5 {
        let token = token_sort_ratio(&a, &b).max(token_set_ratio(&a, &b));
        return best.max(token * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    best = best.max(partial_ratio(&a, &b) * partial_scale);
    best.max(partial_token_ratio(&a, &b) * UNBASE_SCALE * partial_scale)
}

/// Best-scoring choice at or above `cutoff`. Earlier choices win ties.
pub fn best_match<'a, I>(query: &str, choices: I, cutoff: f64) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f64)> = None;
    for choice in choices {
        let s = score(query, choice);
        if s >= cutoff && best.map_or(true, |(_, b)| s > b) {
            best = Some((choice, s));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_comparison() {
        assert_eq!(normalize_for_comparison("Amazing Grace!"), "amazing grace");
        assert_eq!(
            normalize_for_comparison("  How  Great   Thou Art  "),
            "how great thou art"
        );
        assert_eq!(normalize_for_comparison("Ｆｕｌｌ-width"), "full width");
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
        let typo = ratio("introducton", "introduction");
        assert!(typo > 95.0 && typo < 96.0, "{typo}");
    }

    #[test]
    fn test_token_sort_ratio_ignores_word_order() {
        assert_eq!(token_sort_ratio("grace amazing", "amazing grace"), 100.0);
    }

    #[test]
    fn test_token_set_ratio() {
        assert_eq!(
            token_set_ratio("introduction overview", "project introduction overview"),
            100.0
        );
        assert_eq!(
            token_set_ratio("alpha beta", "gamma delta"),
            token_sort_ratio("alpha beta", "gamma delta")
        );
        assert_eq!(token_set_ratio("", "overview"), 0.0);
    }

    #[test]
    fn test_partial_ratio() {
        assert_eq!(partial_ratio("grace", "amazing grace notes"), 100.0);
        assert_eq!(partial_ratio("abc", "xyz"), 0.0);
        assert!(partial_ratio("yz12", "xyz") > 0.0);
    }

    #[test]
    fn test_partial_token_ratio() {
        assert_eq!(partial_token_ratio("summer camp", "camp"), 100.0);
        assert_eq!(partial_token_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_score_accepts_contained_words_of_similar_length() {
        let s = score("Project Introduction Overview", "Introduction Overview");
        assert!((s - 95.0).abs() < 1e-9, "{s}");
    }

    #[test]
    fn test_score_discounts_large_length_gaps() {
        // Exact substring, but the query is far longer than the choice.
        let s = score("Grace and the long road home", "Grace");
        assert!(s <= 90.0, "{s}");
        assert!(s >= 85.0, "{s}");
    }

    #[test]
    fn test_score_is_case_insensitive() {
        assert_eq!(score("INTRODUCTION", "Introduction"), 100.0);
        assert_eq!(score("", "Introduction"), 0.0);
    }

    #[test]
    fn test_best_match() {
        let choices = ["Introduction", "Background"];
        let hit = best_match("Introducton", choices.iter().copied(), 92.0);
        assert_eq!(hit.map(|(t, _)| t), Some("Introduction"));

        let miss = best_match("Completely Unrelated Heading", choices.iter().copied(), 92.0);
        assert!(miss.is_none());
    }

    #[test]
    fn test_best_match_prefers_first_on_tie() {
        let choices = ["Summary", "summary"];
        let hit = best_match("SUMMARY", choices.iter().copied(), 92.0);
        assert_eq!(hit.map(|(t, _)| t), Some("Summary"));
    }
}
