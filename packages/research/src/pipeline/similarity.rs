//! Claim-text normalization and the grouping similarity predicate.

use std::collections::HashMap;

/// Function words excluded from the content-word vector. Negations
/// are excluded too: stance lives in the polarity tag, and keeping
/// "not" in the vector would stop opposite claims from grouping.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had", "has",
    "have", "in", "into", "is", "it", "its", "no", "not", "of", "on", "or", "that", "the",
    "their", "there", "these", "this", "those", "to", "was", "were", "which", "who", "will",
    "with",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Normalize claim text for comparison: lowercase, punctuation
/// stripped, whitespace collapsed.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect();
    // Keep '.' only between digits so "1.2" survives but sentence
    // punctuation does not.
    let chars: Vec<char> = stripped.chars().collect();
    let mut cleaned = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '.' {
            let digit_before = i > 0 && chars[i - 1].is_ascii_digit();
            let digit_after = i + 1 < chars.len() && chars[i + 1].is_ascii_digit();
            if digit_before && digit_after {
                cleaned.push(c);
            } else {
                cleaned.push(' ');
            }
        } else {
            cleaned.push(c);
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bag of content words (stop words removed) with counts.
pub fn content_words(normalized: &str) -> HashMap<&str, f32> {
    let mut bag = HashMap::new();
    for word in normalized.split_whitespace() {
        if is_stop_word(word) {
            continue;
        }
        *bag.entry(word).or_insert(0.0) += 1.0;
    }
    bag
}

/// Cosine similarity of two content-word bags.
pub fn cosine(a: &HashMap<&str, f32>, b: &HashMap<&str, f32>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot: f32 = a
        .iter()
        .filter_map(|(word, x)| b.get(word).map(|y| x * y))
        .sum();
    let norm_a: f32 = a.values().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// The grouping predicate: exact normalized match, or content-word
/// cosine at or above `threshold`.
pub fn same_group(a: &str, b: &str, threshold: f32) -> bool {
    let norm_a = normalize(a);
    let norm_b = normalize(b);
    if norm_a == norm_b {
        return true;
    }
    cosine(&content_words(&norm_a), &content_words(&norm_b)) >= threshold
}

/// Numeric tokens of a normalized text, for value-conflict detection
/// and the synthesis integrity check.
pub fn numeric_tokens(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(|w| w.trim_end_matches('.').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize("  Voyager 1 was launched in 1977!  "),
            "voyager 1 was launched in 1977"
        );
        assert_eq!(normalize("Population: 1.2M."), "population 1.2m");
    }

    #[test]
    fn test_exact_match_after_normalization() {
        assert!(same_group(
            "Voyager 1 was launched in 1977.",
            "voyager 1 WAS launched in 1977",
            0.72
        ));
    }

    #[test]
    fn test_similar_claims_group() {
        assert!(same_group(
            "The Voyager 1 probe was launched by NASA in 1977.",
            "NASA launched the Voyager 1 probe in 1977.",
            0.72
        ));
    }

    #[test]
    fn test_unrelated_claims_do_not_group() {
        assert!(!same_group(
            "Voyager 1 was launched in 1977.",
            "The Eiffel Tower is located in Paris.",
            0.72
        ));
    }

    #[test]
    fn test_cosine_bounds() {
        let a = content_words("voyager launched 1977");
        let b = content_words("voyager launched 1977");
        assert!((cosine(&a, &b) - 1.0).abs() < 0.001);

        let c = content_words("completely different words");
        assert!(cosine(&a, &c).abs() < 0.001);
    }

    #[test]
    fn test_numeric_tokens() {
        let tokens = numeric_tokens(&normalize("The city has 1.2 million people, up 3% since 2020."));
        assert_eq!(tokens, vec!["1.2", "3", "2020"]);
    }
}
