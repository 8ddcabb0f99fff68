//! Key phrase extraction
//!
//! Candidate phrases come from a small set of surface patterns; each is
//! scored for salience, deduplicated, and the top-K retained.

use regex_lite::Regex;
use std::sync::OnceLock;

/// One scored key phrase
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseMatch {
    pub phrase: String,
    pub score: f64,
}

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Capitalized multi-word phrases
            r"\b(?:[A-Z][a-z]+\s+){1,3}[A-Z][a-z]+\b",
            // Technical measurements
            r"\b\d+(?:\.\d+)?\s*(?:PSI|RPM|GPM|CFM|Hz|mm|cm|kg|bar)\b",
            // Technical codes
            r"\b[A-Z]{2,}-\d+\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("phrase pattern must compile"))
        .collect()
    })
}

/// Salience score: longer phrases and capitalized openings rank higher
fn score(phrase: &str) -> f64 {
    let words = phrase.split_whitespace().count() as f64;
    let lead = if phrase.chars().next().is_some_and(|c| c.is_uppercase()) {
        1.0
    } else {
        0.5
    };
    words * 0.3 + lead
}

/// Extract the top `max_phrases` key phrases from text.
/// Duplicates keep their first occurrence; output is sorted by score,
/// ties broken alphabetically.
pub fn extract_key_phrases(text: &str, max_phrases: usize) -> Vec<PhraseMatch> {
    let mut seen = std::collections::HashSet::new();
    let mut phrases = Vec::new();

    for pattern in patterns() {
        for m in pattern.find_iter(text) {
            let phrase = m.as_str().trim().to_string();
            if phrase.is_empty() || !seen.insert(phrase.clone()) {
                continue;
            }
            phrases.push(PhraseMatch {
                score: score(&phrase),
                phrase,
            });
        }
    }

    phrases.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.phrase.cmp(&b.phrase))
    });
    phrases.truncate(max_phrases);

    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalized_phrases_and_measurements() {
        let text = "Main Control Panel runs at 1200 RPM near unit AB-42.";
        let phrases = extract_key_phrases(text, 10);
        let texts: Vec<_> = phrases.iter().map(|p| p.phrase.as_str()).collect();

        assert!(texts.contains(&"Main Control Panel"));
        assert!(texts.contains(&"1200 RPM"));
        assert!(texts.contains(&"AB-42"));
    }

    #[test]
    fn test_top_k_is_enforced() {
        let text = "Alpha Beta. Gamma Delta. Epsilon Zeta. Eta Theta. Iota Kappa.";
        let phrases = extract_key_phrases(text, 3);
        assert_eq!(phrases.len(), 3);
    }

    #[test]
    fn test_longer_phrases_score_higher() {
        assert!(score("Main Control Panel") > score("Main Panel"));
        assert!(score("Main Panel") > score("lowercase phrase"));
    }

    #[test]
    fn test_duplicates_are_removed() {
        let text = "Pressure Gauge here, Pressure Gauge there.";
        let phrases = extract_key_phrases(text, 10);
        let count = phrases
            .iter()
            .filter(|p| p.phrase == "Pressure Gauge")
            .count();
        assert_eq!(count, 1);
    }
}
