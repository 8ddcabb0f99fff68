//! Whole-document content classification
//!
//! Keyword taxonomies per category; confidence derives from keyword-hit
//! density. Categories below the configured threshold are discarded.

/// Fixed category taxonomy with trigger keywords
const TAXONOMY: &[(&str, &[&str])] = &[
    (
        "operational-procedure",
        &[
            "operation", "startup", "shutdown", "procedure", "step", "instruction",
            "control", "monitor", "adjust", "setting",
        ],
    ),
    (
        "safety-documentation",
        &[
            "safety", "hazard", "ppe", "osha", "emergency", "accident", "injury",
            "lockout", "tagout", "confined space", "chemical", "msds",
        ],
    ),
    (
        "training-material",
        &[
            "training", "course", "lesson", "certification", "competency", "skill",
            "assessment", "qualification", "instructor",
        ],
    ),
    (
        "technical-specification",
        &[
            "specification", "technical", "drawing", "schematic", "blueprint",
            "dimension", "tolerance", "material", "standard",
        ],
    ),
    (
        "maintenance-guide",
        &[
            "maintenance", "repair", "service", "inspection", "lubrication",
            "replacement", "troubleshooting", "preventive", "scheduled",
        ],
    ),
    (
        "quality-standard",
        &[
            "quality", "audit", "compliance", "iso", "calibration", "defect",
            "nonconformance", "corrective action", "verification",
        ],
    ),
];

/// One classification result
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMatch {
    pub category: &'static str,
    pub confidence: f64,
    /// The taxonomy keywords found in the text
    pub keywords: Vec<String>,
}

/// Classify a document's text against the fixed taxonomy.
/// Results are sorted by confidence, ties broken by category name.
pub fn classify_content(text: &str, threshold: f64) -> Vec<CategoryMatch> {
    let lower = text.to_lowercase();
    let mut categories = Vec::new();

    for (category, keywords) in TAXONOMY {
        let found: Vec<String> = keywords
            .iter()
            .filter(|kw| lower.contains(*kw))
            .map(|kw| kw.to_string())
            .collect();

        if found.is_empty() {
            continue;
        }

        let confidence = (found.len() as f64 / keywords.len() as f64 * 2.0).min(0.95);
        if confidence < threshold {
            continue;
        }

        categories.push(CategoryMatch {
            category,
            confidence,
            keywords: found,
        });
    }

    categories.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(b.category))
    });

    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_text_ranks_safety_documentation_first() {
        let text = "Safety manual: wear PPE, follow OSHA lockout tagout rules, \
                    report every hazard and emergency immediately.";
        let categories = classify_content(text, 0.3);

        assert!(!categories.is_empty());
        assert_eq!(categories[0].category, "safety-documentation");
        assert!(categories[0].confidence > 0.5);
        assert!(categories[0].keywords.contains(&"ppe".to_string()));
    }

    #[test]
    fn test_threshold_discards_weak_matches() {
        // A single keyword hit scores 2/10 = 0.2 for operational-procedure
        let text = "One monitor on the desk.";
        assert!(classify_content(text, 0.3).is_empty());
        assert_eq!(classify_content(text, 0.1).len(), 1);
    }

    #[test]
    fn test_confidence_is_capped() {
        let text = TAXONOMY
            .iter()
            .flat_map(|(_, kws)| kws.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        let categories = classify_content(&text, 0.3);
        assert!(categories.iter().all(|c| c.confidence <= 0.95));
        assert_eq!(categories.len(), TAXONOMY.len());
    }

    #[test]
    fn test_results_sorted_by_confidence() {
        let text = "Maintenance and repair service with scheduled inspection \
                    and lubrication; one quality check.";
        let categories = classify_content(text, 0.1);
        for pair in categories.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        assert_eq!(categories[0].category, "maintenance-guide");
    }
}
