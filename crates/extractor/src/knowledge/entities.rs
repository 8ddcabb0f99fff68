//! Named entity recognition over extracted text
//!
//! Pattern banks per label, each carrying a base confidence. Overlapping
//! matches are resolved by keeping the highest-confidence span per region,
//! with the longer span winning ties.

use regex_lite::Regex;
use std::sync::OnceLock;

pub const EQUIPMENT: &str = "equipment";
pub const SAFETY_ITEM: &str = "safety-item";
pub const PROCESS_STEP: &str = "process-step";
pub const PERSONNEL_ROLE: &str = "personnel-role";

/// Characters of context captured on each side of a span
const CONTEXT_WINDOW: usize = 40;

/// One recognized entity span. Offsets are character offsets into the
/// source text, `0 <= start <= end <= text.chars().count()`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMatch {
    pub text: String,
    pub label: &'static str,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    pub context: String,
}

struct PatternBank {
    label: &'static str,
    confidence: f64,
    patterns: Vec<Regex>,
}

fn banks() -> &'static [PatternBank] {
    static BANKS: OnceLock<Vec<PatternBank>> = OnceLock::new();
    BANKS.get_or_init(|| {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("entity pattern must compile"))
                .collect()
        };

        vec![
            PatternBank {
                label: SAFETY_ITEM,
                confidence: 0.9,
                patterns: compile(&[
                    r"(?i)\b(?:PPE|personal protective equipment|safety (?:glasses|goggles|harness)|hard hat|gloves|respirator|ear protection)\b",
                    r"(?i)\b(?:hazard|danger|warning|caution|risk)\b",
                    r"(?i)\b(?:OSHA|lockout|tagout|LOTO|safety procedure|emergency stop)\b",
                ]),
            },
            PatternBank {
                label: EQUIPMENT,
                confidence: 0.8,
                patterns: compile(&[
                    r"(?i)\b(?:pump|motor|valve|sensor|conveyor|compressor|turbine|boiler|robot|machine)(?:\s+#?\d+)?\b",
                    r"\b[A-Z]{2,4}-\d{2,6}\b",
                    r"\b(?i:Model|Part|Serial)\s*(?i:No\.?|Number)?\s*:?\s*[A-Z0-9][A-Z0-9-]+\b",
                ]),
            },
            PatternBank {
                label: PROCESS_STEP,
                confidence: 0.8,
                patterns: compile(&[
                    r"(?i)\b(?:temperature|pressure|flow rate|calibration|torque)\b",
                    r"(?i)\b\d+(?:\.\d+)?\s*(?:psi|rpm|gpm|cfm|hz)\b",
                    r"(?i)\b(?:start|stop|pause|resume|startup|shutdown|e-stop)\b",
                ]),
            },
            PatternBank {
                label: PERSONNEL_ROLE,
                confidence: 0.8,
                patterns: compile(&[
                    r"(?i)\b(?:operator|technician|engineer|supervisor|manager|inspector|electrician|welder)\b",
                ]),
            },
        ]
    })
}

/// Extract entities from text, resolving overlaps deterministically.
/// Matches below `min_confidence` are discarded before resolution.
pub fn extract_entities(text: &str, min_confidence: f64) -> Vec<EntityMatch> {
    // Byte offset of every char boundary; regex offsets are converted to
    // character offsets through it
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let chars: Vec<char> = text.chars().collect();

    struct Raw {
        text: String,
        label: &'static str,
        start: usize,
        end: usize,
        confidence: f64,
    }

    let mut raw: Vec<Raw> = Vec::new();
    for bank in banks() {
        if bank.confidence < min_confidence {
            continue;
        }
        for pattern in &bank.patterns {
            for m in pattern.find_iter(text) {
                let start = boundaries.binary_search(&m.start()).unwrap_or(0);
                let end = boundaries.binary_search(&m.end()).unwrap_or(start);
                raw.push(Raw {
                    text: m.as_str().to_string(),
                    label: bank.label,
                    start,
                    end,
                    confidence: bank.confidence,
                });
            }
        }
    }

    // Highest confidence wins per overlapping region; ties go to the
    // longer span, then to the earlier one, then to label order.
    raw.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (b.end - b.start).cmp(&(a.end - a.start)))
            .then_with(|| a.start.cmp(&b.start))
            .then_with(|| a.label.cmp(b.label))
    });

    let mut accepted: Vec<Raw> = Vec::new();
    for candidate in raw {
        let overlaps = accepted
            .iter()
            .any(|kept| candidate.start < kept.end && kept.start < candidate.end);
        if !overlaps {
            accepted.push(candidate);
        }
    }

    accepted.sort_by_key(|m| (m.start, m.end));

    accepted
        .into_iter()
        .map(|m| {
            let ctx_start = m.start.saturating_sub(CONTEXT_WINDOW);
            let ctx_end = (m.end + CONTEXT_WINDOW).min(chars.len());
            let context: String = chars[ctx_start..ctx_end].iter().collect();

            EntityMatch {
                text: m.text,
                label: m.label,
                start: m.start,
                end: m.end,
                confidence: m.confidence,
                context,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ppe_is_flagged_as_safety_item() {
        let entities = extract_entities("HAZARD: WEAR PPE", 0.5);
        let ppe = entities
            .iter()
            .find(|e| e.text == "PPE")
            .expect("PPE entity");
        assert_eq!(ppe.label, SAFETY_ITEM);
        assert!(ppe.confidence >= 0.9);
    }

    #[test]
    fn test_offsets_are_char_offsets_within_bounds() {
        let text = "Für die Wartung: operator prüft pump 3 bei 80 PSI täglich";
        let total = text.chars().count();
        let entities = extract_entities(text, 0.5);
        assert!(!entities.is_empty());

        for entity in &entities {
            assert!(entity.start <= entity.end);
            assert!(entity.end <= total);
            let span: String = text
                .chars()
                .skip(entity.start)
                .take(entity.end - entity.start)
                .collect();
            assert_eq!(span, entity.text);
        }
    }

    #[test]
    fn test_overlap_keeps_highest_confidence_span() {
        // "emergency stop" (safety-item, 0.9) overlaps "stop" (process-step, 0.8)
        let entities = extract_entities("Press the emergency stop button.", 0.5);
        let stops: Vec<_> = entities.iter().filter(|e| e.text.contains("stop")).collect();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].label, SAFETY_ITEM);
        assert_eq!(stops[0].text, "emergency stop");
    }

    #[test]
    fn test_equipment_with_unit_number() {
        let entities = extract_entities("Inspect pump #12 and valve 3.", 0.5);
        let texts: Vec<_> = entities.iter().map(|e| e.text.as_str()).collect();
        assert!(texts.contains(&"pump #12"));
        assert!(texts.contains(&"valve 3"));
    }

    #[test]
    fn test_min_confidence_filters_banks() {
        let entities = extract_entities("The operator wears PPE.", 0.85);
        assert!(!entities.is_empty());
        assert!(entities.iter().all(|e| e.label == SAFETY_ITEM));
    }

    #[test]
    fn test_context_window_surrounds_span() {
        let text = format!("{} hazard {}", "a".repeat(100), "b".repeat(100));
        let entities = extract_entities(&text, 0.5);
        let hazard = entities.iter().find(|e| e.text == "hazard").unwrap();
        assert_eq!(hazard.context.chars().count(), 6 + 2 * 40);
        assert!(hazard.context.contains("hazard"));
    }
}
