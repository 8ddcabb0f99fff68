//! Relationship extraction between co-occurring entities
//!
//! Entities whose spans start within a small proximity window are related
//! through a fixed label-pair rule table. Both endpoints always belong to
//! the same document.

use super::entities::{EntityMatch, EQUIPMENT, PERSONNEL_ROLE, PROCESS_STEP, SAFETY_ITEM};

/// Maximum distance between span starts, in characters
const PROXIMITY_WINDOW: usize = 50;

/// Characters of context captured around the related pair
const CONTEXT_WINDOW: usize = 25;

const RELATIONSHIP_CONFIDENCE: f64 = 0.7;

/// A directed relation between two entities, referenced by index into the
/// entity list of the same extraction pass
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipMatch {
    pub source: usize,
    pub target: usize,
    pub relationship_type: &'static str,
    pub confidence: f64,
    pub context: String,
}

/// Relation type for an ordered label pair
fn rule(source_label: &str, target_label: &str) -> Option<&'static str> {
    match (source_label, target_label) {
        (PERSONNEL_ROLE, EQUIPMENT) => Some("operates"),
        (PERSONNEL_ROLE, SAFETY_ITEM) => Some("follows"),
        (EQUIPMENT, PROCESS_STEP) => Some("controls"),
        (SAFETY_ITEM, PROCESS_STEP) => Some("protects"),
        (EQUIPMENT, EQUIPMENT) => Some("connects-to"),
        (PERSONNEL_ROLE, PERSONNEL_ROLE) => Some("reports-to"),
        _ => None,
    }
}

/// Extract relationships among the entities of one document.
/// `entities` must be in start-offset order (as `extract_entities` returns).
pub fn extract_relationships(text: &str, entities: &[EntityMatch]) -> Vec<RelationshipMatch> {
    let chars: Vec<char> = text.chars().collect();
    let mut relationships = Vec::new();

    for i in 0..entities.len() {
        for j in (i + 1)..entities.len() {
            let (a, b) = (&entities[i], &entities[j]);

            let distance = b.start.saturating_sub(a.start);
            if distance >= PROXIMITY_WINDOW {
                break; // entities are start-ordered
            }

            // The rule table fixes the direction: try (a, b), then (b, a)
            let (source, target, relationship_type) = match rule(a.label, b.label) {
                Some(rel) => (i, j, rel),
                None => match rule(b.label, a.label) {
                    Some(rel) => (j, i, rel),
                    None => continue,
                },
            };

            let ctx_start = a.start.min(b.start).saturating_sub(CONTEXT_WINDOW);
            let ctx_end = (a.end.max(b.end) + CONTEXT_WINDOW).min(chars.len());
            let context: String = chars[ctx_start..ctx_end].iter().collect();

            relationships.push(RelationshipMatch {
                source,
                target,
                relationship_type,
                confidence: RELATIONSHIP_CONFIDENCE,
                context,
            });
        }
    }

    relationships
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::entities::extract_entities;

    #[test]
    fn test_operator_operates_nearby_pump() {
        let text = "The operator starts pump 3 every morning.";
        let entities = extract_entities(text, 0.5);
        let relationships = extract_relationships(text, &entities);

        let operates = relationships
            .iter()
            .find(|r| r.relationship_type == "operates")
            .expect("operates relationship");

        // Direction is fixed by the rule table, not by text order
        assert_eq!(entities[operates.source].label, PERSONNEL_ROLE);
        assert_eq!(entities[operates.target].label, EQUIPMENT);
        assert!(operates.context.contains("operator"));
    }

    #[test]
    fn test_reversed_text_order_keeps_direction() {
        let text = "Check pump 3 before the technician arrives.";
        let entities = extract_entities(text, 0.5);
        let relationships = extract_relationships(text, &entities);

        let operates = relationships
            .iter()
            .find(|r| r.relationship_type == "operates")
            .expect("operates relationship");
        assert_eq!(entities[operates.source].label, PERSONNEL_ROLE);
        assert_eq!(entities[operates.target].label, EQUIPMENT);
    }

    #[test]
    fn test_distant_entities_are_unrelated() {
        let filler = "x ".repeat(60);
        let text = format!("The operator leaves. {} Then pump 3 runs.", filler);
        let entities = extract_entities(&text, 0.5);
        let relationships = extract_relationships(&text, &entities);
        assert!(relationships
            .iter()
            .all(|r| r.relationship_type != "operates"));
    }

    #[test]
    fn test_no_rule_no_relationship() {
        // safety-item and equipment have no rule entry
        let text = "Wear PPE near the compressor.";
        let entities = extract_entities(text, 0.5);
        let relationships = extract_relationships(text, &entities);
        assert!(relationships.is_empty());
    }
}
