use tracing::trace;

use super::{MaskingEngine, MaskingError, OperatorConfig};
use crate::detection::DetectedEntity;

/// Default masking engine
///
/// Overlapping or nested spans are merged into one region. The region is
/// rewritten with the operator of its strongest span: highest score, then
/// longest, then first. Spans that only touch stay separate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymizer;

struct Region<'a> {
    start: usize,
    end: usize,
    lead: &'a DetectedEntity,
}

impl Anonymizer {
    pub fn new() -> Self {
        Anonymizer
    }
}

fn check_span(text: &str, entity: &DetectedEntity) -> Result<(), MaskingError> {
    let in_bounds = entity.start <= entity.end && entity.end <= text.len();
    if in_bounds && text.is_char_boundary(entity.start) && text.is_char_boundary(entity.end) {
        Ok(())
    } else {
        Err(MaskingError::InvalidSpan {
            start: entity.start,
            end: entity.end,
            len: text.len(),
        })
    }
}

fn stronger<'a>(current: &'a DetectedEntity, other: &'a DetectedEntity) -> &'a DetectedEntity {
    match other.score.total_cmp(&current.score) {
        std::cmp::Ordering::Greater => other,
        std::cmp::Ordering::Equal if other.len() > current.len() => other,
        _ => current,
    }
}

fn merge_regions(entities: &[DetectedEntity]) -> Vec<Region<'_>> {
    let mut sorted: Vec<&DetectedEntity> = entities.iter().filter(|e| !e.is_empty()).collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end)));

    let mut regions: Vec<Region<'_>> = Vec::with_capacity(sorted.len());
    for entity in sorted {
        if let Some(region) = regions.last_mut() {
            if entity.start < region.end {
                region.end = region.end.max(entity.end);
                region.lead = stronger(region.lead, entity);
                continue;
            }
        }
        regions.push(Region {
            start: entity.start,
            end: entity.end,
            lead: entity,
        });
    }
    regions
}

impl MaskingEngine for Anonymizer {
    fn mask(
        &self,
        text: &str,
        entities: &[DetectedEntity],
        operators: &OperatorConfig,
    ) -> Result<String, MaskingError> {
        for entity in entities {
            check_span(text, entity)?;
        }

        let regions = merge_regions(entities);
        trace!("Masking {} regions from {} entities", regions.len(), entities.len());

        let mut result = String::with_capacity(text.len());
        let mut last_end = 0;
        for region in regions {
            result.push_str(&text[last_end..region.start]);
            let operator = operators.operator_for(&region.lead.entity_type);
            result.push_str(&operator.apply(&text[region.start..region.end], &region.lead.entity_type));
            last_end = region.end;
        }
        result.push_str(&text[last_end..]);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masking::Operator;

    fn entity(entity_type: &str, start: usize, end: usize, score: f64) -> DetectedEntity {
        DetectedEntity::new(entity_type, start, end, score)
    }

    #[test]
    fn test_replace_single_span() {
        let text = "mail alice@example.com now";
        let masked = Anonymizer::new()
            .mask(text, &[entity("EMAIL_ADDRESS", 5, 22, 1.0)], &OperatorConfig::default())
            .unwrap();
        assert_eq!(masked, "mail XXXXXX now");
    }

    #[test]
    fn test_no_entities_returns_text() {
        let masked = Anonymizer::new().mask("plain", &[], &OperatorConfig::default()).unwrap();
        assert_eq!(masked, "plain");
    }

    #[test]
    fn test_two_spans_in_one_text() {
        let text = "a@b.io or 415-555-0132";
        let entities = [entity("EMAIL_ADDRESS", 0, 6, 1.0), entity("PHONE_NUMBER", 10, 22, 0.4)];
        let masked = Anonymizer::new().mask(text, &entities, &OperatorConfig::default()).unwrap();
        assert_eq!(masked, "XXXXXX or XXXXXX");
    }

    #[test]
    fn test_nested_spans_merge_under_strongest() {
        let text = "id 123456789";
        let entities = [entity("PHONE_NUMBER", 3, 12, 0.4), entity("US_BANK_NUMBER", 5, 9, 0.9)];
        let config = OperatorConfig::uniform(Operator::Generalize);
        let masked = Anonymizer::new().mask(text, &entities, &config).unwrap();
        assert_eq!(masked, "id <US_BANK_NUMBER>");
    }

    #[test]
    fn test_adjacent_spans_stay_separate() {
        let text = "abcdef";
        let entities = [entity("A", 0, 3, 1.0), entity("B", 3, 6, 1.0)];
        let config = OperatorConfig::uniform(Operator::Generalize);
        let masked = Anonymizer::new().mask(text, &entities, &config).unwrap();
        assert_eq!(masked, "<A><B>");
    }

    #[test]
    fn test_per_entity_operator() {
        let text = "4111111111111111 bob@x.io";
        let config = OperatorConfig::default().with_entity(
            "CREDIT_CARD",
            Operator::Mask {
                masking_char: '*',
                chars_to_mask: Some(12),
                from_end: false,
            },
        );
        let entities = [entity("CREDIT_CARD", 0, 16, 1.0), entity("EMAIL_ADDRESS", 17, 25, 1.0)];
        let masked = Anonymizer::new().mask(text, &entities, &config).unwrap();
        assert_eq!(masked, "************1111 XXXXXX");
    }

    #[test]
    fn test_multibyte_text_is_preserved() {
        let text = "José: jose@example.com ✓";
        let start = text.find("jose@").unwrap();
        let end = start + "jose@example.com".len();
        let masked = Anonymizer::new()
            .mask(text, &[entity("EMAIL_ADDRESS", start, end, 1.0)], &OperatorConfig::default())
            .unwrap();
        assert_eq!(masked, "José: XXXXXX ✓");
    }

    #[test]
    fn test_invalid_spans_are_rejected() {
        let engine = Anonymizer::new();
        let config = OperatorConfig::default();
        let out_of_bounds = engine.mask("abc", &[entity("X", 1, 10, 1.0)], &config);
        assert!(matches!(out_of_bounds, Err(MaskingError::InvalidSpan { .. })));

        // 'é' is two bytes, offset 1 lands inside it
        let split_char = engine.mask("é", &[entity("X", 1, 2, 1.0)], &config);
        assert!(matches!(split_char, Err(MaskingError::InvalidSpan { .. })));
    }
}
