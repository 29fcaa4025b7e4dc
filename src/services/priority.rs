use crate::models::ImpactScore;

/// Map a 0-100 impact score onto the 1-4 priority scale, 1 being urgent.
pub fn convert_priority(impact_score_priority: f64) -> i32 {
    if impact_score_priority > 75.0 {
        1
    } else if impact_score_priority > 50.0 {
        2
    } else if impact_score_priority > 25.0 {
        3
    } else {
        4
    }
}

/// Priority derived from the first reserved priority impact score, if one
/// is present. Overrides any explicitly supplied priority.
pub fn priority_from_impact_scores(impact_scores: &[ImpactScore]) -> Option<i32> {
    impact_scores
        .iter()
        .find(|score| score.is_priority())
        .map(|score| convert_priority(score.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(field_id: &str, value: f64) -> ImpactScore {
        ImpactScore {
            field_id: field_id.to_string(),
            name: field_id.to_string(),
            value,
            unit: None,
            external_id: None,
        }
    }

    #[test]
    fn converts_score_buckets_at_their_boundaries() {
        assert_eq!(convert_priority(100.0), 1);
        assert_eq!(convert_priority(76.0), 1);
        assert_eq!(convert_priority(75.0), 2);
        assert_eq!(convert_priority(51.0), 2);
        assert_eq!(convert_priority(50.0), 3);
        assert_eq!(convert_priority(26.0), 3);
        assert_eq!(convert_priority(25.0), 4);
        assert_eq!(convert_priority(0.0), 4);
    }

    #[test]
    fn takes_the_first_priority_score_and_ignores_the_rest() {
        let scores = vec![
            score("cost_avoidance_per_year", 10_000.0),
            score("priority_impact", 80.0),
            score("priority", 10.0),
        ];
        assert_eq!(priority_from_impact_scores(&scores), Some(1));
    }

    #[test]
    fn no_priority_score_means_no_override() {
        let scores = vec![score("comfort_impact", 42.0)];
        assert_eq!(priority_from_impact_scores(&scores), None);
    }
}
