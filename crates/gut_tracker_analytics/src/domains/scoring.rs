use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::stats::{TrendDirection, clamp_score, round_to};
use crate::types::{
    BowelMovementSummary, HealthScore, MealSummary, MedicationSummary, ScoreFactor,
    SymptomSummary, TrendAnalysis, TrendMetric,
};

pub const BOWEL_WEIGHT: f64 = 0.4;
pub const SYMPTOM_WEIGHT: f64 = 0.3;
pub const NUTRITION_WEIGHT: f64 = 0.2;
pub const MEDICATION_WEIGHT: f64 = 0.1;

/// Component score used when there is nothing to judge.
pub const NEUTRAL_SCORE: f64 = 50.0;
const MAX_SCORE: f64 = 100.0;

const LOW_FREQUENCY_PER_DAY: f64 = 0.5;
const HIGH_FREQUENCY_PER_DAY: f64 = 4.0;
const MANY_SYMPTOMS: usize = 10;

/// The four weighted components, each in `[0, 100]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComponentScores {
    pub bowel_health: f64,
    pub symptom_control: f64,
    pub nutrition: f64,
    pub medication_adherence: f64,
}

impl ComponentScores {
    pub fn overall(&self) -> f64 {
        BOWEL_WEIGHT * self.bowel_health
            + SYMPTOM_WEIGHT * self.symptom_control
            + NUTRITION_WEIGHT * self.nutrition
            + MEDICATION_WEIGHT * self.medication_adherence
    }
}

pub fn bowel_health_score(summary: &BowelMovementSummary) -> f64 {
    if summary.total_count == 0 {
        return NEUTRAL_SCORE;
    }
    let mut score = MAX_SCORE - (1.0 - summary.consistency_score) * 40.0
        - (summary.average_pain - 1.0) * 5.0
        - (summary.average_strain - 1.0) * 5.0
        + (summary.average_satisfaction - 5.0) * 2.0;
    // a single movement has no rhythm to judge
    if summary.total_count >= 2 {
        score -= (1.0 - summary.regularity_score) * 10.0;
    }
    if summary.average_per_day < LOW_FREQUENCY_PER_DAY {
        score -= 20.0;
    } else if summary.average_per_day > HIGH_FREQUENCY_PER_DAY {
        score -= 15.0;
    }
    clamp_score(score, 0.0, MAX_SCORE)
}

pub fn symptom_control_score(summary: &SymptomSummary) -> f64 {
    if summary.total_symptoms == 0 {
        return MAX_SCORE;
    }
    let mut score = MAX_SCORE
        - summary.total_symptoms as f64 * 2.0
        - summary.average_severity * 5.0;
    if summary.total_symptoms > MANY_SYMPTOMS {
        score -= 20.0;
    }
    clamp_score(score, 0.0, MAX_SCORE)
}

pub fn nutrition_component(summary: &MealSummary) -> f64 {
    if summary.total_meals == 0 {
        return NEUTRAL_SCORE;
    }
    clamp_score(summary.nutrition_score, 0.0, MAX_SCORE)
}

pub fn medication_component(summary: &MedicationSummary) -> f64 {
    if summary.total_medications == 0 {
        return MAX_SCORE;
    }
    clamp_score(summary.compliance_score, 0.0, MAX_SCORE)
}

pub fn component_scores(
    bowel: &BowelMovementSummary,
    meals: &MealSummary,
    symptoms: &SymptomSummary,
    medications: &MedicationSummary,
) -> ComponentScores {
    ComponentScores {
        bowel_health: bowel_health_score(bowel),
        symptom_control: symptom_control_score(symptoms),
        nutrition: nutrition_component(meals),
        medication_adherence: medication_component(medications),
    }
}

fn band(score: f64) -> &'static str {
    if score >= 80.0 {
        "excellent"
    } else if score >= 60.0 {
        "good"
    } else if score >= 40.0 {
        "fair"
    } else {
        "needs attention"
    }
}

fn factor(name: &str, score: f64, weight: f64, trend: TrendDirection) -> ScoreFactor {
    ScoreFactor {
        name: name.to_string(),
        impact: round_to(score - NEUTRAL_SCORE, 1),
        weight,
        description: format!("{name} is {} ({score:.0}/100)", band(score)),
        trend,
    }
}

/// Composite score with per-component factors, most positive impact first.
pub fn health_score(
    components: ComponentScores,
    trends: &TrendAnalysis,
    now: DateTime<Utc>,
) -> HealthScore {
    let component_scores: BTreeMap<String, f64> = [
        ("bowelHealth", components.bowel_health),
        ("symptomControl", components.symptom_control),
        ("nutrition", components.nutrition),
        ("medicationAdherence", components.medication_adherence),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let mut factors = vec![
        factor(
            "Bowel health",
            components.bowel_health,
            BOWEL_WEIGHT,
            trends.direction_of(TrendMetric::BowelConsistency),
        ),
        factor(
            "Symptom control",
            components.symptom_control,
            SYMPTOM_WEIGHT,
            trends.direction_of(TrendMetric::SymptomSeverity),
        ),
        factor(
            "Nutrition",
            components.nutrition,
            NUTRITION_WEIGHT,
            trends.direction_of(TrendMetric::FiberIntake),
        ),
        factor(
            "Medication adherence",
            components.medication_adherence,
            MEDICATION_WEIGHT,
            TrendDirection::Stable,
        ),
    ];
    factors.sort_by(|a, b| {
        b.impact
            .total_cmp(&a.impact)
            .then_with(|| a.name.cmp(&b.name))
    });

    HealthScore {
        overall_score: clamp_score(components.overall(), 0.0, MAX_SCORE),
        component_scores,
        factors,
        trend: trends.overall_trend,
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisPeriod;

    fn bowel(total: usize, per_day: f64) -> BowelMovementSummary {
        BowelMovementSummary {
            total_count: total,
            average_per_day: per_day,
            most_common_bristol: 4,
            average_pain: 1.0,
            average_strain: 1.0,
            average_satisfaction: 5.0,
            regularity_score: 1.0,
            consistency_score: 1.0,
        }
    }

    fn trends() -> TrendAnalysis {
        let at = "2025-03-01T00:00:00Z".parse().expect("timestamp");
        TrendAnalysis {
            period: AnalysisPeriod {
                start: at,
                end: at,
                days: 1,
            },
            metrics: Vec::new(),
            overall_trend: TrendDirection::Stable,
        }
    }

    #[test]
    fn ideal_bowel_scores_full() {
        assert_eq!(bowel_health_score(&bowel(10, 1.0)), 100.0);
    }

    #[test]
    fn bowel_penalties() {
        let mut summary = bowel(10, 1.0);
        summary.consistency_score = 0.5;
        summary.average_pain = 3.0;
        summary.regularity_score = 0.5;
        // 100 - 20 - 10 - 5
        assert_eq!(bowel_health_score(&summary), 65.0);
        assert_eq!(bowel_health_score(&bowel(2, 0.25)), 80.0);
        assert_eq!(bowel_health_score(&bowel(30, 5.0)), 85.0);
    }

    #[test]
    fn single_movement_skips_regularity() {
        let mut summary = bowel(1, 1.0);
        summary.regularity_score = 0.0;
        assert_eq!(bowel_health_score(&summary), 100.0);
    }

    #[test]
    fn empty_components_use_defaults() {
        let scores = component_scores(
            &BowelMovementSummary::default(),
            &MealSummary::default(),
            &SymptomSummary::default(),
            &MedicationSummary::default(),
        );
        assert_eq!(scores.bowel_health, NEUTRAL_SCORE);
        assert_eq!(scores.symptom_control, 100.0);
        assert_eq!(scores.nutrition, NEUTRAL_SCORE);
        assert_eq!(scores.medication_adherence, 100.0);
        assert!((scores.overall() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn symptom_penalties() {
        let summary = SymptomSummary {
            total_symptoms: 12,
            average_severity: 4.0,
            ..SymptomSummary::default()
        };
        // 100 - 24 - 20 - 20
        assert_eq!(symptom_control_score(&summary), 36.0);
    }

    #[test]
    fn overall_is_weighted_sum() {
        let scores = ComponentScores {
            bowel_health: 80.0,
            symptom_control: 60.0,
            nutrition: 40.0,
            medication_adherence: 100.0,
        };
        let score = health_score(scores, &trends(), "2025-03-02T00:00:00Z".parse().expect("ts"));
        assert!((score.overall_score - 68.0).abs() < 1e-9);
        assert_eq!(score.component_scores.len(), 4);
        assert_eq!(score.component_scores["nutrition"], 40.0);
        let names: Vec<_> = score.factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            ["Medication adherence", "Bowel health", "Symptom control", "Nutrition"]
        );
        assert_eq!(score.factors[3].impact, -10.0);
        assert_eq!(score.factors[1].description, "Bowel health is excellent (80/100)");
    }
}
