use chrono::{DateTime, NaiveDate, Utc};
use gut_tracker_client::{BowelMovementRecord, MedicationRecord, SymptomRecord};

use crate::aggregator::DataAggregator;
use crate::stats::{
    clamp_score, confidence_from_sample_size, correlation_strength_label, mean,
    pearson_correlation, round_to,
};
use crate::types::{Correlation, DailyAggregation, MedicationEffect};

/// Fewer paired days than this and no correlation is reported.
pub const MIN_SAMPLE_DAYS: usize = 3;

const SYMPTOM_SEVERITY: &str = "Symptom Severity";

pub fn build_correlation(factor: &str, outcome: &str, x: &[f64], y: &[f64]) -> Option<Correlation> {
    if x.len() < MIN_SAMPLE_DAYS || x.len() != y.len() {
        return None;
    }
    let r = round_to(pearson_correlation(x, y), 3);
    let sign = if r >= 0.0 { "positive" } else { "negative" };
    Some(Correlation {
        factor: factor.to_string(),
        outcome: outcome.to_string(),
        strength: r,
        confidence: confidence_from_sample_size(x.len()),
        sample_size: x.len(),
        description: format!(
            "There is a {} {} correlation between {} and {} (r={:.3}).",
            correlation_strength_label(r).to_lowercase(),
            sign,
            factor.to_lowercase(),
            outcome.to_lowercase(),
            r
        ),
    })
}

fn series<F>(days: &[&DailyAggregation], f: F) -> Vec<f64>
where
    F: Fn(&DailyAggregation) -> f64,
{
    days.iter().map(|d| f(*d)).collect()
}

/// Meal features against bowel outcomes, over days with both.
pub fn meal_bowel_correlations(daily: &[DailyAggregation]) -> Vec<Correlation> {
    let days: Vec<&DailyAggregation> = daily
        .iter()
        .filter(|d| d.meal_count > 0 && d.bowel_movement_count > 0)
        .collect();

    [
        build_correlation(
            "Fiber-Rich Meals",
            "Bristol Stool Type",
            &series(&days, |d| d.fiber_rich_meal_count as f64),
            &series(&days, |d| d.avg_bristol),
        ),
        build_correlation(
            "Daily Calorie Intake",
            "Bowel Movement Satisfaction",
            &series(&days, |d| d.total_calories as f64),
            &series(&days, |d| d.avg_satisfaction),
        ),
        build_correlation(
            "Spicy Food Level",
            "Bowel Movement Pain",
            &series(&days, |d| f64::from(d.max_spicy_level)),
            &series(&days, |d| d.avg_pain),
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Meal traits against symptom severity, over days with meals. A day
/// without symptoms counts as severity 0.
pub fn meal_symptom_correlations(daily: &[DailyAggregation]) -> Vec<Correlation> {
    let days: Vec<&DailyAggregation> = daily.iter().filter(|d| d.meal_count > 0).collect();
    let severity = series(&days, |d| d.avg_symptom_severity);

    [
        (
            "Spicy Food Consumption",
            series(&days, |d| d.spicy_meal_count as f64),
        ),
        (
            "Dairy Consumption",
            series(&days, |d| d.dairy_meal_count as f64),
        ),
        (
            "Gluten Consumption",
            series(&days, |d| d.gluten_meal_count as f64),
        ),
    ]
    .into_iter()
    .filter_map(|(factor, x)| build_correlation(factor, SYMPTOM_SEVERITY, &x, &severity))
    .collect()
}

fn medication_name(med: &MedicationRecord) -> String {
    let name = med.name.trim();
    if name.is_empty() {
        "Unnamed medication".to_string()
    } else {
        name.to_string()
    }
}

fn on_medication(aggregator: &DataAggregator, med: &MedicationRecord, day: NaiveDate) -> bool {
    let Some(start) = med.start_date else {
        return false;
    };
    aggregator.local_date(start) <= day
        && med
            .end_date
            .is_none_or(|end| day <= aggregator.local_date(end))
}

/// For each medication, being on it against daily symptom severity. Only
/// reported when the window covers days both on and off the medication.
pub fn medication_symptom_correlations(
    aggregator: &DataAggregator,
    daily: &[DailyAggregation],
    medications: &[MedicationRecord],
) -> Vec<Correlation> {
    let severity: Vec<f64> = daily.iter().map(|d| d.avg_symptom_severity).collect();
    medications
        .iter()
        .filter(|m| m.start_date.is_some())
        .filter_map(|med| {
            let on: Vec<f64> = daily
                .iter()
                .map(|d| {
                    if on_medication(aggregator, med, d.date) {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect();
            let days_on = on.iter().filter(|v| **v > 0.0).count();
            if days_on == 0 || days_on == on.len() {
                return None;
            }
            build_correlation(&medication_name(med), SYMPTOM_SEVERITY, &on, &severity)
        })
        .collect()
}

fn bowel_score(bm: &BowelMovementRecord) -> f64 {
    f64::from(bm.satisfaction) - f64::from(bm.pain) - f64::from(bm.strain)
}

fn improvement_percent(before: f64, after: f64, lower_is_better: bool) -> f64 {
    if before == 0.0 {
        return 0.0;
    }
    let delta = if lower_is_better {
        before - after
    } else {
        after - before
    };
    delta / before.abs() * 100.0
}

/// Compare symptoms and bowel movements before and after each course started.
pub fn medication_effectiveness(
    aggregator: &DataAggregator,
    medications: &[MedicationRecord],
    bowel_movements: &[BowelMovementRecord],
    symptoms: &[SymptomRecord],
) -> Vec<MedicationEffect> {
    let mut effects: Vec<MedicationEffect> = medications
        .iter()
        .filter_map(|med| {
            let started = med.start_date?;
            let in_course =
                |at: DateTime<Utc>| at >= started && med.end_date.is_none_or(|end| at <= end);

            let (mut sev_before, mut sev_after) = (Vec::new(), Vec::new());
            let (mut days_before, mut days_after) = (Vec::new(), Vec::new());
            for s in symptoms {
                if s.recorded_at < started {
                    sev_before.push(f64::from(s.severity));
                    days_before.push(aggregator.local_date(s.recorded_at));
                } else if in_course(s.recorded_at) {
                    sev_after.push(f64::from(s.severity));
                    days_after.push(aggregator.local_date(s.recorded_at));
                }
            }
            let (mut bowel_before, mut bowel_after) = (Vec::new(), Vec::new());
            for bm in bowel_movements {
                if bm.recorded_at < started {
                    bowel_before.push(bowel_score(bm));
                    days_before.push(aggregator.local_date(bm.recorded_at));
                } else if in_course(bm.recorded_at) {
                    bowel_after.push(bowel_score(bm));
                    days_after.push(aggregator.local_date(bm.recorded_at));
                }
            }
            if days_before.is_empty() || days_after.is_empty() {
                return None;
            }
            days_before.sort();
            days_before.dedup();
            days_after.sort();
            days_after.dedup();

            let severity_before = mean(&sev_before);
            let severity_after = mean(&sev_after);
            let symptom_improvement = improvement_percent(severity_before, severity_after, true);
            let bowel_improvement =
                improvement_percent(mean(&bowel_before), mean(&bowel_after), false);
            let samples = (sev_before.len() + bowel_before.len())
                .min(sev_after.len() + bowel_after.len());

            Some(MedicationEffect {
                medication: medication_name(med),
                category: med
                    .category
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default(),
                started_at: started,
                days_before: days_before.len(),
                days_after: days_after.len(),
                severity_before: round_to(severity_before, 2),
                severity_after: round_to(severity_after, 2),
                symptom_improvement_percent: round_to(symptom_improvement, 1),
                bowel_improvement_percent: round_to(bowel_improvement, 1),
                effectiveness_score: round_to(
                    clamp_score(
                        50.0 + 0.3 * symptom_improvement + 0.2 * bowel_improvement,
                        0.0,
                        100.0,
                    ),
                    1,
                ),
                confidence: confidence_from_sample_size(samples),
            })
        })
        .collect();
    effects.sort_by(|a, b| {
        b.effectiveness_score
            .total_cmp(&a.effectiveness_score)
            .then_with(|| a.medication.cmp(&b.medication))
    });
    effects
}
