//! Per-day rollups and per-domain summaries.
//!
//! Timestamps are cut into calendar days in the aggregator's reference
//! offset, so a meal at 23:30 UTC lands on the next day for a +02:00 user.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};
use gut_tracker_client::{BowelMovementRecord, MealRecord, MedicationRecord, SymptomRecord};

use crate::stats::{
    clamp_score, mean, most_common, regression_slope, round_to, sanitize, summary_statistics,
    trend_direction,
};
use crate::types::{
    BowelMovementSummary, DailyAggregation, MealGroups, MealSummary, MedicationSummary,
    SymptomSummary,
};

/// Spicy levels above this count a meal as spicy.
pub const SPICY_THRESHOLD: u8 = 2;
/// Meals at or under this many calories count toward the nutrition score.
pub const HEALTHY_MAX_CALORIES: u32 = 600;
/// Meals above this many calories count as large.
pub const LARGE_MEAL_CALORIES: u32 = 800;
/// Bristol type treated as ideal.
pub const IDEAL_BRISTOL: f64 = 4.0;

const FIBER_WEIGHT: f64 = 0.6;
const HEALTHY_CALORIE_WEIGHT: f64 = 0.4;

#[derive(Clone, Copy, Debug)]
pub struct DataAggregator {
    offset: FixedOffset,
    trend_threshold: f64,
}

impl DataAggregator {
    pub fn new(offset: FixedOffset, trend_threshold: f64) -> Self {
        Self {
            offset,
            trend_threshold,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    pub fn local_hour(&self, ts: DateTime<Utc>) -> u32 {
        ts.with_timezone(&self.offset).hour()
    }

    /// Every calendar day from `start` to `end`, both included.
    pub fn days_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
        let first = self.local_date(start);
        let last = self.local_date(end);
        first.iter_days().take_while(|d| *d <= last).collect()
    }

    pub fn aggregate_daily(
        &self,
        bowel_movements: &[BowelMovementRecord],
        meals: &[MealRecord],
        symptoms: &[SymptomRecord],
        medications: &[MedicationRecord],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<DailyAggregation> {
        let mut days: BTreeMap<NaiveDate, DailyAggregation> = self
            .days_in_range(start, end)
            .into_iter()
            .map(|d| (d, DailyAggregation::empty(d)))
            .collect();

        for bm in bowel_movements {
            if let Some(day) = days.get_mut(&self.local_date(bm.recorded_at)) {
                day.bowel_movements.push(bm.clone());
            }
        }
        for meal in meals {
            if let Some(day) = days.get_mut(&self.local_date(meal.meal_time)) {
                day.meals.push(meal.clone());
            }
        }
        for symptom in symptoms {
            if let Some(day) = days.get_mut(&self.local_date(symptom.recorded_at)) {
                day.symptoms.push(symptom.clone());
            }
        }
        // Courses are bucketed on their start day only, not every day they ran.
        for med in medications {
            let Some(started) = med.start_date else {
                continue;
            };
            if let Some(day) = days.get_mut(&self.local_date(started)) {
                day.medications.push(med.clone());
            }
        }

        days.into_values().map(finish_day).collect()
    }

    pub fn aggregate_bowel_movements(&self, records: &[BowelMovementRecord]) -> BowelMovementSummary {
        if records.is_empty() {
            return BowelMovementSummary::default();
        }
        let mut sorted = records.to_vec();
        sorted.sort_by_key(|r| r.recorded_at);
        let span = day_span(sorted.iter().map(|r| r.recorded_at));

        let times: Vec<DateTime<Utc>> = sorted.iter().map(|r| r.recorded_at).collect();
        let bristol: Vec<u8> = sorted.iter().map(|r| r.bristol_type).collect();

        BowelMovementSummary {
            total_count: sorted.len(),
            average_per_day: sanitize(sorted.len() as f64 / span),
            most_common_bristol: most_common(bristol.iter().copied()).unwrap_or(0),
            average_pain: mean_of(&sorted, |r| r.pain),
            average_strain: mean_of(&sorted, |r| r.strain),
            average_satisfaction: mean_of(&sorted, |r| r.satisfaction),
            regularity_score: regularity_score(&times),
            consistency_score: consistency_score(&bristol),
        }
    }

    pub fn aggregate_meals(&self, records: &[MealRecord]) -> MealSummary {
        if records.is_empty() {
            return MealSummary::default();
        }
        let mut sorted = records.to_vec();
        sorted.sort_by_key(|r| r.meal_time);
        let span = day_span(sorted.iter().map(|r| r.meal_time));
        let n = sorted.len() as f64;
        let total_calories: u64 = sorted.iter().map(|m| u64::from(m.calories)).sum();
        let fiber_rich = sorted.iter().filter(|m| m.fiber_rich).count() as f64;
        let healthy = sorted
            .iter()
            .filter(|m| m.calories <= HEALTHY_MAX_CALORIES)
            .count() as f64;

        MealSummary {
            total_meals: sorted.len(),
            average_per_day: sanitize(n / span),
            total_calories,
            average_calories: sanitize(total_calories as f64 / n),
            fiber_rich_percent: sanitize(fiber_rich / n * 100.0),
            healthy_calorie_percent: sanitize(healthy / n * 100.0),
            nutrition_score: nutrition_score(&sorted),
        }
    }

    pub fn aggregate_symptoms(&self, records: &[SymptomRecord]) -> SymptomSummary {
        if records.is_empty() {
            return SymptomSummary::default();
        }
        let mut sorted = records.to_vec();
        sorted.sort_by_key(|r| r.recorded_at);
        let span = day_span(sorted.iter().map(|r| r.recorded_at));
        let severities: Vec<f64> = sorted.iter().map(|s| f64::from(s.severity)).collect();
        // falling severity is an improvement
        let slope = regression_slope(&severities);

        SymptomSummary {
            total_symptoms: sorted.len(),
            average_per_day: sanitize(sorted.len() as f64 / span),
            average_severity: mean(&severities),
            most_common_category: most_common(sorted.iter().filter_map(|s| s.category.map(|c| c.as_str())))
                .map(str::to_string)
                .unwrap_or_default(),
            most_common_type: most_common(sorted.iter().filter_map(|s| s.symptom_type.map(|t| t.as_str())))
                .map(str::to_string)
                .unwrap_or_default(),
            trend_direction: trend_direction(-slope, self.trend_threshold),
        }
    }

    pub fn aggregate_medications(&self, records: &[MedicationRecord]) -> MedicationSummary {
        if records.is_empty() {
            return MedicationSummary::default();
        }
        let mut sorted = records.to_vec();
        sorted.sort_by_key(|m| m.start_date);

        MedicationSummary {
            total_medications: sorted.len(),
            active_medications: sorted.iter().filter(|m| m.is_active).count(),
            compliance_score: compliance_score(&sorted),
            most_common_category: most_common(sorted.iter().filter_map(|m| m.category.map(|c| c.as_str())))
                .map(str::to_string)
                .unwrap_or_default(),
        }
    }

    /// Bowel movements keyed by ISO week, e.g. `2025-W09`.
    pub fn group_bowel_movements_by_week(
        &self,
        records: &[BowelMovementRecord],
    ) -> BTreeMap<String, Vec<BowelMovementRecord>> {
        let mut weeks: BTreeMap<String, Vec<BowelMovementRecord>> = BTreeMap::new();
        for bm in records {
            let week = self.local_date(bm.recorded_at).iso_week();
            weeks
                .entry(format!("{}-W{:02}", week.year(), week.week()))
                .or_default()
                .push(bm.clone());
        }
        weeks
    }
}

fn finish_day(mut day: DailyAggregation) -> DailyAggregation {
    day.bowel_movement_count = day.bowel_movements.len();
    day.meal_count = day.meals.len();
    day.symptom_count = day.symptoms.len();

    for meal in &day.meals {
        let spice = meal.spicy_level.unwrap_or(0);
        if spice > SPICY_THRESHOLD {
            day.spicy_meal_count += 1;
        }
        if meal.dairy {
            day.dairy_meal_count += 1;
        }
        if meal.gluten {
            day.gluten_meal_count += 1;
        }
        if meal.fiber_rich {
            day.fiber_rich_meal_count += 1;
        }
        day.total_calories += u64::from(meal.calories);
        day.max_spicy_level = day.max_spicy_level.max(spice);
    }

    let bms = &day.bowel_movements;
    day.avg_bristol = mean_of(bms, |r| r.bristol_type);
    day.avg_pain = mean_of(bms, |r| r.pain);
    day.avg_strain = mean_of(bms, |r| r.strain);
    day.avg_satisfaction = mean_of(bms, |r| r.satisfaction);

    day.avg_symptom_severity = mean_of(&day.symptoms, |s| s.severity);
    day.total_symptom_severity = day.symptoms.iter().map(|s| f64::from(s.severity)).sum();
    day
}

fn mean_of<T>(records: &[T], field: impl Fn(&T) -> u8) -> f64 {
    let values: Vec<f64> = records.iter().map(|r| f64::from(field(r))).collect();
    mean(&values)
}

/// Days between the first and last timestamp, never less than one.
pub fn day_span(timestamps: impl IntoIterator<Item = DateTime<Utc>>) -> f64 {
    let mut iter = timestamps.into_iter();
    let Some(first) = iter.next() else {
        return 1.0;
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    let days = (max - min).num_seconds() as f64 / 86_400.0;
    days.max(1.0)
}

/// `1 - stdDev/mean` of the gaps between consecutive events, in hours.
pub fn regularity_score(timestamps: &[DateTime<Utc>]) -> f64 {
    if timestamps.len() < 2 {
        return 0.0;
    }
    let mut sorted = timestamps.to_vec();
    sorted.sort();
    let intervals: Vec<f64> = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64 / 3600.0)
        .collect();
    let summary = summary_statistics(&intervals);
    if summary.mean <= 0.0 {
        return 0.0;
    }
    round_to(clamp_score(1.0 - summary.std_dev / summary.mean, 0.0, 1.0), 2)
}

/// How close a single movement is to the ideal type, in `[0, 1]`.
pub fn bristol_closeness(bristol: u8) -> f64 {
    clamp_score(1.0 - (f64::from(bristol) - IDEAL_BRISTOL).abs() / 3.0, 0.0, 1.0)
}

/// Average closeness to the ideal Bristol type, discounted by how often the
/// type changes between consecutive movements. `bristol` is in chronological order.
pub fn consistency_score(bristol: &[u8]) -> f64 {
    if bristol.is_empty() {
        return 0.0;
    }
    let deviation = bristol
        .iter()
        .map(|b| (f64::from(*b) - IDEAL_BRISTOL).abs())
        .sum::<f64>()
        / bristol.len() as f64;
    let closeness = 1.0 - deviation / 3.0;
    let change_ratio = if bristol.len() > 1 {
        let changes = bristol.windows(2).filter(|w| w[0] != w[1]).count();
        changes as f64 / (bristol.len() - 1) as f64
    } else {
        0.0
    };
    round_to(clamp_score(closeness * (1.0 - change_ratio), 0.0, 1.0), 2)
}

/// `0.6·fiberRichRatio + 0.4·healthyCalorieRatio`, on a 0-100 scale.
pub fn nutrition_score(meals: &[MealRecord]) -> f64 {
    if meals.is_empty() {
        return 0.0;
    }
    let n = meals.len() as f64;
    let fiber = meals.iter().filter(|m| m.fiber_rich).count() as f64 / n;
    let healthy = meals
        .iter()
        .filter(|m| m.calories <= HEALTHY_MAX_CALORIES)
        .count() as f64
        / n;
    clamp_score(
        (FIBER_WEIGHT * fiber + HEALTHY_CALORIE_WEIGHT * healthy) * 100.0,
        0.0,
        100.0,
    )
}

/// Share of medications flagged active, on a 0-100 scale.
pub fn compliance_score(medications: &[MedicationRecord]) -> f64 {
    if medications.is_empty() {
        return 0.0;
    }
    let active = medications.iter().filter(|m| m.is_active).count() as f64;
    clamp_score(active / medications.len() as f64 * 100.0, 0.0, 100.0)
}

pub fn group_meals_by_type(meals: &[MealRecord]) -> MealGroups {
    let mut groups = MealGroups::default();
    for meal in meals {
        if meal.spicy_level.unwrap_or(0) > SPICY_THRESHOLD {
            groups.spicy.push(meal.clone());
        }
        if meal.dairy {
            groups.dairy.push(meal.clone());
        }
        if meal.gluten {
            groups.gluten.push(meal.clone());
        }
        if meal.calories > 0 && meal.calories < HEALTHY_MAX_CALORIES && meal.fiber_rich {
            groups.healthy.push(meal.clone());
        }
        if meal.calories > LARGE_MEAL_CALORIES {
            groups.large.push(meal.clone());
        }
    }
    groups
}
