//! Behavioral patterns derived from the raw records and daily rollups.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use gut_tracker_client::{BowelMovementRecord, MealRecord, SymptomRecord};

use crate::aggregator::{
    DataAggregator, LARGE_MEAL_CALORIES, SPICY_THRESHOLD, bristol_closeness, group_meals_by_type,
};
use crate::stats::{
    confidence_from_sample_size, find_outliers, mean, pearson_correlation, round_to,
    summary_statistics,
};
use crate::types::{
    AnalysisPeriod, BehaviorPatterns, BowelPattern, DailyAggregation, DietaryHabit, EatingPattern,
    LifestylePattern, SymptomPattern, SymptomTrigger,
};

/// Meals from this local hour on count as late eating.
pub const LATE_EATING_HOUR: u32 = 20;
/// How long after a meal a symptom or movement is attributed to it.
pub const MEAL_EFFECT_WINDOW_HOURS: i64 = 24;
const MIN_TRIGGER_OCCURRENCES: usize = 2;
const MIN_CORRELATION_PAIRS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MealTrait {
    Dairy,
    Gluten,
    Spicy,
    Large,
    Late,
}

impl MealTrait {
    const ALL: [MealTrait; 5] = [
        Self::Dairy,
        Self::Gluten,
        Self::Spicy,
        Self::Large,
        Self::Late,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Dairy => "dairy",
            Self::Gluten => "gluten",
            Self::Spicy => "spicy_food",
            Self::Large => "large_meal",
            Self::Late => "late_eating",
        }
    }

    fn matches(&self, aggregator: &DataAggregator, meal: &MealRecord) -> bool {
        match self {
            Self::Dairy => meal.dairy,
            Self::Gluten => meal.gluten,
            Self::Spicy => meal.spicy_level.unwrap_or(0) > SPICY_THRESHOLD,
            Self::Large => meal.calories > LARGE_MEAL_CALORIES,
            Self::Late => aggregator.local_hour(meal.meal_time) >= LATE_EATING_HOUR,
        }
    }
}

/// Local time-of-day bucket for an hour.
pub fn time_slot(hour: u32) -> &'static str {
    match hour {
        6..=11 => "morning",
        12..=16 => "afternoon",
        17..=21 => "evening",
        _ => "night",
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PatternAnalyzer {
    aggregator: DataAggregator,
}

impl PatternAnalyzer {
    pub fn new(aggregator: DataAggregator) -> Self {
        Self { aggregator }
    }

    pub fn analyze(
        &self,
        period: AnalysisPeriod,
        bowel_movements: &[BowelMovementRecord],
        meals: &[MealRecord],
        symptoms: &[SymptomRecord],
        daily: &[DailyAggregation],
    ) -> BehaviorPatterns {
        BehaviorPatterns {
            period,
            eating: self.eating_pattern(meals),
            bowel: self.bowel_pattern(bowel_movements, meals),
            symptom: self.symptom_pattern(symptoms, daily),
            lifestyle: self.lifestyle_pattern(bowel_movements, meals, symptoms),
        }
    }

    pub fn eating_pattern(&self, meals: &[MealRecord]) -> EatingPattern {
        let mut meal_timing: BTreeMap<u32, usize> = BTreeMap::new();
        let mut time_slots: BTreeMap<String, usize> = BTreeMap::new();
        let mut cuisines: BTreeMap<String, usize> = BTreeMap::new();
        for meal in meals {
            let hour = self.aggregator.local_hour(meal.meal_time);
            *meal_timing.entry(hour).or_default() += 1;
            *time_slots.entry(time_slot(hour).to_string()).or_default() += 1;
            if let Some(cuisine) = meal.cuisine.as_deref().map(str::trim).filter(|c| !c.is_empty())
            {
                *cuisines.entry(cuisine.to_lowercase()).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = cuisines.into_iter().collect();
        // stable sort keeps the alphabetical order of equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let large = meals
            .iter()
            .filter(|m| m.calories > LARGE_MEAL_CALORIES)
            .count();
        EatingPattern {
            meal_timing,
            time_slots,
            preferred_cuisines: ranked.into_iter().map(|(c, _)| c).collect(),
            average_meals_per_day: self.aggregator.aggregate_meals(meals).average_per_day,
            large_meal_percent: if meals.is_empty() {
                0.0
            } else {
                large as f64 / meals.len() as f64 * 100.0
            },
        }
    }

    pub fn bowel_pattern(
        &self,
        bowel_movements: &[BowelMovementRecord],
        meals: &[MealRecord],
    ) -> BowelPattern {
        let summary = self.aggregator.aggregate_bowel_movements(bowel_movements);

        let mut bristol_distribution: BTreeMap<u8, usize> = BTreeMap::new();
        let mut timing: BTreeMap<u32, usize> = BTreeMap::new();
        for bm in bowel_movements {
            *bristol_distribution.entry(bm.bristol_type).or_default() += 1;
            *timing
                .entry(self.aggregator.local_hour(bm.recorded_at))
                .or_default() += 1;
        }

        let mut sorted_meals: Vec<&MealRecord> = meals.iter().collect();
        sorted_meals.sort_by_key(|m| m.meal_time);
        let window = Duration::hours(MEAL_EFFECT_WINDOW_HOURS);

        let (mut fiber, mut closeness, mut gaps) = (Vec::new(), Vec::new(), Vec::new());
        for bm in bowel_movements {
            let idx = sorted_meals.partition_point(|m| m.meal_time <= bm.recorded_at);
            let Some(prev) = idx.checked_sub(1).map(|i| sorted_meals[i]) else {
                continue;
            };
            let gap = bm.recorded_at - prev.meal_time;
            if gap > window {
                continue;
            }
            fiber.push(if prev.fiber_rich { 1.0 } else { 0.0 });
            closeness.push(bristol_closeness(bm.bristol_type));
            gaps.push(gap.num_minutes() as f64 / 60.0);
        }
        let meal_correlation = if fiber.len() >= MIN_CORRELATION_PAIRS {
            round_to(pearson_correlation(&fiber, &closeness), 3)
        } else {
            0.0
        };

        BowelPattern {
            frequency: summary.average_per_day,
            consistency_score: summary.consistency_score,
            regularity_score: summary.regularity_score,
            meal_correlation,
            average_hours_after_meal: round_to(mean(&gaps), 1),
            bristol_distribution,
            timing,
        }
    }

    pub fn symptom_pattern(
        &self,
        symptoms: &[SymptomRecord],
        daily: &[DailyAggregation],
    ) -> SymptomPattern {
        let mut by_type: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut by_category: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for s in symptoms {
            let severity = f64::from(s.severity);
            if let Some(t) = s.symptom_type {
                by_type.entry(t.as_str().to_string()).or_default().push(severity);
            }
            if let Some(c) = s.category {
                by_category
                    .entry(c.as_str().to_string())
                    .or_default()
                    .push(severity);
            }
        }
        let (frequency_by_type, severity_by_type) = split_counts(by_type);
        let (frequency_by_category, severity_by_category) = split_counts(by_category);

        let severities: Vec<f64> = symptoms.iter().map(|s| f64::from(s.severity)).collect();

        let symptom_days: Vec<&DailyAggregation> =
            daily.iter().filter(|d| d.symptom_count > 0).collect();
        let totals: Vec<f64> = symptom_days
            .iter()
            .map(|d| d.total_symptom_severity)
            .collect();
        let outliers = find_outliers(&totals);
        let outlier_days: Vec<NaiveDate> = symptom_days
            .iter()
            .filter(|d| outliers.contains(&d.total_symptom_severity))
            .map(|d| d.date)
            .collect();

        SymptomPattern {
            frequency_by_type,
            severity_by_type,
            frequency_by_category,
            severity_by_category,
            severity_summary: summary_statistics(&severities),
            outlier_days,
        }
    }

    pub fn lifestyle_pattern(
        &self,
        bowel_movements: &[BowelMovementRecord],
        meals: &[MealRecord],
        symptoms: &[SymptomRecord],
    ) -> LifestylePattern {
        LifestylePattern {
            dietary_habits: self.dietary_habits(meals),
            bowel_regularity: self
                .aggregator
                .aggregate_bowel_movements(bowel_movements)
                .regularity_score,
            symptom_triggers: self.symptom_triggers(meals, symptoms),
        }
    }

    fn dietary_habits(&self, meals: &[MealRecord]) -> Vec<DietaryHabit> {
        if meals.is_empty() {
            return Vec::new();
        }
        let groups = group_meals_by_type(meals);
        let late = meals
            .iter()
            .filter(|m| self.aggregator.local_hour(m.meal_time) >= LATE_EATING_HOUR)
            .count();
        let total = meals.len() as f64;

        let mut habits: Vec<DietaryHabit> = [
            ("spicy meals", groups.spicy.len()),
            ("dairy meals", groups.dairy.len()),
            ("gluten meals", groups.gluten.len()),
            ("healthy fiber-rich meals", groups.healthy.len()),
            ("large meals", groups.large.len()),
            ("late eating", late),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(habit, n)| DietaryHabit {
            habit: habit.to_string(),
            frequency: n,
            percent_of_meals: round_to(n as f64 / total * 100.0, 1),
        })
        .collect();
        habits.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.habit.cmp(&b.habit)));
        habits
    }

    /// Meal traits followed by symptoms more often than meals without them.
    pub fn symptom_triggers(
        &self,
        meals: &[MealRecord],
        symptoms: &[SymptomRecord],
    ) -> Vec<SymptomTrigger> {
        if meals.is_empty() || symptoms.is_empty() {
            return Vec::new();
        }
        let window = Duration::hours(MEAL_EFFECT_WINDOW_HOURS);
        // severities of the symptoms that follow each meal
        let followers: Vec<Vec<f64>> = meals
            .iter()
            .map(|m| following_severities(m.meal_time, symptoms, window))
            .collect();

        let mut triggers: Vec<SymptomTrigger> = MealTrait::ALL
            .iter()
            .filter_map(|meal_trait| {
                let (with, without): (Vec<_>, Vec<_>) = meals
                    .iter()
                    .zip(&followers)
                    .partition(|(meal, _)| meal_trait.matches(&self.aggregator, meal));
                if with.len() < MIN_TRIGGER_OCCURRENCES {
                    return None;
                }
                let rate = followed_rate(&with);
                let baseline = followed_rate(&without);
                if rate <= baseline {
                    return None;
                }
                let severities: Vec<f64> = with
                    .iter()
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                Some(SymptomTrigger {
                    trigger: meal_trait.name().to_string(),
                    occurrences: with.len(),
                    followed_by_symptom_rate: round_to(rate, 2),
                    baseline_rate: round_to(baseline, 2),
                    average_severity: round_to(mean(&severities), 1),
                    confidence: round_to(rate * confidence_from_sample_size(with.len()), 2),
                })
            })
            .collect();
        triggers.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.trigger.cmp(&b.trigger))
        });
        triggers
    }
}

fn split_counts(groups: BTreeMap<String, Vec<f64>>) -> (BTreeMap<String, usize>, BTreeMap<String, f64>) {
    let mut counts = BTreeMap::new();
    let mut severities = BTreeMap::new();
    for (key, values) in groups {
        counts.insert(key.clone(), values.len());
        severities.insert(key, round_to(mean(&values), 1));
    }
    (counts, severities)
}

fn following_severities(
    meal_time: DateTime<Utc>,
    symptoms: &[SymptomRecord],
    window: Duration,
) -> Vec<f64> {
    symptoms
        .iter()
        .filter(|s| s.recorded_at > meal_time && s.recorded_at - meal_time <= window)
        .map(|s| f64::from(s.severity))
        .collect()
}

fn followed_rate(meals: &[(&MealRecord, &Vec<f64>)]) -> f64 {
    if meals.is_empty() {
        return 0.0;
    }
    let followed = meals.iter().filter(|(_, f)| !f.is_empty()).count();
    followed as f64 / meals.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bowel, meal, symptom, ts};
    use chrono::{Offset, Utc};
    use gut_tracker_client::{SymptomCategory, SymptomType};

    fn analyzer() -> PatternAnalyzer {
        PatternAnalyzer::new(DataAggregator::new(Utc.fix(), 0.05))
    }

    #[test]
    fn slots() {
        assert_eq!(time_slot(6), "morning");
        assert_eq!(time_slot(12), "afternoon");
        assert_eq!(time_slot(17), "evening");
        assert_eq!(time_slot(22), "night");
        assert_eq!(time_slot(3), "night");
    }

    #[test]
    fn eating_histogram_and_cuisines() {
        let mut a = meal("2025-03-01T08:15:00Z", 400, true);
        a.cuisine = Some("Italian".into());
        let mut b = meal("2025-03-01T08:45:00Z", 900, false);
        b.cuisine = Some("thai".into());
        let mut c = meal("2025-03-02T19:00:00Z", 500, false);
        c.cuisine = Some("italian ".into());
        let p = analyzer().eating_pattern(&[a, b, c]);
        assert_eq!(p.meal_timing[&8], 2);
        assert_eq!(p.meal_timing[&19], 1);
        assert_eq!(p.time_slots["morning"], 2);
        assert_eq!(p.time_slots["evening"], 1);
        assert_eq!(p.preferred_cuisines, vec!["italian", "thai"]);
        assert!((p.large_meal_percent - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs_produce_neutral_patterns() {
        let p = analyzer().analyze(
            AnalysisPeriod {
                start: ts("2025-03-01T00:00:00Z"),
                end: ts("2025-03-02T00:00:00Z"),
                days: 2,
            },
            &[],
            &[],
            &[],
            &[],
        );
        assert!(p.eating.meal_timing.is_empty());
        assert_eq!(p.eating.average_meals_per_day, 0.0);
        assert_eq!(p.bowel.meal_correlation, 0.0);
        assert_eq!(p.bowel.average_hours_after_meal, 0.0);
        assert_eq!(p.symptom.severity_summary.count, 0);
        assert!(p.lifestyle.dietary_habits.is_empty());
        assert!(p.lifestyle.symptom_triggers.is_empty());
    }

    #[test]
    fn bowel_meal_correlation_tracks_fiber() {
        let meals = [
            meal("2025-03-01T08:00:00Z", 400, true),
            meal("2025-03-02T08:00:00Z", 400, false),
            meal("2025-03-03T08:00:00Z", 400, true),
            meal("2025-03-04T08:00:00Z", 400, false),
        ];
        let bms = [
            bowel("2025-03-01T10:00:00Z", 4),
            bowel("2025-03-02T10:00:00Z", 1),
            bowel("2025-03-03T10:00:00Z", 4),
            bowel("2025-03-04T10:00:00Z", 1),
        ];
        let p = analyzer().bowel_pattern(&bms, &meals);
        assert_eq!(p.meal_correlation, 1.0);
        assert_eq!(p.average_hours_after_meal, 2.0);
        assert_eq!(p.bristol_distribution[&4], 2);
        assert_eq!(p.timing[&10], 4);
    }

    #[test]
    fn movement_without_recent_meal_is_ignored() {
        let meals = [meal("2025-03-01T08:00:00Z", 400, true)];
        let bms = [bowel("2025-03-03T08:00:00Z", 4)];
        let p = analyzer().bowel_pattern(&bms, &meals);
        assert_eq!(p.average_hours_after_meal, 0.0);
    }

    #[test]
    fn symptom_maps_and_outlier_days() {
        let mut symptoms = Vec::new();
        for day in 1..=6 {
            let mut s = symptom(&format!("2025-03-0{day}T09:00:00Z"), 2);
            s.symptom_type = Some(SymptomType::Gas);
            s.category = Some(SymptomCategory::Digestive);
            symptoms.push(s);
        }
        let mut spike = symptom("2025-03-06T18:00:00Z", 10);
        spike.symptom_type = Some(SymptomType::Cramps);
        symptoms.push(spike);

        let agg = DataAggregator::new(Utc.fix(), 0.05);
        let daily = agg.aggregate_daily(
            &[],
            &[],
            &symptoms,
            &[],
            ts("2025-03-01T00:00:00Z"),
            ts("2025-03-07T00:00:00Z"),
        );
        let p = analyzer().symptom_pattern(&symptoms, &daily);
        assert_eq!(p.frequency_by_type["GAS"], 6);
        assert_eq!(p.severity_by_type["CRAMPS"], 10.0);
        assert_eq!(p.frequency_by_category["DIGESTIVE"], 6);
        assert_eq!(p.severity_summary.count, 7);
        assert_eq!(p.outlier_days.len(), 1);
        assert_eq!(p.outlier_days[0].to_string(), "2025-03-06");
    }

    #[test]
    fn dairy_flagged_as_trigger() {
        let mut meals = Vec::new();
        let mut symptoms = Vec::new();
        for day in 1..=4 {
            let mut dairy = meal(&format!("2025-03-0{day}T08:00:00Z"), 400, false);
            dairy.dairy = true;
            meals.push(dairy);
            symptoms.push(symptom(&format!("2025-03-0{day}T11:00:00Z"), 6));
        }
        // plain meals well clear of any symptom
        for day in 5..=8 {
            meals.push(meal(&format!("2025-03-0{day}T08:00:00Z"), 400, false));
        }
        let triggers = analyzer().symptom_triggers(&meals, &symptoms);
        assert_eq!(triggers.len(), 1);
        let t = &triggers[0];
        assert_eq!(t.trigger, "dairy");
        assert_eq!(t.occurrences, 4);
        assert_eq!(t.followed_by_symptom_rate, 1.0);
        assert_eq!(t.baseline_rate, 0.0);
        assert_eq!(t.average_severity, 6.0);
        assert_eq!(t.confidence, 0.3);
    }

    #[test]
    fn habits_sorted_by_frequency() {
        let mut late = meal("2025-03-01T21:00:00Z", 900, false);
        late.dairy = true;
        let mut late2 = meal("2025-03-02T22:00:00Z", 300, true);
        late2.dairy = true;
        let p = analyzer().lifestyle_pattern(&[], &[late, late2], &[]);
        assert_eq!(p.dietary_habits[0].habit, "dairy meals");
        assert_eq!(p.dietary_habits[0].percent_of_meals, 100.0);
        assert_eq!(p.dietary_habits[1].habit, "late eating");
        assert!(p.dietary_habits.iter().any(|h| h.habit == "large meals" && h.frequency == 1));
        assert_eq!(p.bowel_regularity, 0.0);
    }
}
