//! Result structures returned by the analytics service.
//!
//! Everything here is plain data: serializable to camelCase JSON and
//! rebuilt from scratch on every call.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use gut_tracker_client::{BowelMovementRecord, MealRecord, MedicationRecord, SymptomRecord};
use schemars::JsonSchema;
use serde::Serialize;

use crate::stats::{StatisticalSummary, TrendDirection, sanitize};

/// Replace every NaN or infinite float with 0.0, recursively.
pub trait Sanitize {
    fn sanitize(&mut self);
}

fn fix(x: &mut f64) {
    *x = sanitize(*x);
}

fn fix_all<'a>(values: impl IntoIterator<Item = &'a mut f64>) {
    values.into_iter().for_each(fix);
}

impl<T: Sanitize> Sanitize for Vec<T> {
    fn sanitize(&mut self) {
        self.iter_mut().for_each(Sanitize::sanitize);
    }
}

impl Sanitize for StatisticalSummary {
    fn sanitize(&mut self) {
        fix_all([
            &mut self.mean,
            &mut self.median,
            &mut self.std_dev,
            &mut self.min,
            &mut self.max,
            &mut self.p25,
            &mut self.p75,
        ]);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Calendar days covered, both ends included.
    pub days: usize,
}

/// One calendar day of records with its rollups.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregation {
    pub date: NaiveDate,
    pub bowel_movements: Vec<BowelMovementRecord>,
    pub meals: Vec<MealRecord>,
    pub symptoms: Vec<SymptomRecord>,
    /// Medications whose course started on this day.
    pub medications: Vec<MedicationRecord>,
    pub bowel_movement_count: usize,
    pub meal_count: usize,
    pub symptom_count: usize,
    pub spicy_meal_count: usize,
    pub dairy_meal_count: usize,
    pub gluten_meal_count: usize,
    pub fiber_rich_meal_count: usize,
    pub total_calories: u64,
    pub max_spicy_level: u8,
    pub avg_bristol: f64,
    pub avg_pain: f64,
    pub avg_strain: f64,
    pub avg_satisfaction: f64,
    pub avg_symptom_severity: f64,
    pub total_symptom_severity: f64,
}

impl DailyAggregation {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            bowel_movements: Vec::new(),
            meals: Vec::new(),
            symptoms: Vec::new(),
            medications: Vec::new(),
            bowel_movement_count: 0,
            meal_count: 0,
            symptom_count: 0,
            spicy_meal_count: 0,
            dairy_meal_count: 0,
            gluten_meal_count: 0,
            fiber_rich_meal_count: 0,
            total_calories: 0,
            max_spicy_level: 0,
            avg_bristol: 0.0,
            avg_pain: 0.0,
            avg_strain: 0.0,
            avg_satisfaction: 0.0,
            avg_symptom_severity: 0.0,
            total_symptom_severity: 0.0,
        }
    }
}

impl Sanitize for DailyAggregation {
    fn sanitize(&mut self) {
        fix_all([
            &mut self.avg_bristol,
            &mut self.avg_pain,
            &mut self.avg_strain,
            &mut self.avg_satisfaction,
            &mut self.avg_symptom_severity,
            &mut self.total_symptom_severity,
        ]);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BowelMovementSummary {
    pub total_count: usize,
    pub average_per_day: f64,
    /// 0 when there are no movements.
    pub most_common_bristol: u8,
    pub average_pain: f64,
    pub average_strain: f64,
    pub average_satisfaction: f64,
    pub regularity_score: f64,
    pub consistency_score: f64,
}

impl Sanitize for BowelMovementSummary {
    fn sanitize(&mut self) {
        fix_all([
            &mut self.average_per_day,
            &mut self.average_pain,
            &mut self.average_strain,
            &mut self.average_satisfaction,
            &mut self.regularity_score,
            &mut self.consistency_score,
        ]);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MealSummary {
    pub total_meals: usize,
    pub average_per_day: f64,
    pub total_calories: u64,
    pub average_calories: f64,
    pub fiber_rich_percent: f64,
    pub healthy_calorie_percent: f64,
    pub nutrition_score: f64,
}

impl Sanitize for MealSummary {
    fn sanitize(&mut self) {
        fix_all([
            &mut self.average_per_day,
            &mut self.average_calories,
            &mut self.fiber_rich_percent,
            &mut self.healthy_calorie_percent,
            &mut self.nutrition_score,
        ]);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymptomSummary {
    pub total_symptoms: usize,
    pub average_per_day: f64,
    pub average_severity: f64,
    /// Empty when no symptom carries a category.
    pub most_common_category: String,
    /// Empty when no symptom carries a type.
    pub most_common_type: String,
    pub trend_direction: TrendDirection,
}

impl Default for SymptomSummary {
    fn default() -> Self {
        Self {
            total_symptoms: 0,
            average_per_day: 0.0,
            average_severity: 0.0,
            most_common_category: String::new(),
            most_common_type: String::new(),
            trend_direction: TrendDirection::Stable,
        }
    }
}

impl Sanitize for SymptomSummary {
    fn sanitize(&mut self) {
        fix_all([&mut self.average_per_day, &mut self.average_severity]);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicationSummary {
    pub total_medications: usize,
    pub active_medications: usize,
    pub compliance_score: f64,
    /// Empty when no medication carries a category.
    pub most_common_category: String,
}

impl Sanitize for MedicationSummary {
    fn sanitize(&mut self) {
        fix(&mut self.compliance_score);
    }
}

/// Meals split by dietary trait. A meal can appear in several groups.
#[derive(Clone, Debug, Default, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MealGroups {
    pub spicy: Vec<MealRecord>,
    pub dairy: Vec<MealRecord>,
    pub gluten: Vec<MealRecord>,
    pub healthy: Vec<MealRecord>,
    pub large: Vec<MealRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthOverview {
    pub period: AnalysisPeriod,
    pub bowel_movements: BowelMovementSummary,
    pub meals: MealSummary,
    pub symptoms: SymptomSummary,
    pub medications: MedicationSummary,
    pub overall_health_score: f64,
    pub trend_direction: TrendDirection,
}

impl Sanitize for HealthOverview {
    fn sanitize(&mut self) {
        self.bowel_movements.sanitize();
        self.meals.sanitize();
        self.symptoms.sanitize();
        self.medications.sanitize();
        fix(&mut self.overall_health_score);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub factor: String,
    pub outcome: String,
    /// Pearson r, rounded to 3 places.
    pub strength: f64,
    pub confidence: f64,
    pub sample_size: usize,
    pub description: String,
}

impl Sanitize for Correlation {
    fn sanitize(&mut self) {
        fix_all([&mut self.strength, &mut self.confidence]);
    }
}

/// Before/after comparison around the start of a medication course.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicationEffect {
    pub medication: String,
    pub category: String,
    pub started_at: DateTime<Utc>,
    pub days_before: usize,
    pub days_after: usize,
    pub severity_before: f64,
    pub severity_after: f64,
    pub symptom_improvement_percent: f64,
    pub bowel_improvement_percent: f64,
    pub effectiveness_score: f64,
    pub confidence: f64,
}

impl Sanitize for MedicationEffect {
    fn sanitize(&mut self) {
        fix_all([
            &mut self.severity_before,
            &mut self.severity_after,
            &mut self.symptom_improvement_percent,
            &mut self.bowel_improvement_percent,
            &mut self.effectiveness_score,
            &mut self.confidence,
        ]);
    }
}

/// A meal trait that tends to be followed by symptoms.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymptomTrigger {
    pub trigger: String,
    pub occurrences: usize,
    /// Share of trait meals followed by a symptom within the window.
    pub followed_by_symptom_rate: f64,
    /// Same share for meals without the trait.
    pub baseline_rate: f64,
    pub average_severity: f64,
    pub confidence: f64,
}

impl Sanitize for SymptomTrigger {
    fn sanitize(&mut self) {
        fix_all([
            &mut self.followed_by_symptom_rate,
            &mut self.baseline_rate,
            &mut self.average_severity,
            &mut self.confidence,
        ]);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationAnalysis {
    pub period: AnalysisPeriod,
    pub meal_bowel: Vec<Correlation>,
    pub meal_symptom: Vec<Correlation>,
    pub medication_symptom: Vec<Correlation>,
    pub medication_effectiveness: Vec<MedicationEffect>,
    pub triggers: Vec<SymptomTrigger>,
}

impl CorrelationAnalysis {
    pub fn all(&self) -> impl Iterator<Item = &Correlation> {
        self.meal_bowel
            .iter()
            .chain(&self.meal_symptom)
            .chain(&self.medication_symptom)
    }
}

impl Sanitize for CorrelationAnalysis {
    fn sanitize(&mut self) {
        self.meal_bowel.sanitize();
        self.meal_symptom.sanitize();
        self.medication_symptom.sanitize();
        self.medication_effectiveness.sanitize();
        self.triggers.sanitize();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    BowelConsistency,
    BowelPain,
    BowelSatisfaction,
    SymptomSeverity,
    FiberIntake,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 5] = [
        Self::BowelConsistency,
        Self::BowelPain,
        Self::BowelSatisfaction,
        Self::SymptomSeverity,
        Self::FiberIntake,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::BowelConsistency => "bowel consistency",
            Self::BowelPain => "bowel movement pain",
            Self::BowelSatisfaction => "bowel movement satisfaction",
            Self::SymptomSeverity => "symptom severity",
            Self::FiberIntake => "fiber intake",
        }
    }

    /// Whether a rising series is good news.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Self::BowelPain | Self::SymptomSeverity)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataTrend {
    pub direction: TrendDirection,
    /// Raw change per day of the series; `direction` already accounts for
    /// whether lower values are better.
    pub slope: f64,
    pub confidence: f64,
    pub time_points: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl Sanitize for DataTrend {
    fn sanitize(&mut self) {
        fix(&mut self.slope);
        fix(&mut self.confidence);
        fix_all(self.values.iter_mut());
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrend {
    pub metric: TrendMetric,
    pub trend: DataTrend,
}

impl Sanitize for MetricTrend {
    fn sanitize(&mut self) {
        self.trend.sanitize();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub period: AnalysisPeriod,
    pub metrics: Vec<MetricTrend>,
    pub overall_trend: TrendDirection,
}

impl TrendAnalysis {
    pub fn direction_of(&self, metric: TrendMetric) -> TrendDirection {
        self.metrics
            .iter()
            .find(|m| m.metric == metric)
            .map_or(TrendDirection::Stable, |m| m.trend.direction)
    }
}

impl Sanitize for TrendAnalysis {
    fn sanitize(&mut self) {
        self.metrics.sanitize();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EatingPattern {
    /// Meal count by hour of day (0-23) in the reference zone.
    pub meal_timing: BTreeMap<u32, usize>,
    /// Meal count by morning/afternoon/evening/night.
    pub time_slots: BTreeMap<String, usize>,
    /// Cuisines ordered by frequency, then name.
    pub preferred_cuisines: Vec<String>,
    pub average_meals_per_day: f64,
    pub large_meal_percent: f64,
}

impl Sanitize for EatingPattern {
    fn sanitize(&mut self) {
        fix_all([&mut self.average_meals_per_day, &mut self.large_meal_percent]);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BowelPattern {
    /// Movements per day.
    pub frequency: f64,
    pub consistency_score: f64,
    pub regularity_score: f64,
    /// Pearson r between a fiber-rich preceding meal and movement consistency.
    pub meal_correlation: f64,
    pub average_hours_after_meal: f64,
    pub bristol_distribution: BTreeMap<u8, usize>,
    pub timing: BTreeMap<u32, usize>,
}

impl Sanitize for BowelPattern {
    fn sanitize(&mut self) {
        fix_all([
            &mut self.frequency,
            &mut self.consistency_score,
            &mut self.regularity_score,
            &mut self.meal_correlation,
            &mut self.average_hours_after_meal,
        ]);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymptomPattern {
    pub frequency_by_type: BTreeMap<String, usize>,
    pub severity_by_type: BTreeMap<String, f64>,
    pub frequency_by_category: BTreeMap<String, usize>,
    pub severity_by_category: BTreeMap<String, f64>,
    pub severity_summary: StatisticalSummary,
    /// Days whose total severity is an IQR outlier.
    pub outlier_days: Vec<NaiveDate>,
}

impl Sanitize for SymptomPattern {
    fn sanitize(&mut self) {
        fix_all(self.severity_by_type.values_mut());
        fix_all(self.severity_by_category.values_mut());
        self.severity_summary.sanitize();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DietaryHabit {
    pub habit: String,
    pub frequency: usize,
    /// Share of all meals, 0-100.
    pub percent_of_meals: f64,
}

impl Sanitize for DietaryHabit {
    fn sanitize(&mut self) {
        fix(&mut self.percent_of_meals);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LifestylePattern {
    pub dietary_habits: Vec<DietaryHabit>,
    pub bowel_regularity: f64,
    pub symptom_triggers: Vec<SymptomTrigger>,
}

impl Sanitize for LifestylePattern {
    fn sanitize(&mut self) {
        self.dietary_habits.sanitize();
        fix(&mut self.bowel_regularity);
        self.symptom_triggers.sanitize();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPatterns {
    pub period: AnalysisPeriod,
    pub eating: EatingPattern,
    pub bowel: BowelPattern,
    pub symptom: SymptomPattern,
    pub lifestyle: LifestylePattern,
}

impl Sanitize for BehaviorPatterns {
    fn sanitize(&mut self) {
        self.eating.sanitize();
        self.bowel.sanitize();
        self.symptom.sanitize();
        self.lifestyle.sanitize();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactor {
    pub name: String,
    /// Distance from the neutral score of 50, in [-100, 100].
    pub impact: f64,
    pub weight: f64,
    pub description: String,
    pub trend: TrendDirection,
}

impl Sanitize for ScoreFactor {
    fn sanitize(&mut self) {
        fix_all([&mut self.impact, &mut self.weight]);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    pub overall_score: f64,
    pub component_scores: BTreeMap<String, f64>,
    pub factors: Vec<ScoreFactor>,
    pub trend: TrendDirection,
    pub last_updated: DateTime<Utc>,
}

impl Sanitize for HealthScore {
    fn sanitize(&mut self) {
        fix(&mut self.overall_score);
        fix_all(self.component_scores.values_mut());
        self.factors.sanitize();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightType {
    Dietary,
    Lifestyle,
    Medical,
    Behavioral,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dietary => "DIETARY",
            Self::Lifestyle => "LIFESTYLE",
            Self::Medical => "MEDICAL",
            Self::Behavioral => "BEHAVIORAL",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

pub type AlertLevel = Priority;

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub category: String,
    pub message: String,
    pub evidence: Vec<String>,
    pub priority: Priority,
    pub confidence: f64,
    pub action_items: Vec<String>,
}

impl Sanitize for Insight {
    fn sanitize(&mut self) {
        fix(&mut self.confidence);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthInsights {
    pub period: AnalysisPeriod,
    /// Highest priority first, then highest confidence.
    pub insights: Vec<Insight>,
    pub key_findings: Vec<String>,
    pub risk_factors: Vec<String>,
    pub positive_factors: Vec<String>,
    pub alert_level: AlertLevel,
    pub confidence_level: f64,
}

impl Sanitize for HealthInsights {
    fn sanitize(&mut self) {
        self.insights.sanitize();
        fix(&mut self.confidence_level);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub recommendation_type: InsightType,
    pub category: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub action_steps: Vec<String>,
    pub expected_impact: String,
    pub timeline: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Sanitize for Recommendation {
    fn sanitize(&mut self) {
        fix(&mut self.confidence);
    }
}
