//! Rule-based insights and the recommendations derived from them.

use chrono::{DateTime, Duration, Utc};
use gut_tracker_client::BowelMovementRecord;
use uuid::Uuid;

use crate::stats::{TrendDirection, clamp_score, confidence_from_sample_size};
use crate::types::{
    AlertLevel, AnalysisPeriod, BowelMovementSummary, CorrelationAnalysis, HealthInsights,
    Insight, InsightType, MealSummary, Priority, Recommendation, SymptomPattern, SymptomSummary,
    TrendAnalysis,
};

const MIN_MOVEMENTS_FOR_STOOL_PATTERN: usize = 7;
const MIN_MEALS_FOR_FIBER_ADVICE: usize = 5;
const LOW_FIBER_PERCENT: f64 = 40.0;
const IRREGULAR_BELOW: f64 = 0.6;
const PAINFUL_ABOVE: f64 = 5.0;
const CORRELATION_MIN_STRENGTH: f64 = 0.4;
const CORRELATION_HIGH_STRENGTH: f64 = 0.6;
const MIN_CONFIDENCE: f64 = 0.5;
const TRIGGER_HIGH_CONFIDENCE: f64 = 0.7;
const SEVERE_ABOVE: f64 = 8.0;
const LOW_OVERALL_SCORE: f64 = 60.0;
const ALERT_BELOW_SCORE: f64 = 50.0;

/// Everything the rules look at, computed once per request.
#[derive(Clone, Copy, Debug)]
pub struct InsightInputs<'a> {
    pub bowel: &'a BowelMovementSummary,
    pub meals: &'a MealSummary,
    pub symptoms: &'a SymptomSummary,
    pub bowel_movements: &'a [BowelMovementRecord],
    pub correlations: &'a CorrelationAnalysis,
    pub trends: &'a TrendAnalysis,
    pub symptom_pattern: &'a SymptomPattern,
    pub overall_score: f64,
    pub record_count: usize,
}

fn insight(
    insight_type: InsightType,
    category: &str,
    message: String,
    evidence: Vec<String>,
    priority: Priority,
    confidence: f64,
    action_items: &[&str],
) -> Insight {
    Insight {
        insight_type,
        category: category.to_string(),
        message,
        evidence,
        priority,
        confidence,
        action_items: action_items.iter().map(|s| s.to_string()).collect(),
    }
}

fn stool_form_insights(inputs: &InsightInputs<'_>, out: &mut Vec<Insight>) {
    let n = inputs.bowel_movements.len();
    if n < MIN_MOVEMENTS_FOR_STOOL_PATTERN {
        return;
    }
    let share = |range: std::ops::RangeInclusive<u8>| {
        inputs
            .bowel_movements
            .iter()
            .filter(|bm| range.contains(&bm.bristol_type))
            .count() as f64
            / n as f64
    };
    let hard = share(1..=2);
    let loose = share(6..=7);
    let confidence = confidence_from_sample_size(n);
    if hard > 0.5 {
        out.push(insight(
            InsightType::Medical,
            "bowel_health",
            "Stools are frequently hard, suggesting constipation".to_string(),
            vec![format!("{:.0}% of {n} movements were Bristol type 1-2", hard * 100.0)],
            Priority::High,
            confidence,
            &[
                "Increase water intake",
                "Add fiber-rich foods gradually",
                "Stay physically active",
            ],
        ));
    } else if loose > 0.5 {
        out.push(insight(
            InsightType::Medical,
            "bowel_health",
            "Stools are frequently loose, suggesting diarrhea".to_string(),
            vec![format!("{:.0}% of {n} movements were Bristol type 6-7", loose * 100.0)],
            Priority::High,
            confidence,
            &[
                "Stay hydrated and replace electrolytes",
                "Note foods eaten before loose stools",
                "Consult a healthcare provider if it persists",
            ],
        ));
    }
}

fn summary_insights(inputs: &InsightInputs<'_>, out: &mut Vec<Insight>) {
    let meals = inputs.meals;
    if meals.total_meals >= MIN_MEALS_FOR_FIBER_ADVICE && meals.fiber_rich_percent < LOW_FIBER_PERCENT
    {
        out.push(insight(
            InsightType::Dietary,
            "nutrition",
            "Consider increasing fiber intake".to_string(),
            vec![format!(
                "Only {:.0}% of {} meals were fiber-rich",
                meals.fiber_rich_percent, meals.total_meals
            )],
            Priority::Medium,
            confidence_from_sample_size(meals.total_meals),
            &[
                "Add vegetables, legumes or whole grains to one meal a day",
                "Increase fiber gradually to avoid bloating",
            ],
        ));
    }

    let bowel = inputs.bowel;
    if bowel.total_count >= 3 && bowel.regularity_score < IRREGULAR_BELOW {
        out.push(insight(
            InsightType::Lifestyle,
            "bowel_health",
            "Establish a consistent bathroom routine".to_string(),
            vec![format!("Regularity score of {:.2}", bowel.regularity_score)],
            Priority::High,
            confidence_from_sample_size(bowel.total_count),
            &[
                "Try a bathroom visit at the same time each day",
                "Keep meal times consistent",
            ],
        ));
    }
    if bowel.total_count > 0 && bowel.average_pain > PAINFUL_ABOVE {
        out.push(insight(
            InsightType::Medical,
            "bowel_health",
            "Bowel movements are frequently painful".to_string(),
            vec![format!("Average pain of {:.1}/10", bowel.average_pain)],
            Priority::High,
            confidence_from_sample_size(bowel.total_count),
            &["Discuss persistent pain with a healthcare provider"],
        ));
    }
}

fn correlation_insights(inputs: &InsightInputs<'_>, out: &mut Vec<Insight>) {
    let correlations = inputs.correlations;
    let dietary = correlations
        .meal_bowel
        .iter()
        .chain(&correlations.meal_symptom)
        .map(|c| (InsightType::Dietary, c));
    let medical = correlations
        .medication_symptom
        .iter()
        .map(|c| (InsightType::Medical, c));

    for (insight_type, c) in dietary.chain(medical) {
        if c.strength.abs() < CORRELATION_MIN_STRENGTH || c.confidence < MIN_CONFIDENCE {
            continue;
        }
        let priority = if c.strength.abs() >= CORRELATION_HIGH_STRENGTH {
            Priority::High
        } else {
            Priority::Medium
        };
        out.push(Insight {
            insight_type,
            category: "correlation".to_string(),
            message: format!("{} appears linked to {}", c.factor, c.outcome.to_lowercase()),
            evidence: vec![c.description.clone()],
            priority,
            confidence: c.confidence,
            action_items: vec![format!(
                "Track how changes in {} affect {}",
                c.factor.to_lowercase(),
                c.outcome.to_lowercase()
            )],
        });
    }

    for trigger in &correlations.triggers {
        if trigger.confidence < MIN_CONFIDENCE {
            continue;
        }
        let readable = trigger.trigger.replace('_', " ");
        let priority = if trigger.confidence >= TRIGGER_HIGH_CONFIDENCE {
            Priority::High
        } else {
            Priority::Medium
        };
        out.push(Insight {
            insight_type: InsightType::Dietary,
            category: "triggers".to_string(),
            message: format!("{} may trigger symptoms", capitalize(&readable)),
            evidence: vec![format!(
                "{:.0}% of {} {readable} meals were followed by symptoms within 24h, versus {:.0}% otherwise",
                trigger.followed_by_symptom_rate * 100.0,
                trigger.occurrences,
                trigger.baseline_rate * 100.0
            )],
            priority,
            confidence: trigger.confidence,
            action_items: vec![format!("Try reducing {readable} for two weeks and compare")],
        });
    }
}

fn trend_insights(inputs: &InsightInputs<'_>, out: &mut Vec<Insight>) {
    for metric in &inputs.trends.metrics {
        let trend = &metric.trend;
        if trend.confidence < MIN_CONFIDENCE {
            continue;
        }
        let evidence = vec![format!(
            "Slope of {:.4} per day over {} data points",
            trend.slope,
            trend.values.len()
        )];
        let label = capitalize(metric.metric.label());
        match trend.direction {
            TrendDirection::Declining => out.push(insight(
                InsightType::Behavioral,
                "trends",
                format!("{label} is getting worse"),
                evidence,
                Priority::Medium,
                trend.confidence,
                &["Review recent changes in diet, sleep or stress"],
            )),
            TrendDirection::Improving => out.push(insight(
                InsightType::Behavioral,
                "trends",
                format!("{label} is improving"),
                evidence,
                Priority::Low,
                trend.confidence,
                &["Keep up the current routine"],
            )),
            TrendDirection::Stable => {}
        }
    }
}

fn outlier_insights(inputs: &InsightInputs<'_>, out: &mut Vec<Insight>) {
    let pattern = inputs.symptom_pattern;
    if pattern.outlier_days.is_empty() {
        return;
    }
    let days: Vec<String> = pattern
        .outlier_days
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    out.push(insight(
        InsightType::Medical,
        "symptoms",
        "Some days show unusually severe symptoms".to_string(),
        vec![format!("Outlier days: {}", days.join(", "))],
        Priority::Medium,
        confidence_from_sample_size(pattern.severity_summary.count),
        &["Review meals and activities on those days"],
    ));
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Highest priority first, then highest confidence, then message.
pub fn rank(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.message.cmp(&b.message))
    });
}

pub fn generate_insights(inputs: &InsightInputs<'_>) -> Vec<Insight> {
    let mut insights = Vec::new();
    stool_form_insights(inputs, &mut insights);
    summary_insights(inputs, &mut insights);
    correlation_insights(inputs, &mut insights);
    trend_insights(inputs, &mut insights);
    outlier_insights(inputs, &mut insights);
    rank(&mut insights);
    insights
}

fn key_findings(inputs: &InsightInputs<'_>) -> Vec<String> {
    let mut findings = Vec::new();
    if inputs.bowel.total_count > 0 {
        findings.push(format!(
            "Average of {:.1} bowel movements per day",
            inputs.bowel.average_per_day
        ));
        findings.push(format!(
            "Most common Bristol type: {}",
            inputs.bowel.most_common_bristol
        ));
    }
    if inputs.meals.total_meals > 0 {
        findings.push(format!(
            "{:.0}% of meals were fiber-rich",
            inputs.meals.fiber_rich_percent
        ));
    }
    if inputs.symptoms.total_symptoms > 0 {
        findings.push(format!(
            "Average symptom severity of {:.1}/10",
            inputs.symptoms.average_severity
        ));
    }
    findings
}

fn positive_factors(inputs: &InsightInputs<'_>) -> Vec<String> {
    let mut factors = Vec::new();
    if inputs.bowel.total_count > 0 && inputs.bowel.consistency_score >= 0.8 {
        factors.push("Stool consistency is close to ideal".to_string());
    }
    if inputs.bowel.total_count >= 2 && inputs.bowel.regularity_score >= 0.8 {
        factors.push("Bowel movements follow a regular rhythm".to_string());
    }
    if inputs.meals.total_meals > 0 && inputs.meals.fiber_rich_percent >= 60.0 {
        factors.push("Fiber intake is good".to_string());
    }
    for metric in &inputs.trends.metrics {
        if metric.trend.direction == TrendDirection::Improving {
            factors.push(format!("{} is improving", capitalize(metric.metric.label())));
        }
    }
    factors
}

fn alert_level(inputs: &InsightInputs<'_>, risk_count: usize) -> AlertLevel {
    let severe_pain = inputs.bowel.total_count > 0 && inputs.bowel.average_pain > SEVERE_ABOVE;
    let severe_symptoms =
        inputs.symptoms.total_symptoms > 0 && inputs.symptoms.average_severity > SEVERE_ABOVE;
    if severe_pain || severe_symptoms {
        Priority::High
    } else if risk_count > 2 || inputs.overall_score < ALERT_BELOW_SCORE {
        Priority::Medium
    } else {
        Priority::Low
    }
}

pub fn health_insights(period: AnalysisPeriod, inputs: &InsightInputs<'_>) -> HealthInsights {
    let insights = generate_insights(inputs);
    let risk_factors: Vec<String> = insights
        .iter()
        .filter(|i| i.priority == Priority::High)
        .map(|i| i.message.clone())
        .collect();
    HealthInsights {
        period,
        key_findings: key_findings(inputs),
        positive_factors: positive_factors(inputs),
        alert_level: alert_level(inputs, risk_factors.len()),
        risk_factors,
        confidence_level: clamp_score(inputs.record_count as f64 / 100.0, 0.3, 0.9),
        insights,
    }
}

fn expected_impact(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "Significant improvement in digestive comfort",
        Priority::Medium => "Moderate improvement in digestive health",
        Priority::Low => "Helps maintain current progress",
    }
}

fn timeline(insight_type: InsightType) -> &'static str {
    match insight_type {
        InsightType::Dietary => "2-4 weeks",
        InsightType::Lifestyle => "1-2 weeks",
        InsightType::Medical => "Consult a provider within 1-2 weeks",
        InsightType::Behavioral => "3-4 weeks",
    }
}

/// How long a recommendation stays relevant.
pub fn expiry(priority: Priority) -> Duration {
    match priority {
        Priority::High => Duration::weeks(4),
        Priority::Medium => Duration::weeks(8),
        Priority::Low => Duration::weeks(12),
    }
}

fn recommendation(insight: &Insight, now: DateTime<Utc>) -> Recommendation {
    Recommendation {
        id: Uuid::new_v4().to_string(),
        recommendation_type: insight.insight_type,
        category: insight.category.clone(),
        title: insight.message.clone(),
        description: insight.evidence.join(" "),
        priority: insight.priority,
        confidence: insight.confidence,
        evidence: insight.evidence.clone(),
        action_steps: insight.action_items.clone(),
        expected_impact: expected_impact(insight.priority).to_string(),
        timeline: timeline(insight.insight_type).to_string(),
        created_at: now,
        expires_at: now + expiry(insight.priority),
    }
}

/// One recommendation per ranked insight, plus a general one when the
/// overall score is low.
pub fn recommendations(
    insights: &[Insight],
    overall_score: f64,
    now: DateTime<Utc>,
) -> Vec<Recommendation> {
    let mut recs: Vec<Recommendation> = insights.iter().map(|i| recommendation(i, now)).collect();
    if overall_score < LOW_OVERALL_SCORE {
        let priority = if overall_score < 40.0 {
            Priority::High
        } else {
            Priority::Medium
        };
        let general = insight(
            InsightType::Lifestyle,
            "general",
            "Focus on Overall Health Improvement".to_string(),
            vec![format!("Overall health score of {overall_score:.0}/100")],
            priority,
            0.6,
            &[
                "Log meals, symptoms and bowel movements daily",
                "Pick one recommendation above and follow it for two weeks",
            ],
        );
        recs.push(recommendation(&general, now));
    }
    recs.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.title.cmp(&b.title))
    });
    recs
}
