use chrono::NaiveDate;

use crate::aggregator::bristol_closeness;
use crate::stats::{
    TrendDirection, confidence_from_sample_size, mean, regression_slope, round_to,
    trend_direction,
};
use crate::types::{AnalysisPeriod, DailyAggregation, DataTrend, MetricTrend, TrendAnalysis, TrendMetric};

/// One value per calendar day that carries the metric, oldest first.
///
/// Bowel metrics only use days with a movement and fiber intake only days
/// with a meal. Symptom severity covers every day, so a symptom-free day
/// reads as 0.
pub fn metric_series(metric: TrendMetric, daily: &[DailyAggregation]) -> (Vec<NaiveDate>, Vec<f64>) {
    daily
        .iter()
        .filter_map(|day| {
            let value = match metric {
                TrendMetric::BowelConsistency if day.bowel_movement_count > 0 => {
                    let closeness: Vec<f64> = day
                        .bowel_movements
                        .iter()
                        .map(|bm| bristol_closeness(bm.bristol_type))
                        .collect();
                    mean(&closeness)
                }
                TrendMetric::BowelPain if day.bowel_movement_count > 0 => day.avg_pain,
                TrendMetric::BowelSatisfaction if day.bowel_movement_count > 0 => {
                    day.avg_satisfaction
                }
                TrendMetric::SymptomSeverity => day.total_symptom_severity,
                TrendMetric::FiberIntake if day.meal_count > 0 => {
                    day.fiber_rich_meal_count as f64 / day.meal_count as f64
                }
                _ => return None,
            };
            Some((day.date, value))
        })
        .unzip()
}

pub fn metric_trend(metric: TrendMetric, daily: &[DailyAggregation], threshold: f64) -> DataTrend {
    let (time_points, values) = metric_series(metric, daily);
    let slope = regression_slope(&values);
    let oriented = if metric.higher_is_better() { slope } else { -slope };
    DataTrend {
        direction: trend_direction(oriented, threshold),
        slope: round_to(slope, 4),
        confidence: confidence_from_sample_size(values.len()),
        time_points,
        values,
    }
}

/// Majority of improving against declining metrics; a tie is stable.
pub fn overall_trend(metrics: &[MetricTrend]) -> TrendDirection {
    let improving = metrics
        .iter()
        .filter(|m| m.trend.direction == TrendDirection::Improving)
        .count();
    let declining = metrics
        .iter()
        .filter(|m| m.trend.direction == TrendDirection::Declining)
        .count();
    match improving.cmp(&declining) {
        std::cmp::Ordering::Greater => TrendDirection::Improving,
        std::cmp::Ordering::Less => TrendDirection::Declining,
        std::cmp::Ordering::Equal => TrendDirection::Stable,
    }
}

pub fn analyze(period: AnalysisPeriod, daily: &[DailyAggregation], threshold: f64) -> TrendAnalysis {
    let metrics: Vec<MetricTrend> = TrendMetric::ALL
        .into_iter()
        .map(|metric| MetricTrend {
            metric,
            trend: metric_trend(metric, daily, threshold),
        })
        .collect();
    TrendAnalysis {
        period,
        overall_trend: overall_trend(&metrics),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::DataAggregator;
    use crate::test_utils::{bowel, meal, symptom, ts};
    use chrono::{Offset, Utc};

    fn daily(
        bms: &[gut_tracker_client::BowelMovementRecord],
        meals: &[gut_tracker_client::MealRecord],
        symptoms: &[gut_tracker_client::SymptomRecord],
    ) -> Vec<DailyAggregation> {
        DataAggregator::new(Utc.fix(), 0.05).aggregate_daily(
            bms,
            meals,
            symptoms,
            &[],
            ts("2025-03-01T00:00:00Z"),
            ts("2025-03-05T23:00:00Z"),
        )
    }

    #[test]
    fn falling_severity_is_improving() {
        let symptoms: Vec<_> = (1..=5)
            .map(|d| symptom(&format!("2025-03-0{d}T12:00:00Z"), 10 - 2 * d as u8))
            .collect();
        let days = daily(&[], &[], &symptoms);
        let trend = metric_trend(TrendMetric::SymptomSeverity, &days, 0.05);
        assert_eq!(trend.slope, -2.0);
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert_eq!(trend.values, vec![8.0, 6.0, 4.0, 2.0, 0.0]);
    }

    #[test]
    fn bowel_series_skip_empty_days() {
        let bms = [
            bowel("2025-03-01T08:00:00Z", 1),
            bowel("2025-03-03T08:00:00Z", 4),
        ];
        let days = daily(&bms, &[], &[]);
        let (dates, values) = metric_series(TrendMetric::BowelConsistency, &days);
        assert_eq!(dates.len(), 2);
        assert_eq!(values, vec![0.0, 1.0]);
        let trend = metric_trend(TrendMetric::BowelConsistency, &days, 0.05);
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert_eq!(trend.confidence, 0.3);
    }

    #[test]
    fn rising_pain_is_declining() {
        let bms: Vec<_> = (1..=3)
            .map(|d| {
                let mut bm = bowel(&format!("2025-03-0{d}T08:00:00Z"), 4);
                bm.pain = d as u8 * 2;
                bm
            })
            .collect();
        let days = daily(&bms, &[], &[]);
        assert_eq!(
            metric_trend(TrendMetric::BowelPain, &days, 0.05).direction,
            TrendDirection::Declining
        );
    }

    #[test]
    fn small_slopes_are_stable() {
        let meals = [
            meal("2025-03-01T08:00:00Z", 400, true),
            meal("2025-03-02T08:00:00Z", 400, true),
        ];
        let days = daily(&[], &meals, &[]);
        let trend = metric_trend(TrendMetric::FiberIntake, &days, 0.05);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn empty_input_is_stable_everywhere() {
        let analysis = analyze(
            AnalysisPeriod {
                start: ts("2025-03-01T00:00:00Z"),
                end: ts("2025-03-05T23:00:00Z"),
                days: 5,
            },
            &daily(&[], &[], &[]),
            0.05,
        );
        assert_eq!(analysis.metrics.len(), 5);
        assert_eq!(analysis.overall_trend, TrendDirection::Stable);
        assert!(
            analysis
                .metrics
                .iter()
                .all(|m| m.trend.direction == TrendDirection::Stable)
        );
    }

    #[test]
    fn overall_is_majority_vote() {
        let make = |metric, direction| MetricTrend {
            metric,
            trend: DataTrend {
                direction,
                slope: 0.0,
                confidence: 0.3,
                time_points: Vec::new(),
                values: Vec::new(),
            },
        };
        let metrics = [
            make(TrendMetric::BowelPain, TrendDirection::Improving),
            make(TrendMetric::BowelSatisfaction, TrendDirection::Improving),
            make(TrendMetric::FiberIntake, TrendDirection::Declining),
        ];
        assert_eq!(overall_trend(&metrics), TrendDirection::Improving);
        assert_eq!(overall_trend(&metrics[1..]), TrendDirection::Stable);
    }
}
