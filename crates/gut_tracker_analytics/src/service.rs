//! The analytics facade: fetch one user's records, run the engine, return
//! plain serializable results.
//!
//! Every operation validates its date range before touching the repository.
//! The four record fetches run concurrently under the caller's deadline and
//! cancellation signal; the CPU-bound analysis then runs on the blocking
//! pool and is not interruptible.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gut_tracker_client::validation::{Validate, retain_valid};
use gut_tracker_client::{
    BowelMovementRecord, MealRecord, MedicationRecord, RecordRepository, SymptomRecord,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{Instrument, debug, info_span, warn};

use crate::aggregator::DataAggregator;
use crate::config::AnalyticsConfig;
use crate::domains::insights::{self, InsightInputs};
use crate::domains::scoring::{self, ComponentScores};
use crate::domains::{correlation, trends};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::observability::observe;
use crate::patterns::PatternAnalyzer;
use crate::types::{
    AnalysisPeriod, BehaviorPatterns, BowelMovementSummary, CorrelationAnalysis,
    DailyAggregation, HealthInsights, HealthOverview, HealthScore, MealSummary,
    MedicationSummary, Recommendation, Sanitize, SymptomSummary, TrendAnalysis,
};

/// Source of "now" for the operations that look back from the present.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Deadline and cancellation for the record fetch phase of one call.
#[derive(Clone, Debug, Default)]
pub struct FetchContext {
    timeout: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
}

impl FetchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the configured fetch timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The fetch is abandoned once the channel holds `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        let requested = *rx.borrow_and_update();
        if requested {
            return;
        }
        if rx.changed().await.is_err() {
            // sender dropped without cancelling
            std::future::pending::<()>().await;
        }
    }
}

/// Named analyses accepted by [`AnalyticsService::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Overview,
    Correlations,
    Trends,
    Patterns,
    Insights,
    Score,
    Recommendations,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 7] = [
        Self::Overview,
        Self::Correlations,
        Self::Trends,
        Self::Patterns,
        Self::Insights,
        Self::Score,
        Self::Recommendations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Correlations => "correlations",
            Self::Trends => "trends",
            Self::Patterns => "patterns",
            Self::Insights => "insights",
            Self::Score => "score",
            Self::Recommendations => "recommendations",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let kind = match normalized.as_str() {
            "overview" | "health_overview" => Self::Overview,
            "correlations" | "correlation_analysis" => Self::Correlations,
            "trends" | "trend_analysis" => Self::Trends,
            "patterns" | "behavior_patterns" => Self::Patterns,
            "insights" | "health_insights" => Self::Insights,
            "score" | "health_score" => Self::Score,
            "recommendations" => Self::Recommendations,
            _ => return Err(AnalyticsError::InvalidAnalysisType(s.to_string())),
        };
        Ok(kind)
    }
}

/// Result of [`AnalyticsService::run`], tagged with the analysis that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum AnalysisReport {
    Overview(HealthOverview),
    Correlations(CorrelationAnalysis),
    Trends(TrendAnalysis),
    Patterns(BehaviorPatterns),
    Insights(HealthInsights),
    Score(HealthScore),
    Recommendations(Vec<Recommendation>),
}

/// One user's validated records for the requested window.
#[derive(Clone, Debug, Default)]
struct Snapshot {
    bowel_movements: Vec<BowelMovementRecord>,
    meals: Vec<MealRecord>,
    symptoms: Vec<SymptomRecord>,
    medications: Vec<MedicationRecord>,
}

impl Snapshot {
    fn record_count(&self) -> usize {
        self.bowel_movements.len() + self.meals.len() + self.symptoms.len() + self.medications.len()
    }

    fn has_observations(&self) -> bool {
        !(self.bowel_movements.is_empty() && self.meals.is_empty() && self.symptoms.is_empty())
    }
}

fn overlaps(med: &MedicationRecord, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    med.start_date.is_none_or(|s| s <= end) && med.end_date.is_none_or(|e| e >= start)
}

fn keep_valid<T: Validate>(user_id: &str, records: Vec<T>) -> Vec<T> {
    let (kept, dropped) = retain_valid(records);
    if dropped > 0 {
        warn!(user_id, kind = T::KIND, dropped, "discarding invalid records");
    }
    kept
}

struct Summaries {
    bowel: BowelMovementSummary,
    meals: MealSummary,
    symptoms: SymptomSummary,
    medications: MedicationSummary,
}

impl Summaries {
    fn components(&self) -> ComponentScores {
        scoring::component_scores(&self.bowel, &self.meals, &self.symptoms, &self.medications)
    }
}

/// Stateless bundle of the engine components for one call.
#[derive(Clone, Copy, Debug)]
struct Engine {
    aggregator: DataAggregator,
    trend_threshold: f64,
}

impl Engine {
    fn patterns(&self) -> PatternAnalyzer {
        PatternAnalyzer::new(self.aggregator)
    }

    fn daily(&self, period: &AnalysisPeriod, s: &Snapshot) -> Vec<DailyAggregation> {
        self.aggregator.aggregate_daily(
            &s.bowel_movements,
            &s.meals,
            &s.symptoms,
            &s.medications,
            period.start,
            period.end,
        )
    }

    fn summaries(&self, s: &Snapshot) -> Summaries {
        Summaries {
            bowel: self.aggregator.aggregate_bowel_movements(&s.bowel_movements),
            meals: self.aggregator.aggregate_meals(&s.meals),
            symptoms: self.aggregator.aggregate_symptoms(&s.symptoms),
            medications: self.aggregator.aggregate_medications(&s.medications),
        }
    }

    fn trends(&self, period: AnalysisPeriod, daily: &[DailyAggregation]) -> TrendAnalysis {
        trends::analyze(period, daily, self.trend_threshold)
    }

    fn overview(&self, period: AnalysisPeriod, s: &Snapshot) -> HealthOverview {
        let daily = self.daily(&period, s);
        let sums = self.summaries(s);
        let trend = self.trends(period.clone(), &daily);
        HealthOverview {
            overall_health_score: sums.components().overall(),
            trend_direction: trend.overall_trend,
            period,
            bowel_movements: sums.bowel,
            meals: sums.meals,
            symptoms: sums.symptoms,
            medications: sums.medications,
        }
    }

    fn correlations(
        &self,
        period: AnalysisPeriod,
        s: &Snapshot,
        daily: &[DailyAggregation],
    ) -> CorrelationAnalysis {
        CorrelationAnalysis {
            period,
            meal_bowel: correlation::meal_bowel_correlations(daily),
            meal_symptom: correlation::meal_symptom_correlations(daily),
            medication_symptom: correlation::medication_symptom_correlations(
                &self.aggregator,
                daily,
                &s.medications,
            ),
            medication_effectiveness: correlation::medication_effectiveness(
                &self.aggregator,
                &s.medications,
                &s.bowel_movements,
                &s.symptoms,
            ),
            triggers: self.patterns().symptom_triggers(&s.meals, &s.symptoms),
        }
    }

    fn behavior(&self, period: AnalysisPeriod, s: &Snapshot) -> BehaviorPatterns {
        let daily = self.daily(&period, s);
        self.patterns()
            .analyze(period, &s.bowel_movements, &s.meals, &s.symptoms, &daily)
    }

    fn score(&self, period: AnalysisPeriod, s: &Snapshot, now: DateTime<Utc>) -> HealthScore {
        let daily = self.daily(&period, s);
        let trend = self.trends(period, &daily);
        scoring::health_score(self.summaries(s).components(), &trend, now)
    }

    /// Insights together with the overall score they were judged against.
    fn insights(&self, period: AnalysisPeriod, s: &Snapshot) -> (HealthInsights, f64) {
        let daily = self.daily(&period, s);
        let sums = self.summaries(s);
        let trend = self.trends(period.clone(), &daily);
        let correlations = self.correlations(period.clone(), s, &daily);
        let symptom_pattern = self.patterns().symptom_pattern(&s.symptoms, &daily);
        let overall_score = sums.components().overall();
        let inputs = InsightInputs {
            bowel: &sums.bowel,
            meals: &sums.meals,
            symptoms: &sums.symptoms,
            bowel_movements: &s.bowel_movements,
            correlations: &correlations,
            trends: &trend,
            symptom_pattern: &symptom_pattern,
            overall_score,
            record_count: s.record_count(),
        };
        (insights::health_insights(period, &inputs), overall_score)
    }

    fn recommendations(
        &self,
        period: AnalysisPeriod,
        s: &Snapshot,
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let (found, overall_score) = self.insights(period, s);
        insights::recommendations(&found.insights, overall_score, now)
    }
}

/// Public entry point to the analytics engine.
///
/// Cheap to clone; holds no per-call state, so one instance can serve
/// concurrent requests for any number of users.
#[derive(Clone)]
pub struct AnalyticsService {
    repository: Arc<dyn RecordRepository>,
    config: AnalyticsConfig,
    clock: Clock,
}

impl fmt::Debug for AnalyticsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AnalyticsService {
    pub fn new(repository: Arc<dyn RecordRepository>, config: AnalyticsConfig) -> Self {
        Self {
            repository,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    fn engine(&self) -> Engine {
        Engine {
            aggregator: DataAggregator::new(self.config.utc_offset, self.config.trend_threshold),
            trend_threshold: self.config.trend_threshold,
        }
    }

    /// `[now - window_days, now]`.
    pub fn default_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = (self.clock)();
        (end - chrono::Duration::days(self.config.window_days), end)
    }

    fn period(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AnalyticsResult<AnalysisPeriod> {
        if end < start {
            return Err(AnalyticsError::InvalidDateRange { start, end });
        }
        Ok(AnalysisPeriod {
            start,
            end,
            days: self.engine().aggregator.days_in_range(start, end).len(),
        })
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Snapshot> {
        let repo = self.repository.as_ref();
        let fetch_all = async {
            tokio::try_join!(
                repo.fetch_bowel_movements(user_id, start, end),
                repo.fetch_meals(user_id, start, end),
                repo.fetch_symptoms(user_id, start, end),
                repo.fetch_medications(user_id),
            )
            .map_err(AnalyticsError::from)
        };
        let limit = ctx.timeout.or(self.config.fetch_timeout);
        let bounded = async move {
            match limit {
                Some(limit) => tokio::time::timeout(limit, fetch_all)
                    .await
                    .unwrap_or(Err(AnalyticsError::Timeout(limit))),
                None => fetch_all.await,
            }
        };

        let (bowel_movements, meals, symptoms, medications) = match ctx.cancel.clone() {
            Some(mut cancel) => tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return Err(AnalyticsError::Cancelled),
                fetched = bounded => fetched?,
            },
            None => bounded.await?,
        };
        debug!(
            bowel_movements = bowel_movements.len(),
            meals = meals.len(),
            symptoms = symptoms.len(),
            medications = medications.len(),
            "fetched records"
        );

        let snapshot = Snapshot {
            bowel_movements: keep_valid(user_id, bowel_movements),
            meals: keep_valid(user_id, meals),
            symptoms: keep_valid(user_id, symptoms),
            medications: keep_valid(user_id, medications)
                .into_iter()
                .filter(|m| overlaps(m, start, end))
                .collect(),
        };
        if self.config.require_data && !snapshot.has_observations() {
            return Err(AnalyticsError::InsufficientData(format!(
                "no records for {user_id} between {start} and {end}"
            )));
        }
        Ok(snapshot)
    }

    async fn analyze<T, F>(
        &self,
        operation: &'static str,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        compute: F,
    ) -> AnalyticsResult<T>
    where
        T: Sanitize + Send + 'static,
        F: FnOnce(Engine, AnalysisPeriod, Snapshot, DateTime<Utc>) -> T + Send + 'static,
    {
        let span = info_span!("analytics", operation, user_id);
        observe(operation, async move {
            let period = self.period(start, end)?;
            let snapshot = self.fetch(ctx, user_id, start, end).await?;
            let engine = self.engine();
            let now = (self.clock)();
            let mut result =
                tokio::task::spawn_blocking(move || compute(engine, period, snapshot, now))
                    .await
                    .map_err(|e| AnalyticsError::AnalysisFailed {
                        analysis: operation,
                        message: e.to_string(),
                    })?;
            result.sanitize();
            Ok(result)
        })
        .instrument(span)
        .await
    }

    /// Per-domain summaries with the composite score and overall trend.
    pub async fn get_health_overview(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<HealthOverview> {
        self.analyze("overview", ctx, user_id, start, end, |engine, period, s, _| {
            engine.overview(period, &s)
        })
        .await
    }

    pub async fn get_correlation_analysis(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<CorrelationAnalysis> {
        self.analyze("correlations", ctx, user_id, start, end, |engine, period, s, _| {
            let daily = engine.daily(&period, &s);
            engine.correlations(period, &s, &daily)
        })
        .await
    }

    pub async fn get_trend_analysis(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<TrendAnalysis> {
        self.analyze("trends", ctx, user_id, start, end, |engine, period, s, _| {
            let daily = engine.daily(&period, &s);
            engine.trends(period, &daily)
        })
        .await
    }

    pub async fn get_behavior_patterns(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<BehaviorPatterns> {
        self.analyze("patterns", ctx, user_id, start, end, |engine, period, s, _| {
            engine.behavior(period, &s)
        })
        .await
    }

    pub async fn get_health_insights(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<HealthInsights> {
        self.analyze("insights", ctx, user_id, start, end, |engine, period, s, _| {
            engine.insights(period, &s).0
        })
        .await
    }

    /// Composite score over the default look-back window.
    pub async fn get_health_score(
        &self,
        ctx: &FetchContext,
        user_id: &str,
    ) -> AnalyticsResult<HealthScore> {
        let (start, end) = self.default_window();
        self.analyze("score", ctx, user_id, start, end, |engine, period, s, now| {
            engine.score(period, &s, now)
        })
        .await
    }

    /// Recommendations over the default look-back window.
    pub async fn get_recommendations(
        &self,
        ctx: &FetchContext,
        user_id: &str,
    ) -> AnalyticsResult<Vec<Recommendation>> {
        let (start, end) = self.default_window();
        self.analyze(
            "recommendations",
            ctx,
            user_id,
            start,
            end,
            |engine, period, s, now| engine.recommendations(period, &s, now),
        )
        .await
    }

    /// Dispatch by kind. `Score` and `Recommendations` ignore `start` and
    /// `end` and use the default window.
    pub async fn run(
        &self,
        kind: AnalysisKind,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<AnalysisReport> {
        let report = match kind {
            AnalysisKind::Overview => {
                AnalysisReport::Overview(self.get_health_overview(ctx, user_id, start, end).await?)
            }
            AnalysisKind::Correlations => AnalysisReport::Correlations(
                self.get_correlation_analysis(ctx, user_id, start, end)
                    .await?,
            ),
            AnalysisKind::Trends => {
                AnalysisReport::Trends(self.get_trend_analysis(ctx, user_id, start, end).await?)
            }
            AnalysisKind::Patterns => AnalysisReport::Patterns(
                self.get_behavior_patterns(ctx, user_id, start, end).await?,
            ),
            AnalysisKind::Insights => AnalysisReport::Insights(
                self.get_health_insights(ctx, user_id, start, end).await?,
            ),
            AnalysisKind::Score => AnalysisReport::Score(self.get_health_score(ctx, user_id).await?),
            AnalysisKind::Recommendations => {
                AnalysisReport::Recommendations(self.get_recommendations(ctx, user_id).await?)
            }
        };
        Ok(report)
    }

    /// Like [`run`](Self::run) with the analysis given by name.
    pub async fn run_named(
        &self,
        name: &str,
        ctx: &FetchContext,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<AnalysisReport> {
        let kind: AnalysisKind = name.parse()?;
        self.run(kind, ctx, user_id, start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{medication, ts};

    #[test]
    fn analysis_kind_parses_aliases() {
        assert_eq!("overview".parse::<AnalysisKind>().ok(), Some(AnalysisKind::Overview));
        assert_eq!(
            "Health-Score".parse::<AnalysisKind>().ok(),
            Some(AnalysisKind::Score)
        );
        for kind in AnalysisKind::ALL {
            assert_eq!(kind.as_str().parse::<AnalysisKind>().ok(), Some(kind));
        }
        assert!(matches!(
            "forecast".parse::<AnalysisKind>(),
            Err(AnalyticsError::InvalidAnalysisType(name)) if name == "forecast"
        ));
    }

    #[test]
    fn medication_window_overlap() {
        let start = ts("2025-03-01T00:00:00Z");
        let end = ts("2025-03-31T00:00:00Z");
        let mut ended = medication("a", Some("2025-01-01T00:00:00Z"), false);
        ended.end_date = Some(ts("2025-02-01T00:00:00Z"));
        assert!(!overlaps(&ended, start, end));
        assert!(overlaps(&medication("b", Some("2025-01-01T00:00:00Z"), true), start, end));
        assert!(overlaps(&medication("c", None, true), start, end));
        assert!(!overlaps(&medication("d", Some("2025-04-02T00:00:00Z"), true), start, end));
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_fetch() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).expect("receiver alive");
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .expect("cancelled future resolves");
    }

    #[tokio::test]
    async fn dropped_sender_never_cancels() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let waited = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(waited.is_err());
    }
}
