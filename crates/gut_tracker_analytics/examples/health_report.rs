//! Prints every analysis for a synthetic user as JSON, followed by the
//! request metrics in Prometheus text format.
//!
//! Set `GUT_TRACKER_API_TOKEN` (and optionally `GUT_TRACKER_BASE_URL`) to
//! read a real user from the REST backend instead; the user id is then taken
//! from the first argument.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use gut_tracker_analytics::{AnalysisKind, AnalyticsConfig, AnalyticsService, FetchContext};
use gut_tracker_client::config::Config;
use gut_tracker_client::http_client::ReqwestRecordRepository;
use gut_tracker_client::memory::{InMemoryRepository, UserRecords};
use gut_tracker_client::{
    BowelMovementRecord, MealRecord, MedicationRecord, RecordRepository, SymptomRecord,
};
use metrics_exporter_prometheus::PrometheusBuilder;

const DEMO_USER: &str = "demo";

fn demo_records(now: DateTime<Utc>) -> UserRecords {
    let mut records = UserRecords::default();
    for day in 0..21i64 {
        let morning = now - Duration::days(21 - day) + Duration::hours(8);
        let spicy = day % 3 == 0;
        records.meals.push(MealRecord {
            id: None,
            meal_time: morning - Duration::hours(1),
            name: Some("oats".into()),
            category: None,
            calories: 420,
            fiber_rich: day % 2 == 0,
            dairy: true,
            gluten: false,
            spicy_level: None,
            cuisine: Some("home".into()),
        });
        records.meals.push(MealRecord {
            id: None,
            meal_time: morning + Duration::hours(11),
            name: Some("curry".into()),
            category: None,
            calories: if spicy { 900 } else { 650 },
            fiber_rich: false,
            dairy: false,
            gluten: true,
            spicy_level: Some(if spicy { 7 } else { 1 }),
            cuisine: Some(if spicy { "indian" } else { "italian" }.into()),
        });
        records.bowel_movements.push(BowelMovementRecord {
            id: None,
            recorded_at: morning + Duration::minutes(day * 5),
            bristol_type: if spicy { 6 } else { 4 },
            pain: if spicy { 5 } else { 2 },
            strain: 2,
            satisfaction: if spicy { 4 } else { 8 },
        });
        if spicy {
            records.symptoms.push(SymptomRecord {
                id: None,
                recorded_at: morning + Duration::hours(14),
                severity: (7 - day / 5).max(1) as u8,
                category: None,
                symptom_type: None,
                triggers: vec!["spicy".into()],
            });
        }
    }
    records.medications.push(MedicationRecord {
        id: None,
        name: "Probiotic".into(),
        category: None,
        start_date: Some(now - Duration::days(10)),
        end_date: None,
        is_active: true,
    });
    records
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Configure logging from env var `GUT_ANALYTICS_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("GUT_ANALYTICS_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!(%log_env, "gut_tracker_analytics:example: log filter");

    let metrics = PrometheusBuilder::new().install_recorder()?;
    let config = AnalyticsConfig::from_env()?;
    let now = Utc::now();

    let (repository, user_id): (Arc<dyn RecordRepository>, String) = match Config::from_env() {
        Ok(client_config) => {
            let user = std::env::args()
                .nth(1)
                .ok_or_else(|| anyhow::anyhow!("usage: health_report <user-id>"))?;
            (Arc::new(ReqwestRecordRepository::from_config(&client_config)), user)
        }
        Err(_) => {
            tracing::info!("GUT_TRACKER_API_TOKEN not set; using synthetic records");
            let repo = InMemoryRepository::new().with_user(DEMO_USER, demo_records(now));
            (Arc::new(repo), DEMO_USER.to_string())
        }
    };

    let service = AnalyticsService::new(repository, config);
    let (start, end) = service.default_window();
    let ctx = FetchContext::new();
    for kind in AnalysisKind::ALL {
        let report = service.run(kind, &ctx, &user_id, start, end).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    eprintln!("{}", metrics.render());
    Ok(())
}
