//! Record types and the `RecordRepository` trait for gut-health tracking data.
//!
//! The analytics engine never talks to storage directly. It reads bowel
//! movements, meals, symptoms and medications through [`RecordRepository`],
//! which is implemented here over the REST backend
//! ([`http_client::ReqwestRecordRepository`]) and over plain vectors
//! ([`memory::InMemoryRepository`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod config;
pub mod http_client;
pub mod memory;
pub mod retry;
pub mod validation;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RepositoryError {
    /// Map a non-success HTTP status and a body snippet to an error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => Self::NotFound(body),
            401 | 403 => Self::Unauthorized(body),
            400 | 422 => Self::InvalidInput(body),
            _ => Self::Status { status, body },
        }
    }

    /// Whether repeating the same read could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymptomCategory {
    Digestive,
    Abdominal,
    Systemic,
    Neurological,
    Other,
    #[serde(other)]
    Unknown,
}

impl SymptomCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Digestive => "DIGESTIVE",
            Self::Abdominal => "ABDOMINAL",
            Self::Systemic => "SYSTEMIC",
            Self::Neurological => "NEUROLOGICAL",
            Self::Other => "OTHER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymptomType {
    Bloating,
    Cramps,
    Nausea,
    Heartburn,
    Constipation,
    Diarrhea,
    Gas,
    Fatigue,
    Other,
    #[serde(other)]
    Unknown,
}

impl SymptomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bloating => "BLOATING",
            Self::Cramps => "CRAMPS",
            Self::Nausea => "NAUSEA",
            Self::Heartburn => "HEARTBURN",
            Self::Constipation => "CONSTIPATION",
            Self::Diarrhea => "DIARRHEA",
            Self::Gas => "GAS",
            Self::Fatigue => "FATIGUE",
            Self::Other => "OTHER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicationCategory {
    Gastrointestinal,
    PainRelief,
    Antibiotic,
    Probiotics,
    Supplements,
    AntiInflammatory,
    Other,
    #[serde(other)]
    Unknown,
}

impl MedicationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gastrointestinal => "GASTROINTESTINAL",
            Self::PainRelief => "PAIN_RELIEF",
            Self::Antibiotic => "ANTIBIOTIC",
            Self::Probiotics => "PROBIOTICS",
            Self::Supplements => "SUPPLEMENTS",
            Self::AntiInflammatory => "ANTI_INFLAMMATORY",
            Self::Other => "OTHER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MealCategory {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Other,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BowelMovementRecord {
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub id: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub bristol_type: u8,
    pub pain: u8,
    pub strain: u8,
    pub satisfaction: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MealRecord {
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub id: Option<String>,
    pub meal_time: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<MealCategory>,
    #[serde(default)]
    pub calories: u32,
    #[serde(default)]
    pub fiber_rich: bool,
    #[serde(default)]
    pub dairy: bool,
    #[serde(default)]
    pub gluten: bool,
    #[serde(default)]
    pub spicy_level: Option<u8>,
    #[serde(default)]
    pub cuisine: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymptomRecord {
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub id: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub severity: u8,
    #[serde(default)]
    pub category: Option<SymptomCategory>,
    #[serde(default, rename = "type")]
    pub symptom_type: Option<SymptomType>,
    #[serde(default)]
    pub triggers: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<MedicationCategory>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: bool,
}

impl MedicationRecord {
    /// Whether the medication was being taken at `at`. A missing start means
    /// the course start is unknown, which never counts as active.
    pub fn active_at(&self, at: DateTime<Utc>) -> bool {
        match self.start_date {
            Some(start) if start <= at => self.end_date.is_none_or(|end| at <= end),
            _ => false,
        }
    }
}

fn deserialize_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string().into()),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Read-only access to one user's tracking records.
///
/// Windowed fetches are inclusive of both `start` and `end`. Medications are
/// returned regardless of window; their lifetime is independent of it.
#[async_trait]
pub trait RecordRepository: Send + Sync + 'static {
    async fn fetch_bowel_movements(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BowelMovementRecord>>;
    async fn fetch_meals(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<MealRecord>>;
    async fn fetch_symptoms(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<SymptomRecord>>;
    async fn fetch_medications(&self, user_id: &str) -> RepositoryResult<Vec<MedicationRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_enum_values_fall_back() {
        let c: SymptomCategory = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(c, SymptomCategory::Unknown);
        let m: MedicationCategory = serde_json::from_str("\"PAIN_RELIEF\"").unwrap();
        assert_eq!(m, MedicationCategory::PainRelief);
    }

    #[test]
    fn symptom_deserializes_numeric_id_and_type_field() {
        let s: SymptomRecord = serde_json::from_value(serde_json::json!({
            "id": 17,
            "recordedAt": "2025-03-01T08:00:00Z",
            "severity": 4,
            "category": "DIGESTIVE",
            "type": "BLOATING"
        }))
        .unwrap();
        assert_eq!(s.id.as_deref(), Some("17"));
        assert_eq!(s.symptom_type, Some(SymptomType::Bloating));
        assert!(s.triggers.is_empty());
    }

    #[test]
    fn medication_active_window() {
        let start: DateTime<Utc> = "2025-03-01T00:00:00Z".parse().unwrap();
        let end: DateTime<Utc> = "2025-03-10T00:00:00Z".parse().unwrap();
        let med = MedicationRecord {
            id: None,
            name: "Probiotic".into(),
            category: Some(MedicationCategory::Probiotics),
            start_date: Some(start),
            end_date: Some(end),
            is_active: true,
        };
        assert!(med.active_at(start));
        assert!(med.active_at(end));
        assert!(!med.active_at(end + chrono::Duration::seconds(1)));
        assert!(!med.active_at(start - chrono::Duration::seconds(1)));

        let open = MedicationRecord {
            end_date: None,
            ..med
        };
        assert!(open.active_at(end + chrono::Duration::days(100)));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            RepositoryError::from_status(403, "no".into()),
            RepositoryError::Unauthorized(_)
        ));
        assert!(RepositoryError::from_status(503, String::new()).is_transient());
        assert!(!RepositoryError::from_status(404, String::new()).is_transient());
    }
}
