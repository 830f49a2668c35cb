//! In-process repository over plain vectors, keyed by user id.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    BowelMovementRecord, MealRecord, MedicationRecord, RecordRepository, RepositoryError,
    RepositoryResult, SymptomRecord,
};

#[derive(Clone, Debug, Default)]
pub struct UserRecords {
    pub bowel_movements: Vec<BowelMovementRecord>,
    pub meals: Vec<MealRecord>,
    pub symptoms: Vec<SymptomRecord>,
    pub medications: Vec<MedicationRecord>,
}

/// Unknown users read as empty; a user registered through [`deny`](Self::deny)
/// reads as `Unauthorized`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    users: RwLock<HashMap<String, UserRecords>>,
    denied: RwLock<Vec<String>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: impl Into<String>, records: UserRecords) -> Self {
        self.insert(user_id, records);
        self
    }

    pub fn insert(&self, user_id: impl Into<String>, records: UserRecords) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user_id.into(), records);
        }
    }

    pub fn deny(&self, user_id: impl Into<String>) {
        if let Ok(mut denied) = self.denied.write() {
            denied.push(user_id.into());
        }
    }

    fn read<T, F>(&self, user_id: &str, select: F) -> RepositoryResult<Vec<T>>
    where
        F: FnOnce(&UserRecords) -> Vec<T>,
    {
        let denied = self
            .denied
            .read()
            .map_err(|_| RepositoryError::Config("repository lock poisoned".into()))?;
        if denied.iter().any(|d| d == user_id) {
            return Err(RepositoryError::Unauthorized(format!(
                "no access to records of {user_id}"
            )));
        }
        let users = self
            .users
            .read()
            .map_err(|_| RepositoryError::Config("repository lock poisoned".into()))?;
        Ok(users.get(user_id).map(select).unwrap_or_default())
    }
}

fn within(at: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start <= at && at <= end
}

#[async_trait]
impl RecordRepository for InMemoryRepository {
    async fn fetch_bowel_movements(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BowelMovementRecord>> {
        self.read(user_id, |u| {
            u.bowel_movements
                .iter()
                .filter(|r| within(r.recorded_at, start, end))
                .cloned()
                .collect()
        })
    }

    async fn fetch_meals(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<MealRecord>> {
        self.read(user_id, |u| {
            u.meals
                .iter()
                .filter(|r| within(r.meal_time, start, end))
                .cloned()
                .collect()
        })
    }

    async fn fetch_symptoms(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<SymptomRecord>> {
        self.read(user_id, |u| {
            u.symptoms
                .iter()
                .filter(|r| within(r.recorded_at, start, end))
                .cloned()
                .collect()
        })
    }

    async fn fetch_medications(&self, user_id: &str) -> RepositoryResult<Vec<MedicationRecord>> {
        self.read(user_id, |u| u.medications.clone())
    }
}
