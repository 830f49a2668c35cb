//! HTTP implementation of [`RecordRepository`](crate::RecordRepository) over the tracker REST API.
//!
//! List endpoints are paged with `limit`/`offset` and answer either with a bare
//! JSON array or with an object envelope (`{"data": [...]}`, `{"medications": [...]}`).

use crate::config::{Config, DEFAULT_PAGE_SIZE};
use crate::retry::RetryPolicy;
use crate::{
    BowelMovementRecord, MealRecord, MedicationRecord, RecordRepository, RepositoryError,
    RepositoryResult, SymptomRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Deserialize)]
#[serde(untagged)]
enum ListPage<T> {
    Wrapped {
        #[serde(
            alias = "items",
            alias = "bowelMovements",
            alias = "meals",
            alias = "symptoms",
            alias = "medications"
        )]
        data: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> ListPage<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(items) => items,
        }
    }
}

/// Repository backed by the tracker REST API using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestRecordRepository {
    base_url: String,
    api_token: SecretString,
    page_size: u32,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl ReqwestRecordRepository {
    /// Create a repository for `base_url` (e.g. "http://localhost:8080")
    /// authenticating with a bearer token.
    pub fn new(base_url: &str, api_token: SecretString) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.base_url, config.api_token.clone()).with_page_size(config.page_size)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build an authenticated GET request.
    fn get_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(self.api_token.expose_secret())
    }

    /// Execute a request and expect a JSON response.
    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> RepositoryResult<T> {
        let resp = request.send().await?;
        self.handle_response(resp).await
    }

    /// Handle a response, converting status codes to appropriate errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> RepositoryResult<T> {
        if !resp.status().is_success() {
            return Err(self.error_from_response(resp).await);
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Extract error information from a failed response.
    async fn error_from_response(&self, resp: reqwest::Response) -> RepositoryError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        RepositoryError::from_status(status, body_snippet)
    }

    /// Walk every page of a list endpoint until a short page comes back.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, String)],
    ) -> RepositoryResult<Vec<T>> {
        let url = format!("{}/api/{}", self.base_url, resource);
        let limit = self.page_size.to_string();
        let mut items = Vec::new();
        let mut offset: usize = 0;
        loop {
            let offset_param = offset.to_string();
            let page: ListPage<T> = self
                .retry
                .retry_async_if(
                    || {
                        let request = self
                            .get_request(&url)
                            .query(params)
                            .query(&[("limit", limit.as_str()), ("offset", offset_param.as_str())]);
                        self.execute_json(request)
                    },
                    RepositoryError::is_transient,
                )
                .await?;
            let page = page.into_items();
            let received = page.len();
            items.extend(page);
            if received < self.page_size as usize {
                break;
            }
            offset += received;
        }
        tracing::debug!(resource, count = items.len(), "fetched records");
        Ok(items)
    }

    async fn fetch_window<T, F>(
        &self,
        resource: &str,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timestamp: F,
    ) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> DateTime<Utc>,
    {
        let params = [
            ("userId", user_id.to_string()),
            ("startDate", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("endDate", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        let mut records: Vec<T> = self.fetch_all(resource, &params).await?;
        records.retain(|r| {
            let at = timestamp(r);
            start <= at && at <= end
        });
        Ok(records)
    }
}

#[async_trait]
impl RecordRepository for ReqwestRecordRepository {
    async fn fetch_bowel_movements(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BowelMovementRecord>> {
        self.fetch_window("bowel-movements", user_id, start, end, |r: &BowelMovementRecord| {
            r.recorded_at
        })
        .await
    }

    async fn fetch_meals(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<MealRecord>> {
        self.fetch_window("meals", user_id, start, end, |r: &MealRecord| r.meal_time)
            .await
    }

    async fn fetch_symptoms(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<SymptomRecord>> {
        self.fetch_window("symptoms", user_id, start, end, |r: &SymptomRecord| {
            r.recorded_at
        })
        .await
    }

    async fn fetch_medications(&self, user_id: &str) -> RepositoryResult<Vec<MedicationRecord>> {
        self.fetch_all("medications", &[("userId", user_id.to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_page_accepts_envelopes_and_arrays() {
        let wrapped: ListPage<u32> = serde_json::from_str(r#"{"data":[1,2]}"#).unwrap();
        assert_eq!(wrapped.into_items(), vec![1, 2]);
        let meds: ListPage<u32> = serde_json::from_str(r#"{"medications":[3]}"#).unwrap();
        assert_eq!(meds.into_items(), vec![3]);
        let bare: ListPage<u32> = serde_json::from_str("[4,5,6]").unwrap();
        assert_eq!(bare.into_items(), vec![4, 5, 6]);
    }

    #[test]
    fn new_trims_trailing_slash() {
        let repo = ReqwestRecordRepository::new("http://example.test/", SecretString::new("t".into()))
            .with_page_size(0);
        assert_eq!(repo.base_url, "http://example.test");
        assert_eq!(repo.page_size, 1);
    }
}
