use std::time::Duration;

use chrono::{DateTime, Utc};
use gut_tracker_client::http_client::ReqwestRecordRepository;
use gut_tracker_client::retry::RetryPolicy;
use gut_tracker_client::{MedicationCategory, RecordRepository, RepositoryError, SymptomType};
use secrecy::SecretString;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn repo(server: &MockServer) -> ReqwestRecordRepository {
    ReqwestRecordRepository::new(&server.uri(), SecretString::new("tok".into())).with_retry_policy(
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        },
    )
}

#[tokio::test]
async fn bowel_movements_use_bearer_and_window_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/bowel-movements"))
        .and(header("authorization", "Bearer tok"))
        .and(query_param("userId", "u1"))
        .and(query_param("startDate", "2025-03-01T00:00:00Z"))
        .and(query_param("endDate", "2025-03-07T23:59:59Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"id": 1, "recordedAt": "2025-03-02T07:30:00Z", "bristolType": 4, "pain": 1, "strain": 2, "satisfaction": 8},
                {"id": 2, "recordedAt": "2025-03-03T07:45:00Z", "bristolType": 3, "pain": 2, "strain": 3, "satisfaction": 7},
                {"id": 3, "recordedAt": "2025-02-20T07:45:00Z", "bristolType": 5, "pain": 1, "strain": 1, "satisfaction": 9}
            ]
        })))
        .mount(&mock_server)
        .await;

    let records = repo(&mock_server)
        .fetch_bowel_movements("u1", ts("2025-03-01T00:00:00Z"), ts("2025-03-07T23:59:59Z"))
        .await
        .expect("fetch");
    // the record outside the window is dropped client-side
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id.as_deref(), Some("1"));
    assert_eq!(records[1].bristol_type, 3);
}

#[tokio::test]
async fn meals_are_fetched_across_pages() {
    let mock_server = MockServer::start().await;
    let meal = |id: u32, at: &str| {
        serde_json::json!({"id": id, "mealTime": at, "calories": 450, "fiberRich": true, "spicyLevel": 3})
    };

    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [meal(1, "2025-03-01T08:00:00Z"), meal(2, "2025-03-01T12:00:00Z")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [meal(3, "2025-03-01T19:00:00Z")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let meals = repo(&mock_server)
        .with_page_size(2)
        .fetch_meals("u1", ts("2025-03-01T00:00:00Z"), ts("2025-03-02T00:00:00Z"))
        .await
        .expect("fetch");
    assert_eq!(meals.len(), 3);
    assert!(meals.iter().all(|m| m.fiber_rich && m.spicy_level == Some(3)));
}

#[tokio::test]
async fn symptoms_accept_bare_arrays() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/symptoms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "s1", "recordedAt": "2025-03-01T10:00:00Z", "severity": 6, "category": "DIGESTIVE", "type": "BLOATING", "triggers": ["dairy"]}
        ])))
        .mount(&mock_server)
        .await;

    let symptoms = repo(&mock_server)
        .fetch_symptoms("u1", ts("2025-03-01T00:00:00Z"), ts("2025-03-01T23:59:59Z"))
        .await
        .expect("fetch");
    assert_eq!(symptoms.len(), 1);
    assert_eq!(symptoms[0].symptom_type, Some(SymptomType::Bloating));
    assert_eq!(symptoms[0].triggers, vec!["dairy".to_string()]);
}

#[tokio::test]
async fn medications_envelope_alias() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/medications"))
        .and(query_param("userId", "u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "medications": [
                {"id": 9, "name": "Psyllium", "category": "SUPPLEMENTS", "startDate": "2025-02-01T00:00:00Z", "isActive": true}
            ]
        })))
        .mount(&mock_server)
        .await;

    let meds = repo(&mock_server)
        .fetch_medications("u1")
        .await
        .expect("fetch");
    assert_eq!(meds.len(), 1);
    assert_eq!(meds[0].category, Some(MedicationCategory::Supplements));
    assert!(meds[0].is_active);
    assert!(meds[0].end_date.is_none());
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/medications"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = repo(&mock_server)
        .fetch_medications("u1")
        .await
        .unwrap_err();
    match err {
        RepositoryError::Unauthorized(body) => assert_eq!(body, "token expired"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/symptoms"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/symptoms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&mock_server)
        .await;

    let symptoms = repo(&mock_server)
        .fetch_symptoms("u1", ts("2025-03-01T00:00:00Z"), ts("2025-03-02T00:00:00Z"))
        .await
        .expect("retried fetch");
    assert!(symptoms.is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let err = repo(&mock_server)
        .fetch_meals("u1", ts("2025-03-01T00:00:00Z"), ts("2025-03-02T00:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Decode(_)));
}
