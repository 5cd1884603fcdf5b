use ledger_frontend::config::BackendSettings;
use ledger_frontend::domain::authz::OwnerScope;
use ledger_frontend::models::profile::ProfileWrite;
use ledger_frontend::services::backend_client::BackendClient;
use ledger_frontend::services::repository::ProfileFlag;
use ledger_frontend::services::{LedgerFilter, LedgerRepository};
use secrecy::Secret;
use serde_json::json;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn repository(server: &MockServer) -> LedgerRepository {
    LedgerRepository::new(Arc::new(BackendClient::new(&BackendSettings {
        url: format!("{}/", server.uri()),
        anon_key: Secret::new("anon-key".to_string()),
        email_redirect_url: None,
    })))
}

fn id_list(ids: impl Iterator<Item = i64>) -> String {
    let joined = ids.map(|id| id.to_string()).collect::<Vec<_>>().join(",");
    format!("in.({})", joined)
}

#[tokio::test]
async fn exports_page_in_key_order() {
    let server = MockServer::start().await;
    for (table, order) in [
        ("customers", "customer_id.asc"),
        ("sales", "sale_id.asc"),
        ("payments", "payment_id.asc"),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/rest/v1/{}", table)))
            .and(query_param("order", order))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "x": 1 }])))
            .expect(1)
            .mount(&server)
            .await;
    }
    let repository = repository(&server);

    for table in ["customers", "sales", "payments"] {
        let rows = repository
            .export_rows("user-token", table, &OwnerScope::All, &LedgerFilter::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1, "{}", table);
    }
}

#[tokio::test]
async fn profile_export_breaks_created_at_ties_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/v_app_users"))
        .and(query_param("order", "created_at.desc,id.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = repository(&server).export_profiles("user-token").await.unwrap();

    assert!(rows.is_empty());
}

#[tokio::test]
async fn customer_sales_are_fetched_in_id_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/sales"))
        .and(query_param("customer_id", id_list(1..=300)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "sale_id": 9, "customer_id": 300 }])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/sales"))
        .and(query_param("customer_id", id_list(301..=301)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "sale_id": 4, "customer_id": 301 }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ids: Vec<i64> = (1..=301).collect();
    let sales = repository(&server)
        .sales_for_customers("user-token", &ids, &LedgerFilter::default())
        .await
        .unwrap();

    let sale_ids: Vec<i64> = sales.iter().map(|s| s.sale_id).collect();
    assert_eq!(sale_ids, vec![4, 9]);
}

#[tokio::test]
async fn no_customers_means_no_payment_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let payments = repository(&server)
        .payments_for_customers("user-token", &[], &LedgerFilter::default())
        .await
        .unwrap();

    assert!(payments.is_empty());
}

#[tokio::test]
async fn profile_updates_matching_no_row_are_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;
    let repository = repository(&server);
    let id = Uuid::new_v4();

    let err = repository
        .set_profile_flag("user-token", id, ProfileFlag::Active, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = repository
        .update_profile(
            "user-token",
            id,
            &ProfileWrite {
                full_name: Some("Ana".to_string()),
                username: None,
                phone: None,
                birthday: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn profile_flag_update_succeeds_when_a_row_changes() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": id, "is_approved": true }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    repository(&server)
        .set_profile_flag("user-token", id, ProfileFlag::Approved, true)
        .await
        .unwrap();
}
