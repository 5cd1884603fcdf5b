use ledger_frontend::config::BackendSettings;
use ledger_frontend::models::auth::SignUpMetadata;
use ledger_frontend::services::backend_client::{BackendClient, Query, PAGE_SIZE};
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::error::AppError;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, redirect: Option<&str>) -> BackendClient {
    BackendClient::new(&BackendSettings {
        url: format!("{}/", server.uri()),
        anon_key: Secret::new("anon-key".to_string()),
        email_redirect_url: redirect.map(str::to_string),
    })
}

#[tokio::test]
async fn select_sends_filters_and_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .and(query_param("select", "customer_id,customer_name"))
        .and(query_param("customer_id", "eq.7"))
        .and(query_param("order", "customer_name.asc"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "customer_id": 7, "customer_name": "Maria" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let query = Query::new()
        .select("customer_id, customer_name")
        .eq("customer_id", 7)
        .order("customer_name", true);
    let rows: Vec<Value> = client(&server, None)
        .select("user-token", "customers", &query)
        .await
        .unwrap();

    assert_eq!(rows, vec![json!({ "customer_id": 7, "customer_name": "Maria" })]);
}

#[tokio::test]
async fn fetch_all_pages_until_a_short_page() {
    let server = MockServer::start().await;
    let full_page: Vec<Value> = (0..PAGE_SIZE).map(|i| json!({ "sale_id": i })).collect();
    Mock::given(method("GET"))
        .and(path("/rest/v1/sales"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", PAGE_SIZE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_page))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/sales"))
        .and(query_param("offset", PAGE_SIZE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "sale_id": -1 }])))
        .expect(1)
        .mount(&server)
        .await;

    let rows: Vec<Value> = client(&server, None)
        .fetch_all("user-token", "sales", &Query::new().select("sale_id"))
        .await
        .unwrap();

    assert_eq!(rows.len(), PAGE_SIZE + 1);
    assert_eq!(rows.last(), Some(&json!({ "sale_id": -1 })));
}

#[tokio::test]
async fn insert_asks_for_the_stored_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({ "customer_id": 3, "amount": "25.00" })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([{ "payment_id": 11, "customer_id": 3, "amount": 25.0 }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stored: Vec<Value> = client(&server, None)
        .insert(
            "user-token",
            "payments",
            &json!({ "customer_id": 3, "amount": "25.00" }),
        )
        .await
        .unwrap();

    assert_eq!(stored[0]["payment_id"], json!(11));
}

#[tokio::test]
async fn rejected_requests_map_onto_app_errors() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/sales"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let backend = client(&server, None);

    let err = backend
        .update::<_, Value>("t", "profiles", &Query::new().eq("id", 1), &json!({ "username": "ana" }))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.user_message(), "duplicate key value violates unique constraint");

    let err = backend
        .delete("t", "sales", &Query::new().eq("sale_id", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = backend
        .select::<Value>("t", "customers", &Query::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadGateway(_)));
}

#[tokio::test]
async fn bad_credentials_are_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, None)
        .sign_in_with_password("ana@loja.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AuthError(_)));
    assert_eq!(err.user_message(), "Invalid login credentials");
}

#[tokio::test]
async fn sign_up_sends_metadata_and_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(query_param("redirect_to", "https://vendas.example.com/login"))
        .and(body_json(json!({
            "email": "ana@loja.com",
            "password": "segredo",
            "data": {
                "full_name": "Ana Souza",
                "username": "ana.s",
                "phone": "(11) 98765-4321"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = SignUpMetadata {
        full_name: "Ana Souza".into(),
        username: "ana.s".into(),
        phone: "(11) 98765-4321".into(),
        birthday: None,
    };
    client(&server, Some("https://vendas.example.com/login"))
        .sign_up("ana@loja.com", "segredo", &metadata)
        .await
        .unwrap();
}
