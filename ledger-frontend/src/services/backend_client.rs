//! Client for the hosted database (PostgREST) and auth service (GoTrue).
//!
//! One instance is built per process from the configured project URL and
//! public API key. Every call carries the `apikey` header plus a bearer
//! token, which is the signed-in user's access token when there is one.

use crate::config::BackendSettings;
use crate::domain::authz::OwnerScope;
use crate::models::auth::{AuthSession, AuthUserRecord, SignUpMetadata};
use metrics::{counter, histogram};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::observability::{TracedClientExt, TracedRequest};
use std::fmt::Display;
use std::time::Instant;

/// Rows fetched per request when paging through a whole table.
pub const PAGE_SIZE: usize = 2000;

/// Paged fetches abort once more rows than this have been collected.
pub const MAX_PAGED_ROWS: usize = 5_000_000;

/// Filters and modifiers for a single PostgREST request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.split_whitespace().collect::<Vec<_>>().join(""));
        self
    }

    fn filter(mut self, column: &str, expression: String) -> Self {
        self.filters.push((column.to_string(), expression));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("eq.{}", value))
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("neq.{}", value))
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("gte.{}", value))
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("lte.{}", value))
    }

    pub fn lt(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("lt.{}", value))
    }

    pub fn in_list<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        let list = values
            .into_iter()
            .map(|v| quote_list_value(&v.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, format!("in.({})", list))
    }

    pub fn not_null(self, column: &str) -> Self {
        self.filter(column, "not.is.null".to_string())
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(format!(
            "{}.{}",
            column,
            if ascending { "asc" } else { "desc" }
        ));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Restrict to rows whose `created_by` the scope permits.
    pub fn owned_by(self, scope: &OwnerScope) -> Self {
        match scope {
            OwnerScope::All => self,
            OwnerScope::Only(id) => self.eq("created_by", id),
            OwnerScope::Creators(ids) => self.in_list("created_by", ids),
        }
    }

    /// Query-string pairs in PostgREST form.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 4);
        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        pairs.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            pairs.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        pairs
    }
}

fn quote_list_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Shared handle to the hosted backend.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: Secret<String>,
    email_redirect_url: Option<String>,
}

impl BackendClient {
    pub fn new(settings: &BackendSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.clone(),
            email_redirect_url: settings.email_redirect_url.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public key, used as the bearer for reads made before sign-in.
    pub fn anon_token(&self) -> &str {
        self.anon_key.expose_secret()
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn authorize(&self, request: TracedRequest, access_token: Option<&str>) -> TracedRequest {
        let anon: &str = self.anon_key.expose_secret();
        request
            .header("apikey", anon)
            .bearer_auth(access_token.unwrap_or(anon))
    }

    /// Send, record metrics and map non-2xx statuses onto `AppError`.
    async fn execute(&self, operation: &str, request: TracedRequest) -> Result<Response, AppError> {
        let start = Instant::now();
        let result = request.send().await;
        let status = match &result {
            Ok(response) => response.status().as_u16().to_string(),
            Err(_) => "transport_error".to_string(),
        };

        let labels = [("operation", operation.to_string()), ("status", status)];
        counter!("backend_requests_total", &labels).increment(1);
        histogram!("backend_request_duration_seconds", &labels)
            .record(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            tracing::error!(operation = %operation, error = %e, "Backend request failed");
            AppError::BadGateway(e.to_string())
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = backend_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("backend error")
                .to_string()
        });
        tracing::warn!(operation = %operation, status = %status, message = %message, "Backend rejected request");
        Err(map_status(status, message))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::BadGateway(format!("Invalid backend response: {}", e)))
    }

    // ---- REST ----

    pub async fn select<T: DeserializeOwned>(
        &self,
        access_token: &str,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, AppError> {
        let request = self
            .client
            .traced_get(&self.rest_url(table))
            .query(&query.to_pairs());
        let response = self
            .execute("select", self.authorize(request, Some(access_token)))
            .await?;
        Self::decode(response).await
    }

    pub async fn select_one<T: DeserializeOwned>(
        &self,
        access_token: &str,
        table: &str,
        query: &Query,
    ) -> Result<Option<T>, AppError> {
        let rows = self
            .select::<T>(access_token, table, &query.clone().limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Fetch every matching row, `PAGE_SIZE` rows at a time.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        access_token: &str,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, AppError> {
        let mut rows = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .select::<T>(
                    access_token,
                    table,
                    &query.clone().limit(PAGE_SIZE).offset(offset),
                )
                .await?;
            let fetched = page.len();
            rows.extend(page);
            if fetched < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
            if rows.len() > MAX_PAGED_ROWS {
                tracing::warn!(table = %table, rows = rows.len(), "Paged fetch aborted");
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Export too large, aborting"
                )));
            }
        }
        Ok(rows)
    }

    /// Insert rows and return them as stored.
    pub async fn insert<B, T>(
        &self,
        access_token: &str,
        table: &str,
        rows: &B,
    ) -> Result<Vec<T>, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .traced_post(&self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(rows);
        let response = self
            .execute("insert", self.authorize(request, Some(access_token)))
            .await?;
        Self::decode(response).await
    }

    /// Patch every row matching `query`'s filters and return the updated rows.
    pub async fn update<B, T>(
        &self,
        access_token: &str,
        table: &str,
        query: &Query,
        changes: &B,
    ) -> Result<Vec<T>, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .traced_patch(&self.rest_url(table))
            .query(&query.to_pairs())
            .header("Prefer", "return=representation")
            .json(changes);
        let response = self
            .execute("update", self.authorize(request, Some(access_token)))
            .await?;
        Self::decode(response).await
    }

    pub async fn delete(&self, access_token: &str, table: &str, query: &Query) -> Result<(), AppError> {
        let request = self
            .client
            .traced_delete(&self.rest_url(table))
            .query(&query.to_pairs());
        self.execute("delete", self.authorize(request, Some(access_token)))
            .await?;
        Ok(())
    }

    // ---- Auth ----

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AppError> {
        let request = self
            .client
            .traced_post(&self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let response = self
            .execute("sign_in", self.authorize(request, None))
            .await
            .map_err(into_auth_error)?;
        Self::decode(response).await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        let request = self
            .client
            .traced_post(&self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        let response = self
            .execute("refresh", self.authorize(request, None))
            .await
            .map_err(into_auth_error)?;
        Self::decode(response).await
    }

    /// Register a user; confirmation mail links back to `email_redirect_url`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Value, AppError> {
        let mut request = self.client.traced_post(&self.auth_url("signup"));
        if let Some(redirect) = &self.email_redirect_url {
            request = request.query(&[("redirect_to", redirect.as_str())]);
        }
        let request = request.json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        let response = self.execute("sign_up", self.authorize(request, None)).await?;
        Self::decode(response).await
    }

    pub async fn send_password_recovery(&self, email: &str) -> Result<(), AppError> {
        let mut request = self.client.traced_post(&self.auth_url("recover"));
        if let Some(redirect) = &self.email_redirect_url {
            request = request.query(&[("redirect_to", redirect.as_str())]);
        }
        let request = request.json(&json!({ "email": email }));
        self.execute("recover", self.authorize(request, None)).await?;
        Ok(())
    }

    pub async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<AuthUserRecord, AppError> {
        let request = self
            .client
            .traced_put(&self.auth_url("user"))
            .json(&json!({ "password": new_password }));
        let response = self
            .execute("update_user", self.authorize(request, Some(access_token)))
            .await?;
        Self::decode(response).await
    }

    pub async fn get_user(&self, access_token: &str) -> Result<AuthUserRecord, AppError> {
        let request = self.client.traced_get(&self.auth_url("user"));
        let response = self
            .execute("get_user", self.authorize(request, Some(access_token)))
            .await?;
        Self::decode(response).await
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let request = self.client.traced_post(&self.auth_url("logout"));
        self.execute("sign_out", self.authorize(request, Some(access_token)))
            .await?;
        Ok(())
    }
}

/// Pull a human message out of a PostgREST or GoTrue error body.
fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn map_status(status: StatusCode, message: String) -> AppError {
    let err = anyhow::anyhow!(message.clone());
    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(err),
        StatusCode::FORBIDDEN => AppError::Forbidden(err),
        StatusCode::NOT_FOUND => AppError::NotFound(err),
        StatusCode::CONFLICT => AppError::Conflict(err),
        StatusCode::TOO_MANY_REQUESTS => AppError::TooManyRequests(message, None),
        s if s.is_client_error() => AppError::BadRequest(err),
        _ => AppError::BadGateway(message),
    }
}

/// Grant failures come back as 400; surface them as authentication errors.
fn into_auth_error(err: AppError) -> AppError {
    match err {
        AppError::BadRequest(e) | AppError::Unauthorized(e) => AppError::AuthError(e),
        other => other,
    }
}
