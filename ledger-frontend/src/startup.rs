use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::ip_rate_limit_middleware,
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware},
};
use time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::handlers::{
    admin, app, auth, customers, dashboard, export, metrics, payments, sales,
};
use crate::middleware::auth::require_admin;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.settings.server.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)));

    // Credential endpoints share one per-IP budget.
    let credential_routes = Router::new()
        .route("/login", post(auth::login_handler))
        .route("/request-access", post(auth::request_access_handler))
        .route("/forgot-password", post(auth::forgot_password_handler))
        .route("/reset-password", post(auth::reset_password_handler))
        .route_layer(from_fn_with_state(
            state.auth_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", post(admin::update_user))
        .route("/admin/users/:id/approval", post(admin::set_approval))
        .route("/admin/users/:id/active", post(admin::set_active))
        .route("/admin/users/:id/reset-password", post(admin::send_reset))
        .route("/export/profiles", get(export::export_profiles))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/", get(app::index))
        .route("/health", get(app::health_check))
        .route("/metrics", get(metrics::metrics))
        .route("/login", get(auth::login_page))
        .route("/logout", get(auth::logout_handler).post(auth::logout_handler))
        .route("/request-access", get(auth::request_access_page))
        .route("/account/password", post(auth::change_password_handler))
        .route("/dashboard", get(dashboard::dashboard_handler))
        .route(
            "/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(customers::customer_detail)
                .post(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route("/sales", get(sales::list_sales).post(sales::create_sale))
        .route(
            "/sales/:id",
            get(sales::sale_detail)
                .post(sales::update_sale)
                .delete(sales::delete_sale),
        )
        .route("/sales/:id/settled", post(sales::toggle_settled))
        .route("/sales/:id/items", get(sales::sale_items))
        .route(
            "/payments",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route(
            "/payments/:id",
            get(payments::get_payment)
                .post(payments::update_payment)
                .delete(payments::delete_payment),
        )
        .route("/export/customers", get(export::export_customers))
        .route("/export/sales", get(export::export_sales))
        .route("/export/sale-items", get(export::export_sale_items))
        .route("/export/payments", get(export::export_payments))
        .merge(credential_routes)
        .merge(admin_routes)
        .nest_service(
            "/static",
            ServeDir::new(state.settings.server.static_dir.clone()),
        )
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
