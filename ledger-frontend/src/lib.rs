pub mod config;
pub mod domain;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use config::Settings;
use service_core::middleware::rate_limit::{create_ip_rate_limiter, IpRateLimiter};
use services::{BackendClient, LedgerRepository, SessionContext};
use std::sync::Arc;

/// Shared application state containing the backend handle and caches
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
    pub repository: LedgerRepository,
    pub sessions: Arc<SessionContext>,
    pub auth_limiter: IpRateLimiter,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let backend = Arc::new(BackendClient::new(&settings.backend));
        let auth_limiter = create_ip_rate_limiter(
            settings.rate_limit.attempts,
            settings.rate_limit.window_seconds,
        );
        Self {
            repository: LedgerRepository::new(backend.clone()),
            backend,
            sessions: SessionContext::new(),
            auth_limiter,
            settings: Arc::new(settings),
        }
    }
}
