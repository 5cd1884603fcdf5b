use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{configuration_directory, load_layered};
use service_core::error::AppError;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`; enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_static_dir() -> String {
    "ledger-frontend/static".to_string()
}

/// Hosted database and auth service.
#[derive(Deserialize, Clone)]
pub struct BackendSettings {
    /// Project URL; REST lives under `/rest/v1`, auth under `/auth/v1`.
    pub url: String,
    /// Public (anon) API key sent as `apikey` on every call.
    pub anon_key: Secret<String>,
    /// Where confirmation and recovery emails send the browser back to.
    #[serde(default)]
    pub email_redirect_url: Option<String>,
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Per-IP budget for login and sign-up attempts.
#[derive(Deserialize, Clone)]
pub struct RateLimitSettings {
    pub attempts: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            window_seconds: 15,
        }
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()?;
    let directory = configuration_directory(&base_path, "ledger-frontend");
    load_layered(&directory)
}
