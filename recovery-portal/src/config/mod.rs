use crate::models::password::PasswordPolicy;
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub platform: PlatformSettings,
    #[serde(default)]
    pub recovery: RecoverySettings,
    #[serde(default)]
    pub password_policy: PasswordPolicy,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Browser-facing origin of the portal, used to build the link the
    /// platform puts in recovery emails (e.g. https://hr.example.com).
    pub public_url: String,
    /// Mark the session cookie `Secure`. Enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    /// Key rate limits on `X-Forwarded-For`. Only enable behind a proxy that
    /// overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

#[derive(Deserialize, Clone)]
pub struct PlatformSettings {
    /// Base URL of the hosted auth platform (e.g. https://xyz.supabase.co).
    pub url: String,
    /// Public (anon) API key sent as the `apikey` header on every call.
    pub anon_key: Secret<String>,
    /// Transport-level timeout for a single HTTP call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl PlatformSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct RecoverySettings {
    /// Path of the recovery-link handler that emailed links point back to.
    pub return_path: String,
    /// Where the browser goes once the password has been changed.
    pub redirect_path: String,
    pub redirect_delay_secs: u64,
    /// Upper bound for each session-service call made by the workflows.
    pub call_timeout_ms: u64,
    /// Idle recovery flows older than this are dropped.
    pub flow_ttl_secs: u64,
    /// Upper bound on live flows; the oldest is evicted beyond it.
    pub max_flows: usize,
    pub request_rate_limit: RateLimitSettings,
    /// Per-IP budget for `GET /reset-password`.
    pub landing_rate_limit: RateLimitSettings,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            return_path: "/reset-password".to_string(),
            redirect_path: "/login".to_string(),
            redirect_delay_secs: 3,
            call_timeout_ms: 5_000,
            flow_ttl_secs: 900,
            max_flows: 10_000,
            request_rate_limit: RateLimitSettings::default(),
            landing_rate_limit: RateLimitSettings {
                attempts: 30,
                window_seconds: 60,
            },
        }
    }
}

impl RecoverySettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_secs(self.redirect_delay_secs)
    }

    pub fn flow_ttl(&self) -> Duration {
        Duration::from_secs(self.flow_ttl_secs)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct RateLimitSettings {
    pub attempts: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            window_seconds: 3600,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP gRPC endpoint (e.g. http://tempo:4317); span export is off when unset.
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

impl Settings {
    /// Absolute URL of the recovery-link handler, handed to the platform as
    /// the email's return address.
    pub fn recovery_return_url(&self) -> String {
        format!(
            "{}{}",
            self.server.public_url.trim_end_matches('/'),
            self.recovery.return_path
        )
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("cannot read current dir: {}", e)))?;

    // Running from the workspace root or from the crate directory both work.
    let configuration_directory = if base_path.ends_with("recovery-portal") {
        base_path.join("config")
    } else {
        base_path.join("recovery-portal").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
