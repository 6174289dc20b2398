pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod recovery;
pub mod services;
pub mod startup;

use config::{RateLimitSettings, Settings};
use recovery::{FlowRegistry, RecoveryRequestWorkflow};
use service_core::middleware::rate_limit::{create_ip_rate_limiter, IpRateLimit};
use services::{AuthPlatformClient, PlatformSession};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub platform: Arc<AuthPlatformClient>,
    pub flows: Arc<FlowRegistry>,
    /// Forgot-password requests carry no session, so one workflow serves all browsers.
    pub reset_requests: Arc<RecoveryRequestWorkflow<PlatformSession>>,
    pub reset_request_limit: IpRateLimit,
    pub landing_limit: IpRateLimit,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let platform = Arc::new(AuthPlatformClient::new(&settings.platform));
        let flows = Arc::new(FlowRegistry::new(
            platform.clone(),
            settings.recovery.clone(),
            settings.password_policy.clone(),
        ));
        let reset_requests = Arc::new(RecoveryRequestWorkflow::new(
            Arc::new(PlatformSession::new(platform.clone())),
            settings.recovery_return_url(),
            settings.recovery.call_timeout(),
        ));

        let trust_forwarded_for = settings.server.trust_forwarded_for;
        let ip_limit = |limits: &RateLimitSettings| {
            IpRateLimit::new(
                create_ip_rate_limiter(limits.attempts, limits.window_seconds),
                trust_forwarded_for,
            )
        };
        let reset_request_limit = ip_limit(&settings.recovery.request_rate_limit);
        let landing_limit = ip_limit(&settings.recovery.landing_rate_limit);

        Self {
            settings: Arc::new(settings),
            platform,
            flows,
            reset_requests,
            reset_request_limit,
            landing_limit,
        }
    }
}
