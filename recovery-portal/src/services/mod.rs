pub mod metrics;
pub mod platform_client;
pub mod platform_session;
pub mod session_service;

pub use platform_client::AuthPlatformClient;
pub use platform_session::PlatformSession;
pub use session_service::{ProofKind, ServiceFailure, SessionService};
