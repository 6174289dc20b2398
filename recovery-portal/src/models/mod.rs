pub mod password;
pub mod recovery_link;
pub mod session;

pub use password::{PasswordCandidate, PasswordPolicy, PolicyViolation};
pub use recovery_link::{LinkKind, RecoveryLink};
pub use session::{SessionInfo, SessionState, SessionView};
