pub mod error;
pub mod establisher;
pub mod flows;
pub mod guard;
pub mod password_update;
pub mod request;

#[cfg(test)]
pub(crate) mod testing;

pub use error::RecoveryError;
pub use establisher::{FailureReason, RecoveryEstablisher, RecoveryOutcome, Strategy};
pub use flows::{FLOW_ID_KEY, FlowRegistry, RecoveryFlow};
pub use password_update::{PasswordUpdateWorkflow, PasswordUpdated};
pub use request::{RecoveryAck, RecoveryRequestWorkflow};
