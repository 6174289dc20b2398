//! Per-browser recovery state.
//!
//! A browser that lands with a recovery proof gets one [`RecoveryFlow`]
//! holding the platform session established from its link, the shared
//! [`SessionView`], and the update workflow acting on it. The browser only
//! carries the flow id (in its tower-sessions cookie session); reloading the
//! landing page finds the same flow again. The registry is bounded by age and
//! by `recovery.max_flows`.

use crate::config::RecoverySettings;
use crate::models::{PasswordCandidate, PasswordPolicy, RecoveryLink, SessionView};
use crate::recovery::error::RecoveryError;
use crate::recovery::establisher::{RecoveryEstablisher, RecoveryOutcome};
use crate::recovery::password_update::{PasswordUpdateWorkflow, PasswordUpdated};
use crate::services::{AuthPlatformClient, PlatformSession};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Key under which the flow id is stored in the browser's session.
pub const FLOW_ID_KEY: &str = "recovery_flow_id";

pub struct RecoveryFlow {
    id: Uuid,
    created_at: Instant,
    view: SessionView,
    establisher: RecoveryEstablisher<PlatformSession>,
    updater: PasswordUpdateWorkflow<PlatformSession>,
    // Two tabs loading the same link must not interleave strategies.
    establishing: Mutex<()>,
}

impl RecoveryFlow {
    fn new(
        client: Arc<AuthPlatformClient>,
        settings: &RecoverySettings,
        policy: PasswordPolicy,
    ) -> Self {
        let session = Arc::new(PlatformSession::new(client));
        let view = SessionView::new();

        Self {
            id: Uuid::new_v4(),
            created_at: Instant::now(),
            establisher: RecoveryEstablisher::new(
                session.clone(),
                view.clone(),
                settings.call_timeout(),
            ),
            updater: PasswordUpdateWorkflow::new(session, view.clone(), policy, settings),
            view,
            establishing: Mutex::new(()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    pub fn policy(&self) -> &PasswordPolicy {
        self.updater.policy()
    }

    pub fn is_completed(&self) -> bool {
        self.updater.is_completed()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }

    pub async fn establish(&self, link: &RecoveryLink) -> RecoveryOutcome {
        let _serialized = self.establishing.lock().await;
        self.establisher.establish(link).await
    }

    pub async fn submit(
        &self,
        candidate: &PasswordCandidate,
    ) -> Result<PasswordUpdated, RecoveryError> {
        self.updater.submit(candidate).await
    }
}

pub struct FlowRegistry {
    flows: DashMap<Uuid, Arc<RecoveryFlow>>,
    client: Arc<AuthPlatformClient>,
    settings: RecoverySettings,
    policy: PasswordPolicy,
}

impl FlowRegistry {
    pub fn new(
        client: Arc<AuthPlatformClient>,
        settings: RecoverySettings,
        policy: PasswordPolicy,
    ) -> Self {
        Self {
            flows: DashMap::new(),
            client,
            settings,
            policy,
        }
    }

    /// The live flow with this id, if any. Expired flows are dropped on access.
    pub fn get(&self, id: &Uuid) -> Option<Arc<RecoveryFlow>> {
        let flow = self.flows.get(id).map(|entry| entry.value().clone())?;
        if flow.is_expired(self.settings.flow_ttl()) {
            self.flows.remove(id);
            return None;
        }
        Some(flow)
    }

    pub fn create(&self) -> Arc<RecoveryFlow> {
        self.sweep();
        while self.flows.len() >= self.settings.max_flows.max(1) {
            if !self.evict_oldest() {
                break;
            }
        }

        let flow = Arc::new(RecoveryFlow::new(
            self.client.clone(),
            &self.settings,
            self.policy.clone(),
        ));
        self.flows.insert(flow.id(), flow.clone());
        tracing::debug!(flow_id = %flow.id(), "Recovery flow created");
        flow
    }

    /// Reuse the browser's flow unless it is gone or already finished.
    pub fn get_or_create(&self, id: Option<Uuid>) -> Arc<RecoveryFlow> {
        id.and_then(|id| self.get(&id))
            .filter(|flow| !flow.is_completed())
            .unwrap_or_else(|| self.create())
    }

    pub fn remove(&self, id: &Uuid) {
        if self.flows.remove(id).is_some() {
            tracing::debug!(flow_id = %id, "Recovery flow removed");
        }
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .flows
            .iter()
            .min_by_key(|entry| entry.value().created_at)
            .map(|entry| *entry.key());

        match oldest {
            Some(id) => {
                self.flows.remove(&id);
                tracing::warn!(flow_id = %id, "Recovery flow limit reached, evicted oldest");
                true
            }
            None => false,
        }
    }

    fn sweep(&self) {
        let ttl = self.settings.flow_ttl();
        let before = self.flows.len();
        self.flows.retain(|_, flow| !flow.is_expired(ttl));
        let dropped = before.saturating_sub(self.flows.len());
        if dropped > 0 {
            tracing::debug!(dropped, "Expired recovery flows swept");
        }
    }
}
