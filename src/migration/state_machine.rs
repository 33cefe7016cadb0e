use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{MigrationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Constructed,
    AwaitingChannels,
    Transferring,
    Succeeded,
    Failed,
}

impl Default for MigrationState {
    fn default() -> Self {
        MigrationState::Constructed
    }
}

#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from_state: MigrationState,
    pub to_state: MigrationState,
    pub timestamp: SystemTime,
    pub reason: Option<String>,
}

/// Lifecycle of one migration session. Cloned handles observe the same state.
#[derive(Clone)]
pub struct MigrationStateMachine {
    current_state: Arc<RwLock<MigrationState>>,
    session_id: Uuid,
    transitions: Arc<RwLock<Vec<StateTransition>>>,
    created_at: SystemTime,
}

impl MigrationStateMachine {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            current_state: Arc::new(RwLock::new(MigrationState::default())),
            session_id,
            transitions: Arc::new(RwLock::new(Vec::new())),
            created_at: SystemTime::now(),
        }
    }

    pub async fn get_state(&self) -> MigrationState {
        *self.current_state.read().await
    }

    pub async fn transition_to(
        &self,
        new_state: MigrationState,
        reason: Option<String>,
    ) -> Result<()> {
        let mut current = self.current_state.write().await;

        if !Self::is_valid_transition(*current, new_state) {
            return Err(MigrationError::InvalidTransition {
                from: *current,
                to: new_state,
            });
        }

        let transition = StateTransition {
            from_state: *current,
            to_state: new_state,
            timestamp: SystemTime::now(),
            reason,
        };

        self.transitions.write().await.push(transition);
        *current = new_state;

        Ok(())
    }

    pub async fn await_channels(&self) -> Result<()> {
        self.transition_to(
            MigrationState::AwaitingChannels,
            Some("Waiting for migration channels".to_string()),
        )
        .await
    }

    pub async fn start_transfer(&self) -> Result<()> {
        self.transition_to(
            MigrationState::Transferring,
            Some("Migration channels connected".to_string()),
        )
        .await
    }

    pub async fn succeed(&self) -> Result<()> {
        self.transition_to(MigrationState::Succeeded, Some("Migration completed".to_string()))
            .await
    }

    pub async fn fail(&self, reason: String) -> Result<()> {
        self.transition_to(MigrationState::Failed, Some(reason)).await
    }

    fn is_valid_transition(from: MigrationState, to: MigrationState) -> bool {
        use MigrationState::*;

        matches!(
            (from, to),
            (Constructed, AwaitingChannels)
                | (AwaitingChannels, Transferring)
                | (AwaitingChannels, Failed)
                | (Transferring, Succeeded)
                | (Transferring, Failed)
        )
    }

    pub async fn is_in_progress(&self) -> bool {
        matches!(
            self.get_state().await,
            MigrationState::AwaitingChannels | MigrationState::Transferring
        )
    }

    pub async fn is_terminal_state(&self) -> bool {
        matches!(self.get_state().await, MigrationState::Succeeded | MigrationState::Failed)
    }

    pub async fn get_transition_history(&self) -> Vec<StateTransition> {
        self.transitions.read().await.clone()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.created_at)
            .unwrap_or(Duration::ZERO)
    }

    pub async fn summary(&self) -> String {
        format!(
            "Migration {} - State: {:?}, Age: {:?}",
            self.session_id,
            self.get_state().await,
            self.age()
        )
    }
}
