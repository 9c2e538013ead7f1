use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

/// Analyzer lifecycle. There are no intermediate states; reconfiguration
/// happens in place while Running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    Idle,
    Running,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid state transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: AnalyzerState,
    pub to: AnalyzerState,
}

pub struct StateManager {
    state: Arc<RwLock<AnalyzerState>>,
    state_tx: Sender<AnalyzerState>,
    state_rx: Receiver<AnalyzerState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(AnalyzerState::Idle)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: AnalyzerState) -> Result<(), InvalidTransition> {
        let mut current = self.state.write();

        let valid = matches!(
            (*current, new_state),
            (AnalyzerState::Idle, AnalyzerState::Running)
                | (AnalyzerState::Running, AnalyzerState::Idle)
        );

        if !valid {
            return Err(InvalidTransition {
                from: *current,
                to: new_state,
            });
        }

        tracing::debug!("State transition: {:?} -> {:?}", *current, new_state);
        *current = new_state;
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> AnalyzerState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> Receiver<AnalyzerState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_running_round_trip() {
        let mgr = StateManager::new();
        assert_eq!(mgr.current(), AnalyzerState::Idle);
        mgr.transition(AnalyzerState::Running).unwrap();
        assert_eq!(mgr.current(), AnalyzerState::Running);
        mgr.transition(AnalyzerState::Idle).unwrap();
        assert_eq!(mgr.current(), AnalyzerState::Idle);
    }

    #[test]
    fn rejects_self_transition() {
        let mgr = StateManager::new();
        let err = mgr.transition(AnalyzerState::Idle).unwrap_err();
        assert_eq!(err.from, AnalyzerState::Idle);
        assert_eq!(err.to, AnalyzerState::Idle);
    }

    #[test]
    fn subscribers_observe_transitions() {
        let mgr = StateManager::new();
        let rx = mgr.subscribe();
        mgr.transition(AnalyzerState::Running).unwrap();
        assert_eq!(rx.try_recv().unwrap(), AnalyzerState::Running);
    }
}
