//! Worker registration states and transitions.

use std::sync::{Arc, Mutex};

use url::Url;

use crate::worker::error::{invalid_transition, WorkerResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Script parsed, install not yet started.
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install or activation failed, or the worker was replaced.
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;

    matches!(
        (from, to),
        (Parsed, Installing)
            | (Installing, Installed)
            | (Installing, Redundant)
            | (Installed, Activating)
            | (Activating, Activated)
            | (Activating, Redundant)
            | (Activated, Redundant)
    )
}

/// Shared handle to one worker registration.
///
/// Ownership of transitions is exclusive to the controller; everything else
/// only reads the state.
#[derive(Clone)]
pub struct WorkerRegistration {
    inner: Arc<RegistrationInner>,
}

struct RegistrationInner {
    scope: Url,
    state: Mutex<WorkerState>,
}

impl WorkerRegistration {
    pub(crate) fn new(scope: Url) -> Self {
        Self {
            inner: Arc::new(RegistrationInner {
                scope,
                state: Mutex::new(WorkerState::Parsed),
            }),
        }
    }

    pub fn scope(&self) -> &Url {
        &self.inner.scope
    }

    pub fn state(&self) -> WorkerState {
        *self.inner.state.lock().unwrap()
    }

    pub fn is_active(&self) -> bool {
        self.state() == WorkerState::Activated
    }

    pub(crate) fn transition(&self, to: WorkerState) -> WorkerResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        if !is_valid_transition(*state, to) {
            return Err(invalid_transition(format!(
                "cannot move worker from {} to {}",
                *state, to
            )));
        }
        *state = to;
        Ok(())
    }
}

impl std::fmt::Debug for WorkerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistration")
            .field("scope", &self.inner.scope.as_str())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> WorkerRegistration {
        WorkerRegistration::new(Url::parse("https://app.test/").unwrap())
    }

    #[test]
    fn full_lifecycle_is_valid() {
        let reg = registration();
        reg.transition(WorkerState::Installing).unwrap();
        reg.transition(WorkerState::Installed).unwrap();
        reg.transition(WorkerState::Activating).unwrap();
        reg.transition(WorkerState::Activated).unwrap();
        assert!(reg.is_active());
    }

    #[test]
    fn skipping_install_is_rejected() {
        let reg = registration();
        let err = reg.transition(WorkerState::Activated).unwrap_err();
        assert_eq!(err.code_str(), "worker/invalid-transition");
        assert_eq!(reg.state(), WorkerState::Parsed);
    }

    #[test]
    fn failed_install_lands_in_redundant() {
        let reg = registration();
        reg.transition(WorkerState::Installing).unwrap();
        reg.transition(WorkerState::Redundant).unwrap();
        assert_eq!(reg.state(), WorkerState::Redundant);
        assert!(reg.transition(WorkerState::Installed).is_err());
    }

    #[test]
    fn clones_observe_the_same_state() {
        let reg = registration();
        let observer = reg.clone();
        reg.transition(WorkerState::Installing).unwrap();
        assert_eq!(observer.state(), WorkerState::Installing);
    }
}
