use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unavailable phase transition")]
pub struct TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Initialized,
    Started,
    Finished,
    Errored,
}

/// Lifecycle guard for one sub-operation. Legal transitions are
/// `Initialized → Started → Finished`; any illegal move lands in `Errored`
/// and reports a transition error. `Errored` is terminal.
#[derive(Debug)]
pub struct Phase {
    state: Mutex<OperationPhase>,
}

impl Default for Phase {
    fn default() -> Self {
        Self {
            state: Mutex::new(OperationPhase::Initialized),
        }
    }
}

impl Phase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Result<(), TransitionError> {
        self.transition(OperationPhase::Started)
    }

    pub fn finish(&self) -> Result<(), TransitionError> {
        self.transition(OperationPhase::Finished)
    }

    pub fn error(&self) {
        let _ = self.transition(OperationPhase::Errored);
    }

    pub fn status_code(&self) -> OperationPhase {
        *self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn status(&self) -> &'static str {
        match self.status_code() {
            OperationPhase::Initialized => "Initialized",
            OperationPhase::Started => "Started",
            OperationPhase::Finished => "Finished",
            OperationPhase::Errored => "Errored",
        }
    }

    pub fn running(&self) -> bool {
        self.status_code() == OperationPhase::Started
    }

    pub fn complete(&self) -> bool {
        self.status_code() == OperationPhase::Finished
    }

    pub fn errored(&self) -> bool {
        self.status_code() == OperationPhase::Errored
    }

    fn transition(&self, to: OperationPhase) -> Result<(), TransitionError> {
        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

        let valid_target = match *state {
            OperationPhase::Initialized => OperationPhase::Started,
            OperationPhase::Started => OperationPhase::Finished,
            OperationPhase::Finished => {
                *state = OperationPhase::Errored;
                return Err(TransitionError);
            }
            OperationPhase::Errored => return Ok(()),
        };

        if to != valid_target && to != OperationPhase::Errored {
            *state = OperationPhase::Errored;
            return Err(TransitionError);
        }

        *state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_starts_from_initialized() {
        let phase = Phase::new();
        assert!(phase.start().is_ok());
        assert!(phase.running());
        assert_eq!(phase.status(), "Started");
    }

    #[test]
    fn it_finishes_from_started() {
        let phase = Phase::new();
        phase.start().unwrap();
        assert!(phase.finish().is_ok());
        assert!(phase.complete());
    }

    #[test]
    fn it_rejects_finishing_before_starting() {
        let phase = Phase::new();
        assert_eq!(phase.finish(), Err(TransitionError));
        assert!(phase.errored());
    }

    #[test]
    fn it_errors_on_any_transition_out_of_finished() {
        let phase = Phase::new();
        phase.start().unwrap();
        phase.finish().unwrap();

        assert_eq!(phase.start(), Err(TransitionError));
        assert!(phase.errored());

        let phase = Phase::new();
        phase.start().unwrap();
        phase.finish().unwrap();

        assert_eq!(phase.finish(), Err(TransitionError));
        assert!(phase.errored());
    }

    #[test]
    fn it_can_error_from_any_non_terminal_state() {
        let phase = Phase::new();
        phase.error();
        assert!(phase.errored());

        let phase = Phase::new();
        phase.start().unwrap();
        phase.error();
        assert!(phase.errored());
    }

    #[test]
    fn it_stays_errored() {
        let phase = Phase::new();
        phase.error();
        assert!(phase.start().is_ok());
        assert!(phase.errored());
    }
}
