//! Controller state machine.
//!
//! `Idle -> Sending -> StreamingResponse -> Idle` for a successful exchange,
//! `Idle -> Sending -> Error -> Idle` (possibly via `StreamingResponse`)
//! for a failed one.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    /// Request sent, no content yet
    Sending,
    StreamingResponse,
    /// Failure being surfaced; left as soon as subscribers are told
    Error,
}

/// Inputs that move the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Send,
    Delta,
    Commit,
    Fail,
    Acknowledge,
    Reset,
}

impl ControllerState {
    /// Next state, or `None` when the transition is not allowed here
    pub fn next(self, transition: Transition) -> Option<ControllerState> {
        use ControllerState::*;
        use Transition::*;

        match (self, transition) {
            (_, Reset) => Some(Idle),
            (Idle, Send) => Some(Sending),
            (Sending | StreamingResponse, Delta) => Some(StreamingResponse),
            (Sending | StreamingResponse, Commit) => Some(Idle),
            (Sending | StreamingResponse, Fail) => Some(Error),
            (Error, Acknowledge) => Some(Idle),
            _ => None,
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Idle => "idle",
            ControllerState::Sending => "sending",
            ControllerState::StreamingResponse => "streaming",
            ControllerState::Error => "error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControllerState::*;
    use Transition::*;

    #[test]
    fn test_happy_path() {
        let state = Idle.next(Send).unwrap();
        assert_eq!(state, Sending);
        let state = state.next(Delta).unwrap();
        assert_eq!(state, StreamingResponse);
        assert_eq!(state.next(Delta), Some(StreamingResponse));
        assert_eq!(state.next(Commit), Some(Idle));
    }

    #[test]
    fn test_failure_path() {
        assert_eq!(Sending.next(Fail), Some(Error));
        assert_eq!(StreamingResponse.next(Fail), Some(Error));
        assert_eq!(Error.next(Acknowledge), Some(Idle));
    }

    #[test]
    fn test_rejected_transitions() {
        assert_eq!(Sending.next(Send), None);
        assert_eq!(StreamingResponse.next(Send), None);
        assert_eq!(Idle.next(Delta), None);
        assert_eq!(Idle.next(Commit), None);
        assert_eq!(Error.next(Send), None);
        assert_eq!(Idle.next(Acknowledge), None);
    }

    #[test]
    fn test_reset_from_anywhere() {
        for state in [Idle, Sending, StreamingResponse, Error] {
            assert_eq!(state.next(Reset), Some(Idle));
        }
    }
}
