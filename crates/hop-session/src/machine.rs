//! Driver states, the events that move between them, and the transition
//! table itself.
//!
//! `transition` is pure. The driver feeds it events observed on the
//! transport and performs whatever [`Action`] comes back. `Interactive` has
//! no outgoing edge on a cue, which is what makes the PIN gate one-way.

use std::fmt;

use crate::cue::CueKind;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why an attempt ended without reaching the handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The subordinate's output closed before the PIN prompt.
    StreamClosed,
    SpawnFailed(String),
    /// Writing to the subordinate failed.
    Transport(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::StreamClosed => write!(f, "closed"),
            RejectReason::SpawnFailed(msg) => write!(f, "spawn failed: {msg}"),
            RejectReason::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

/// Result of one `connect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Control was handed to the operator; the session has since ended.
    Established,
    TimedOut,
    Rejected(RejectReason),
    Cancelled,
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Established => write!(f, "session ended"),
            SessionOutcome::TimedOut => write!(f, "timeout waiting for gateway response"),
            SessionOutcome::Rejected(RejectReason::StreamClosed) => {
                write!(f, "connection closed by gateway")
            }
            SessionOutcome::Rejected(reason) => write!(f, "connection failed: {reason}"),
            SessionOutcome::Cancelled => write!(f, "connection cancelled by user"),
        }
    }
}

// ---------------------------------------------------------------------------
// States, events, actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Init,
    AwaitPattern,
    Interactive,
    Terminated(SessionOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Spawned,
    SpawnFailed(String),
    Cue(CueKind),
    WaitElapsed,
    StreamClosed,
    TransportFailed(String),
    Interrupted,
    SessionEnded,
}

/// Input the driver injects into the subordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Affirm,
    SendSecret,
    SendOtp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: DriverState,
    pub action: Option<Action>,
}

impl Transition {
    fn to(next: DriverState) -> Self {
        Self { next, action: None }
    }

    fn with(next: DriverState, action: Action) -> Self {
        Self {
            next,
            action: Some(action),
        }
    }

    fn terminate(outcome: SessionOutcome) -> Self {
        Self::to(DriverState::Terminated(outcome))
    }
}

pub fn transition(state: &DriverState, event: Event) -> Transition {
    use DriverState::*;

    match (state, event) {
        (Init, Event::Spawned) => Transition::to(AwaitPattern),
        (Init, Event::SpawnFailed(msg)) => {
            Transition::terminate(SessionOutcome::Rejected(RejectReason::SpawnFailed(msg)))
        }

        (AwaitPattern, Event::Cue(CueKind::HostKeyConfirm)) => {
            Transition::with(AwaitPattern, Action::Affirm)
        }
        (AwaitPattern, Event::Cue(CueKind::PasswordPrompt)) => {
            Transition::with(AwaitPattern, Action::SendSecret)
        }
        (AwaitPattern, Event::Cue(CueKind::PinPrompt)) => {
            Transition::with(Interactive, Action::SendOtp)
        }
        (AwaitPattern, Event::WaitElapsed) => Transition::terminate(SessionOutcome::TimedOut),
        (AwaitPattern, Event::StreamClosed) => {
            Transition::terminate(SessionOutcome::Rejected(RejectReason::StreamClosed))
        }
        (AwaitPattern, Event::TransportFailed(msg)) => {
            Transition::terminate(SessionOutcome::Rejected(RejectReason::Transport(msg)))
        }

        (Init | AwaitPattern, Event::Interrupted) => {
            Transition::terminate(SessionOutcome::Cancelled)
        }

        (Interactive, Event::SessionEnded | Event::Interrupted) => {
            Transition::terminate(SessionOutcome::Established)
        }
        // The operator never got the terminal.
        (Interactive, Event::TransportFailed(msg)) => {
            Transition::terminate(SessionOutcome::Rejected(RejectReason::Transport(msg)))
        }

        // Everything else, including any cue seen after the handoff and any
        // event once terminated, leaves the state alone.
        (state, _) => Transition::to(state.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: Vec<Event>) -> (DriverState, Vec<Action>) {
        let mut state = DriverState::Init;
        let mut actions = Vec::new();
        for event in events {
            let t = transition(&state, event);
            actions.extend(t.action);
            state = t.next;
        }
        (state, actions)
    }

    #[test]
    fn full_challenge_sequence_reaches_interactive() {
        let (state, actions) = run(vec![
            Event::Spawned,
            Event::Cue(CueKind::HostKeyConfirm),
            Event::Cue(CueKind::PasswordPrompt),
            Event::Cue(CueKind::PinPrompt),
        ]);
        assert_eq!(state, DriverState::Interactive);
        assert_eq!(
            actions,
            [Action::Affirm, Action::SendSecret, Action::SendOtp]
        );
    }

    #[test]
    fn cues_after_handoff_are_ignored() {
        let (state, actions) = run(vec![
            Event::Spawned,
            Event::Cue(CueKind::PinPrompt),
            Event::Cue(CueKind::PasswordPrompt),
            Event::Cue(CueKind::PinPrompt),
            Event::Cue(CueKind::HostKeyConfirm),
        ]);
        assert_eq!(state, DriverState::Interactive);
        assert_eq!(actions, [Action::SendOtp]);
    }

    #[test]
    fn repeated_host_key_and_password_stay_waiting() {
        let (state, actions) = run(vec![
            Event::Spawned,
            Event::Cue(CueKind::HostKeyConfirm),
            Event::Cue(CueKind::HostKeyConfirm),
            Event::Cue(CueKind::PasswordPrompt),
            Event::Cue(CueKind::PasswordPrompt),
        ]);
        assert_eq!(state, DriverState::AwaitPattern);
        assert_eq!(
            actions,
            [
                Action::Affirm,
                Action::Affirm,
                Action::SendSecret,
                Action::SendSecret
            ]
        );
    }

    #[test]
    fn timeout_closure_and_interrupt_terminate_before_handoff() {
        let cases = [
            (Event::WaitElapsed, SessionOutcome::TimedOut),
            (
                Event::StreamClosed,
                SessionOutcome::Rejected(RejectReason::StreamClosed),
            ),
            (Event::Interrupted, SessionOutcome::Cancelled),
        ];
        for (event, expected) in cases {
            let (state, actions) = run(vec![Event::Spawned, event]);
            assert_eq!(state, DriverState::Terminated(expected));
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn interrupt_before_spawn_completes_is_cancel() {
        let (state, _) = run(vec![Event::Interrupted]);
        assert_eq!(state, DriverState::Terminated(SessionOutcome::Cancelled));
    }

    #[test]
    fn spawn_failure_is_rejected() {
        let (state, _) = run(vec![Event::SpawnFailed("no ssh".into())]);
        assert_eq!(
            state,
            DriverState::Terminated(SessionOutcome::Rejected(RejectReason::SpawnFailed(
                "no ssh".into()
            )))
        );
    }

    #[test]
    fn interactive_ends_established() {
        let (state, _) = run(vec![
            Event::Spawned,
            Event::Cue(CueKind::PinPrompt),
            Event::StreamClosed,
            Event::SessionEnded,
        ]);
        assert_eq!(state, DriverState::Terminated(SessionOutcome::Established));
    }

    #[test]
    fn interrupt_while_interactive_is_established() {
        let t = transition(&DriverState::Interactive, Event::Interrupted);
        assert_eq!(
            t.next,
            DriverState::Terminated(SessionOutcome::Established)
        );
        assert_eq!(t.action, None);
    }

    #[test]
    fn failed_handoff_is_rejected() {
        let t = transition(
            &DriverState::Interactive,
            Event::TransportFailed("not a terminal".into()),
        );
        assert_eq!(
            t.next,
            DriverState::Terminated(SessionOutcome::Rejected(RejectReason::Transport(
                "not a terminal".into()
            )))
        );
    }

    #[test]
    fn terminated_is_absorbing() {
        let state = DriverState::Terminated(SessionOutcome::TimedOut);
        let t = transition(&state, Event::Cue(CueKind::PinPrompt));
        assert_eq!(t.next, state);
        assert_eq!(t.action, None);
    }

    #[test]
    fn closed_reason_displays_as_closed() {
        assert_eq!(RejectReason::StreamClosed.to_string(), "closed");
    }
}
