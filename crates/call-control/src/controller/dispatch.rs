//! Gesture dispatch table
//!
//! Maps a user gesture plus the active session's state to at most one
//! command. Kept free of I/O so the table can be checked exhaustively.

use crate::call::CallState;

/// A user-initiated gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// "Do the obvious thing" for the current status
    Act,
    /// Answer a ringing call, or put an established call on hold
    AcceptOrHold,
    /// Decline a ringing call, or hang up / cancel the current call
    DeclineOrEnd,
}

/// A command the controller issues against a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Register,
    MakeCall,
    Answer,
    EndCall,
    Hold,
    Resume,
}

/// Snapshot of the active session consulted by [`plan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveView {
    pub state: CallState,
    pub holding: bool,
    pub change_pending: bool,
}

/// Pick the command for `gesture`, or `None` when the gesture is a no-op
///
/// `active` is `None` when no session has been created yet.
pub fn plan(active: Option<ActiveView>, gesture: Gesture) -> Option<Command> {
    let Some(view) = active else {
        return match gesture {
            Gesture::Act | Gesture::AcceptOrHold => Some(Command::Register),
            Gesture::DeclineOrEnd => None,
        };
    };

    if view.state.is_in_flight() {
        return None;
    }

    match (view.state, gesture) {
        (CallState::Uninitialized, Gesture::Act | Gesture::AcceptOrHold) => Some(Command::Register),
        (CallState::ReadyForCall, Gesture::Act | Gesture::AcceptOrHold) => Some(Command::MakeCall),
        (CallState::IncomingCall, Gesture::Act | Gesture::AcceptOrHold) => Some(Command::Answer),
        (CallState::IncomingCall, Gesture::DeclineOrEnd) => Some(Command::EndCall),
        (CallState::OutgoingCall | CallState::OutgoingCallRingBack, Gesture::Act | Gesture::DeclineOrEnd) => {
            Some(Command::EndCall)
        }
        (CallState::InCall, Gesture::DeclineOrEnd) => Some(Command::EndCall),
        // one renegotiation at a time
        (CallState::InCall, _) if view.change_pending => None,
        (CallState::InCall, Gesture::Act | Gesture::AcceptOrHold) if view.holding => Some(Command::Resume),
        (CallState::InCall, Gesture::Act | Gesture::AcceptOrHold) => Some(Command::Hold),
        _ => None,
    }
}
