//! Call lifecycle states and session identifiers
//!
//! A session moves through [`CallState`] as commands are issued and engine
//! events arrive. Only the controller changes a session's state.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an engine session (registration or call)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a fresh random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Session exists but is not registered
    Uninitialized,
    /// REGISTER sent, waiting for the registrar
    Registering,
    /// Registered and idle
    ReadyForCall,
    /// Inbound call is ringing locally
    IncomingCall,
    /// Answer sent, waiting for the call to be established
    IncomingCallAnswering,
    /// INVITE sent
    OutgoingCall,
    /// Remote party is ringing
    OutgoingCallRingBack,
    /// Outgoing call is being cancelled
    OutgoingCallCanceling,
    /// Call established, media may flow
    InCall,
    /// Hang-up sent, waiting for the call to end
    EndingCall,
}

impl CallState {
    /// Every state, in lifecycle order
    pub const ALL: [CallState; 10] = [
        CallState::Uninitialized,
        CallState::Registering,
        CallState::ReadyForCall,
        CallState::IncomingCall,
        CallState::IncomingCallAnswering,
        CallState::OutgoingCall,
        CallState::OutgoingCallRingBack,
        CallState::OutgoingCallCanceling,
        CallState::InCall,
        CallState::EndingCall,
    ];

    /// Check if a request is outstanding and user gestures must be ignored
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            CallState::Registering
                | CallState::IncomingCallAnswering
                | CallState::OutgoingCallCanceling
                | CallState::EndingCall
        )
    }

    /// Check if a call exists that `end_call` can terminate
    pub fn is_call_bearing(&self) -> bool {
        matches!(
            self,
            CallState::IncomingCall
                | CallState::IncomingCallAnswering
                | CallState::OutgoingCall
                | CallState::OutgoingCallRingBack
                | CallState::InCall
        )
    }

    /// Check if this is an outgoing call that has not been answered yet
    pub fn is_outgoing_setup(&self) -> bool {
        matches!(self, CallState::OutgoingCall | CallState::OutgoingCallRingBack)
    }

    /// Check if `CallEstablished` may be applied in this state
    pub fn awaits_establishment(&self) -> bool {
        matches!(
            self,
            CallState::IncomingCallAnswering
                | CallState::OutgoingCall
                | CallState::OutgoingCallRingBack
        )
    }
}
