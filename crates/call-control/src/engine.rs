//! Session-protocol engine interface
//!
//! The engine performs the actual registration and call signaling. The
//! controller talks to it through two traits and learns about progress only
//! through [`EngineEvent`]s delivered to the [`EventListener`] it handed out
//! when the session was created.
//!
//! ```text
//! CallController ──create_session()──▶ SessionEngine
//!       │                                   │
//!       ├──register()/make_call()/...──▶ EngineSession
//!       │                                   │
//!       ◀──────── EventListener::deliver(SessionId, EngineEvent)
//! ```
//!
//! Requests either fail synchronously with an [`EngineError`] or succeed
//! immediately; their outcome is reported later as events, one at a time per
//! session.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::call::{CallState, SessionId};
use crate::identity::{LocalIdentity, PeerIdentity};
use crate::offer::Offer;

/// Synchronous rejection of an engine request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Transport unavailable or unreachable; may succeed later
    #[error("transport unavailable: {reason}")]
    Transport { reason: String },

    /// The engine refused the request in its current condition
    #[error("request rejected: {reason}")]
    Rejected { reason: String },

    /// The engine session was already released
    #[error("session closed")]
    Closed,
}

impl EngineError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Check if the same request may succeed once conditions change
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Transport { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Factory for engine sessions
#[async_trait]
pub trait SessionEngine: Send + Sync + fmt::Debug {
    /// Create a session for `identity` whose events go to `listener`
    async fn create_session(
        &self,
        identity: &LocalIdentity,
        listener: EventListener,
    ) -> EngineResult<Arc<dyn EngineSession>>;
}

/// One registration or call session inside the engine
#[async_trait]
pub trait EngineSession: Send + Sync + fmt::Debug {
    fn id(&self) -> SessionId;

    async fn register(&self) -> EngineResult<()>;

    async fn make_call(&self, peer: &PeerIdentity, offer: &Offer) -> EngineResult<()>;

    async fn answer(&self, offer: &Offer) -> EngineResult<()>;

    async fn end_call(&self) -> EngineResult<()>;

    /// Renegotiate media of an established call (hold or resume)
    async fn change_call(&self, offer: &Offer) -> EngineResult<()>;

    /// The engine's own view of the session state
    fn current_state(&self) -> CallState;

    /// Release the engine-level resource. Must not block.
    fn close(&self);
}

/// Asynchronous notifications from the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// An inbound call rings; `session` is the engine session carrying it
    Ringing {
        caller: PeerIdentity,
        session: Arc<dyn EngineSession>,
    },
    RingingBack,
    CallEstablished,
    CallEnded,
    CallBusy,
    /// The peer accepted a media renegotiation
    CallChanged { offer: Offer },
    Error { cause: String },
    RegistrationDone,
    RegistrationFailed { reason: String },
    RegistrationTimeout,
}

impl EngineEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Ringing { .. } => "ringing",
            EngineEvent::RingingBack => "ringing_back",
            EngineEvent::CallEstablished => "call_established",
            EngineEvent::CallEnded => "call_ended",
            EngineEvent::CallBusy => "call_busy",
            EngineEvent::CallChanged { .. } => "call_changed",
            EngineEvent::Error { .. } => "error",
            EngineEvent::RegistrationDone => "registration_done",
            EngineEvent::RegistrationFailed { .. } => "registration_failed",
            EngineEvent::RegistrationTimeout => "registration_timeout",
        }
    }
}

/// An engine event tagged with the session it concerns
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub event: EngineEvent,
}

/// Sink handed to the engine for event delivery
///
/// Delivery never blocks. Events delivered after the controller has shut
/// down are discarded.
#[derive(Debug, Clone)]
pub struct EventListener {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventListener {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Create a listener together with the receiving end of its events
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Deliver an event for `session_id`
    pub fn deliver(&self, session_id: SessionId, event: EngineEvent) {
        let name = event.name();
        if self.tx.send(SessionEvent { session_id, event }).is_err() {
            tracing::debug!(session_id = %session_id, event = name, "Dropping engine event, controller closed");
        }
    }

    /// Check if the controller still receives events
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
