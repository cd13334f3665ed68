//! Call controller: reconciles user intent with engine events
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐      ┌────────────────────────┐
//! │   Presentation layer     │      │  Session engine        │
//! └───────────┬──────────────┘      └───────────┬────────────┘
//!   gestures / │ commands                 events │
//! ┌───────────▼──────────────────────────────────▼────────────┐
//! │ ControllerHandle (actor inbox, one message at a time)     │
//! │ ┌───────────────────────────────────────────────────────┐ │
//! │ │ CallController                                        │ │
//! │ │   registration: Option<CallSession>                   │ │
//! │ │   call:         Option<CallSession>                   │ │
//! │ │   act_on_status() ─▶ dispatch::plan() ─▶ execute()    │ │
//! │ │   apply_event()                                       │ │
//! │ │   publish() ─▶ StatusPublisher (watch + broadcast)    │ │
//! │ └───────────────────────────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! [`CallController`] is the single owner of both sessions. Every method
//! takes `&mut self`, so commands and events are applied one at a time;
//! [`ControllerHandle`] runs it on its own task and feeds it from the
//! presentation layer and the engine.
//!
//! No error escapes the controller: illegal commands and engine rejections
//! are logged, the state is left as it was, and the status is republished.

pub mod builder;
pub mod dispatch;
pub mod handle;
pub mod status;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::{
    call::{CallState, SessionId},
    config::ControllerConfig,
    engine::{EngineEvent, EngineSession, EventListener, SessionEngine, SessionEvent},
    error::{CallControlError, CallControlResult, RemoteFailure},
    identity::{LocalIdentity, PeerIdentity},
    offer::OfferTemplate,
    session::{Applied, CallSession},
};

pub use builder::ControllerBuilder;
pub use dispatch::{ActiveView, Command, Gesture};
pub use handle::{ControllerHandle, UserAction};
pub use status::{status_label, StatusPublisher, StatusUpdate};

/// Result of handing one user action to the controller
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The command was accepted by the engine
    Issued(Command),
    /// Nothing to do in the current state
    Ignored,
    /// The command was illegal or the engine rejected it
    Failed(CallControlError),
}

impl DispatchOutcome {
    pub fn issued(&self) -> Option<Command> {
        match self {
            DispatchOutcome::Issued(command) => Some(*command),
            _ => None,
        }
    }
}

/// Owner of the registration session and the optional call sub-session
#[derive(Debug)]
pub struct CallController {
    engine: Arc<dyn SessionEngine>,
    local: LocalIdentity,
    peer: Option<PeerIdentity>,
    offers: OfferTemplate,
    listener: EventListener,
    registration: Option<CallSession>,
    call: Option<CallSession>,
    notice: Option<RemoteFailure>,
    publisher: StatusPublisher,
}

impl CallController {
    /// Build a controller from validated configuration
    ///
    /// Returns the controller and the receiver on which the engine delivers
    /// events; feed those to [`CallController::apply_event`]. The initial
    /// "not set up" status is published before returning.
    pub fn new(
        config: &ControllerConfig,
        engine: Arc<dyn SessionEngine>,
    ) -> CallControlResult<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        config.validate()?;
        let (listener, events) = EventListener::channel();
        let controller = Self {
            engine,
            local: config.local_identity()?,
            peer: config.peer_identity()?,
            offers: config.offer_template(),
            listener,
            registration: None,
            call: None,
            notice: None,
            publisher: StatusPublisher::new(config.status_capacity),
        };
        controller.publish();
        Ok((controller, events))
    }

    /// The call target used by `MakeCall`
    pub fn set_peer(&mut self, peer: Option<PeerIdentity>) {
        self.peer = peer;
    }

    /// The session user actions are aimed at: the call if one exists
    pub fn active_session(&self) -> Option<&CallSession> {
        self.call.as_ref().or(self.registration.as_ref())
    }

    fn active_session_mut(&mut self) -> Option<&mut CallSession> {
        self.call.as_mut().or(self.registration.as_mut())
    }

    pub fn registration_session(&self) -> Option<&CallSession> {
        self.registration.as_ref()
    }

    pub fn call_session(&self) -> Option<&CallSession> {
        self.call.as_ref()
    }

    /// State of the active session, `None` when no session exists
    pub fn state(&self) -> Option<CallState> {
        self.active_session().map(|s| s.state())
    }

    pub fn is_holding(&self) -> bool {
        self.active_session().map(|s| s.is_holding()).unwrap_or(false)
    }

    pub fn status(&self) -> StatusUpdate {
        let active = self.active_session();
        StatusUpdate::new(
            active.map(|s| s.state()),
            active.map(|s| s.is_holding()).unwrap_or(false),
            active.map(|s| s.id()),
            self.notice.clone(),
        )
    }

    pub fn current_status_label(&self) -> String {
        self.publisher.latest().label
    }

    pub fn watch_status(&self) -> watch::Receiver<StatusUpdate> {
        self.publisher.watch()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusUpdate> {
        self.publisher.subscribe()
    }

    /// Map one gesture to the command fitting the current state and issue it
    pub async fn act_on_status(&mut self, gesture: Gesture) -> DispatchOutcome {
        let view = self.active_session().map(|s| ActiveView {
            state: s.state(),
            holding: s.is_holding(),
            change_pending: s.is_change_pending(),
        });
        match dispatch::plan(view, gesture) {
            Some(command) => {
                debug!(?gesture, state = ?view.map(|v| v.state), ?command, "Dispatching gesture");
                self.perform(command).await
            }
            None => {
                debug!(?gesture, state = ?view.map(|v| v.state), "Gesture ignored in current state");
                self.publish();
                DispatchOutcome::Ignored
            }
        }
    }

    /// Explicit "register" menu action
    pub async fn register(&mut self) -> DispatchOutcome {
        self.perform(Command::Register).await
    }

    /// Explicit "call" menu action
    pub async fn call(&mut self) -> DispatchOutcome {
        self.perform(Command::MakeCall).await
    }

    /// Explicit "hang up" menu action
    pub async fn hangup(&mut self) -> DispatchOutcome {
        self.perform(Command::EndCall).await
    }

    /// Issue `command`, log any failure, and republish status
    pub async fn perform(&mut self, command: Command) -> DispatchOutcome {
        let outcome = match self.execute(command).await {
            Ok(()) => {
                self.notice = None;
                DispatchOutcome::Issued(command)
            }
            Err(e @ CallControlError::IllegalState { .. }) => {
                warn!(?command, error = %e, "Dropping command");
                DispatchOutcome::Failed(e)
            }
            Err(e) => {
                error!(?command, error = %e, category = e.category(), "Command failed");
                DispatchOutcome::Failed(e)
            }
        };
        self.publish();
        outcome
    }

    async fn execute(&mut self, command: Command) -> CallControlResult<()> {
        match command {
            Command::Register => {
                let session = self.ensure_registration().await?;
                session.register().await?;
                info!(session_id = %session.id(), "Registration requested");
                Ok(())
            }
            Command::MakeCall => self.make_call().await,
            Command::Answer => {
                let offer = self.offers.call_offer();
                let session = self.require_active("answer")?;
                session.answer(&offer).await?;
                info!(session_id = %session.id(), "Answering incoming call");
                Ok(())
            }
            Command::EndCall => {
                let session = self.require_active("end_call")?;
                session.end_call().await?;
                info!(session_id = %session.id(), state = ?session.state(), "Ending call");
                Ok(())
            }
            Command::Hold | Command::Resume => {
                let offer = if command == Command::Hold {
                    self.offers.hold_offer()
                } else {
                    self.offers.resume_offer()
                };
                let session = self.require_active("change_call")?;
                let wanted_hold = command == Command::Hold;
                if session.state() == CallState::InCall && session.is_holding() == wanted_hold {
                    return Err(CallControlError::illegal_state("change_call", session.state()));
                }
                session.change_call(&offer).await?;
                info!(session_id = %session.id(), hold = wanted_hold, "Media change requested");
                Ok(())
            }
        }
    }

    async fn make_call(&mut self) -> CallControlResult<()> {
        if let Some(call) = &self.call {
            return Err(CallControlError::illegal_state("make_call", call.state()));
        }
        let ready = self
            .registration
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(CallState::Uninitialized);
        if ready != CallState::ReadyForCall {
            return Err(CallControlError::illegal_state("make_call", ready));
        }
        let peer = self
            .peer
            .clone()
            .ok_or_else(|| CallControlError::MissingConfiguration {
                field: "peer_address".to_string(),
            })?;

        let engine_session = self
            .engine
            .create_session(&self.local, self.listener.clone())
            .await
            .map_err(|e| CallControlError::session("create_session", e))?;
        let mut call = CallSession::outgoing(engine_session, self.local.clone());
        if let Err(e) = call.make_call(peer.clone(), &self.offers.call_offer()).await {
            call.close();
            return Err(e);
        }
        info!(session_id = %call.id(), peer = %peer, "Outgoing call started");
        self.call = Some(call);
        Ok(())
    }

    async fn ensure_registration(&mut self) -> CallControlResult<&mut CallSession> {
        if self.registration.is_none() {
            let engine_session = self
                .engine
                .create_session(&self.local, self.listener.clone())
                .await
                .map_err(|e| CallControlError::session("create_session", e))?;
            let session = CallSession::registration(engine_session, self.local.clone());
            info!(session_id = %session.id(), local = %session.local().address(), "Created registration session");
            self.registration = Some(session);
        }
        self.registration
            .as_mut()
            .ok_or_else(|| CallControlError::illegal_state("register", CallState::Uninitialized))
    }

    fn require_active(&mut self, operation: &'static str) -> CallControlResult<&mut CallSession> {
        self.active_session_mut()
            .ok_or_else(|| CallControlError::illegal_state(operation, CallState::Uninitialized))
    }

    /// Apply one engine event and republish status
    pub async fn apply_event(&mut self, event: SessionEvent) {
        let SessionEvent { session_id, event } = event;
        let is_call = self.call.as_ref().map(|s| s.id()) == Some(session_id);
        let is_registration = self.registration.as_ref().map(|s| s.id()) == Some(session_id);

        if !is_call && !is_registration {
            debug!(session_id = %session_id, event = event.name(), "Ignoring event for unknown session");
            if let EngineEvent::Ringing { session, .. } = event {
                self.decline(session).await;
            }
            return;
        }

        debug!(session_id = %session_id, event = event.name(), "Applying engine event");
        match event {
            EngineEvent::Ringing { caller, session } => self.on_ringing(caller, session).await,
            EngineEvent::CallEnded => self.on_call_ended(session_id),
            EngineEvent::CallBusy => {
                info!(session_id = %session_id, "Remote party busy");
                self.notice = Some(RemoteFailure::Busy);
            }
            EngineEvent::Error { cause } => {
                warn!(session_id = %session_id, %cause, "Engine reported session error");
                if let Some(call) = self.call.as_mut() {
                    if call.abort_change() {
                        info!(session_id = %call.id(), "Media change abandoned");
                    }
                }
                self.notice = Some(RemoteFailure::Error { cause });
            }
            other => {
                let session = if is_call {
                    self.call.as_mut()
                } else {
                    self.registration.as_mut()
                };
                if let Some(session) = session {
                    let applied = session.apply(&other);
                    Self::log_applied(session, &other, applied);
                    // stale events leave the notice alone
                    if applied != Applied::Ignored {
                        self.notice = match other {
                            EngineEvent::RegistrationFailed { reason } => {
                                Some(RemoteFailure::RegistrationFailed { reason })
                            }
                            EngineEvent::RegistrationTimeout => {
                                Some(RemoteFailure::RegistrationTimeout)
                            }
                            _ => None,
                        };
                    }
                }
            }
        }

        self.check_invariants();
        self.publish();
    }

    async fn on_ringing(&mut self, caller: PeerIdentity, session: Arc<dyn EngineSession>) {
        if let Some(current) = &self.call {
            info!(
                current = %current.id(),
                incoming = %session.id(),
                caller = %caller,
                "Declining incoming call while another call is active"
            );
            self.decline(session).await;
            return;
        }
        let call = CallSession::incoming(session, self.local.clone(), caller);
        info!(session_id = %call.id(), caller = %call.peer().map(|p| p.to_string()).unwrap_or_default(), "Incoming call");
        self.call = Some(call);
        self.notice = None;
    }

    async fn decline(&self, session: Arc<dyn EngineSession>) {
        if let Err(e) = session.end_call().await {
            warn!(session_id = %session.id(), error = %e, "Failed to decline incoming call");
        }
        session.close();
    }

    fn on_call_ended(&mut self, session_id: SessionId) {
        if let Some(call) = self.call.take() {
            info!(session_id = %call.id(), ended = %session_id, "Call ended");
            call.close();
        }
        if let Some(registration) = self.registration.as_mut() {
            let applied = registration.reset_to_ready();
            debug!(session_id = %registration.id(), ?applied, "Registration session back to idle");
        }
        self.notice = None;
    }

    fn log_applied(session: &CallSession, event: &EngineEvent, applied: Applied) {
        match applied {
            Applied::Transition { from, to } => {
                info!(session_id = %session.id(), event = event.name(), ?from, ?to, "Call state changed");
            }
            Applied::HoldChanged { holding } => {
                info!(session_id = %session.id(), holding, "Hold state changed");
            }
            Applied::Ignored => {
                debug!(
                    session_id = %session.id(),
                    event = event.name(),
                    state = ?session.state(),
                    engine_state = ?session.engine_state(),
                    "Event does not apply in current state"
                );
            }
        }
    }

    fn check_invariants(&self) {
        for session in self.registration.iter().chain(self.call.iter()) {
            debug_assert!(
                !session.is_holding() || session.state() == CallState::InCall,
                "holding outside InCall: {:?}",
                session.state()
            );
        }
    }

    /// Recompute status and push it to observers
    pub fn publish(&self) {
        self.publisher.publish(self.status());
    }

    /// Release every engine session. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(call) = self.call.take() {
            call.close();
        }
        if let Some(registration) = self.registration.take() {
            registration.close();
        }
        self.notice = None;
    }
}

impl Drop for CallController {
    fn drop(&mut self) {
        self.release();
    }
}
