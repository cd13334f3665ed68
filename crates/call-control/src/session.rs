//! The CallSession entity
//!
//! A [`CallSession`] pairs an engine session with the lifecycle state the
//! controller has derived for it. Commands check the current state, forward
//! the request to the engine, and move the session toward the state the
//! request leads to. Engine events are folded in with [`CallSession::apply`].
//!
//! A session never changes state when a command is illegal or the engine
//! rejects it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    call::{CallState, SessionId},
    engine::{EngineEvent, EngineSession},
    error::{CallControlError, CallControlResult},
    identity::{LocalIdentity, PeerIdentity},
    offer::Offer,
};

/// What applying an event did to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The session moved from one state to another
    Transition { from: CallState, to: CallState },
    /// Hold status flipped while in call
    HoldChanged { holding: bool },
    /// The event does not apply in the current state
    Ignored,
}

/// One registration session or call sub-session
#[derive(Debug)]
pub struct CallSession {
    id: SessionId,
    engine: Arc<dyn EngineSession>,
    local: LocalIdentity,
    peer: Option<PeerIdentity>,
    state: CallState,
    holding: bool,
    change_pending: bool,
    created_at: DateTime<Utc>,
}

impl CallSession {
    /// Wrap a freshly created registration session
    pub fn registration(engine: Arc<dyn EngineSession>, local: LocalIdentity) -> Self {
        Self::with_state(engine, local, None, CallState::Uninitialized)
    }

    /// Wrap a call sub-session about to place an outgoing call
    pub fn outgoing(engine: Arc<dyn EngineSession>, local: LocalIdentity) -> Self {
        Self::with_state(engine, local, None, CallState::ReadyForCall)
    }

    /// Wrap the engine session of a ringing inbound call
    pub fn incoming(
        engine: Arc<dyn EngineSession>,
        local: LocalIdentity,
        caller: PeerIdentity,
    ) -> Self {
        Self::with_state(engine, local, Some(caller), CallState::IncomingCall)
    }

    fn with_state(
        engine: Arc<dyn EngineSession>,
        local: LocalIdentity,
        peer: Option<PeerIdentity>,
        state: CallState,
    ) -> Self {
        Self {
            id: engine.id(),
            engine,
            local,
            peer,
            state,
            holding: false,
            change_pending: false,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Outgoing media is suspended. Only ever true in `InCall`.
    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// A hold/resume request awaits confirmation from the engine
    pub fn is_change_pending(&self) -> bool {
        self.change_pending
    }

    pub fn local(&self) -> &LocalIdentity {
        &self.local
    }

    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The engine's own snapshot of this session
    pub fn engine_state(&self) -> CallState {
        self.engine.current_state()
    }

    /// Request registration. Legal from any state.
    pub async fn register(&mut self) -> CallControlResult<()> {
        self.engine
            .register()
            .await
            .map_err(|e| CallControlError::session("register", e))?;
        self.set_state(CallState::Registering);
        Ok(())
    }

    /// Place an outgoing call to `peer`
    pub async fn make_call(&mut self, peer: PeerIdentity, offer: &Offer) -> CallControlResult<()> {
        self.require("make_call", |s| s == CallState::ReadyForCall)?;
        self.engine
            .make_call(&peer, offer)
            .await
            .map_err(|e| CallControlError::session("make_call", e))?;
        self.peer = Some(peer);
        self.set_state(CallState::OutgoingCall);
        Ok(())
    }

    /// Accept the ringing inbound call
    pub async fn answer(&mut self, offer: &Offer) -> CallControlResult<()> {
        self.require("answer", |s| s == CallState::IncomingCall)?;
        self.engine
            .answer(offer)
            .await
            .map_err(|e| CallControlError::session("answer", e))?;
        self.set_state(CallState::IncomingCallAnswering);
        Ok(())
    }

    /// Hang up, decline or cancel the current call
    pub async fn end_call(&mut self) -> CallControlResult<()> {
        self.require("end_call", |s| s.is_call_bearing())?;
        self.engine
            .end_call()
            .await
            .map_err(|e| CallControlError::session("end_call", e))?;
        let next = if self.state.is_outgoing_setup() {
            CallState::OutgoingCallCanceling
        } else {
            CallState::EndingCall
        };
        self.set_state(next);
        Ok(())
    }

    /// Renegotiate media of the established call
    ///
    /// The hold flag flips only once the engine reports `CallChanged`.
    pub async fn change_call(&mut self, offer: &Offer) -> CallControlResult<()> {
        self.require("change_call", |s| s == CallState::InCall)?;
        if self.change_pending {
            return Err(CallControlError::illegal_state("change_call", self.state));
        }
        self.engine
            .change_call(offer)
            .await
            .map_err(|e| CallControlError::session("change_call", e))?;
        self.change_pending = true;
        Ok(())
    }

    /// Fold a state-only engine event into this session
    ///
    /// Events that create or discard sessions (`Ringing`, `CallEnded`) and
    /// display-only events (`CallBusy`, `Error`) are the controller's
    /// business and are ignored here.
    pub fn apply(&mut self, event: &EngineEvent) -> Applied {
        let from = self.state;
        match event {
            EngineEvent::RegistrationDone if from == CallState::Registering => {
                self.transition(CallState::ReadyForCall)
            }
            EngineEvent::RegistrationFailed { .. } | EngineEvent::RegistrationTimeout
                if from == CallState::Registering =>
            {
                self.transition(CallState::Uninitialized)
            }
            EngineEvent::RingingBack if from == CallState::OutgoingCall => {
                self.transition(CallState::OutgoingCallRingBack)
            }
            EngineEvent::CallEstablished if from.awaits_establishment() => {
                self.transition(CallState::InCall)
            }
            EngineEvent::CallChanged { .. } if from == CallState::InCall => {
                self.holding = !self.holding;
                self.change_pending = false;
                Applied::HoldChanged {
                    holding: self.holding,
                }
            }
            _ => Applied::Ignored,
        }
    }

    /// Forget an outstanding media change the engine gave up on
    ///
    /// Returns whether a change was pending.
    pub fn abort_change(&mut self) -> bool {
        std::mem::replace(&mut self.change_pending, false)
    }

    /// Force the session back to idle after its call ended
    pub fn reset_to_ready(&mut self) -> Applied {
        self.transition(CallState::ReadyForCall)
    }

    /// Release the engine-level session
    pub fn close(&self) {
        tracing::debug!(session_id = %self.id, state = ?self.state, "Releasing engine session");
        self.engine.close();
    }

    fn transition(&mut self, to: CallState) -> Applied {
        let from = self.state;
        self.set_state(to);
        Applied::Transition { from, to }
    }

    fn set_state(&mut self, to: CallState) {
        self.state = to;
        if to != CallState::InCall {
            self.holding = false;
            self.change_pending = false;
        }
    }

    fn require(
        &self,
        operation: &'static str,
        legal: impl Fn(CallState) -> bool,
    ) -> CallControlResult<()> {
        if legal(self.state) {
            Ok(())
        } else {
            Err(CallControlError::illegal_state(operation, self.state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, EngineResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct StubSession {
        id: SessionId,
        calls: Mutex<Vec<&'static str>>,
        reject: Option<EngineError>,
    }

    impl StubSession {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: SessionId::new(),
                calls: Mutex::new(Vec::new()),
                reject: None,
            })
        }

        fn rejecting(error: EngineError) -> Arc<Self> {
            Arc::new(Self {
                id: SessionId::new(),
                calls: Mutex::new(Vec::new()),
                reject: Some(error),
            })
        }

        fn record(&self, op: &'static str) -> EngineResult<()> {
            self.calls.lock().push(op);
            match &self.reject {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl EngineSession for StubSession {
        fn id(&self) -> SessionId {
            self.id
        }
        async fn register(&self) -> EngineResult<()> {
            self.record("register")
        }
        async fn make_call(&self, _peer: &PeerIdentity, _offer: &Offer) -> EngineResult<()> {
            self.record("make_call")
        }
        async fn answer(&self, _offer: &Offer) -> EngineResult<()> {
            self.record("answer")
        }
        async fn end_call(&self) -> EngineResult<()> {
            self.record("end_call")
        }
        async fn change_call(&self, _offer: &Offer) -> EngineResult<()> {
            self.record("change_call")
        }
        fn current_state(&self) -> CallState {
            CallState::Uninitialized
        }
        fn close(&self) {
            self.calls.lock().push("close");
        }
    }

    fn local() -> LocalIdentity {
        LocalIdentity::parse("alice@example.com", "Alice", "secret").unwrap()
    }

    fn peer() -> PeerIdentity {
        PeerIdentity::parse("bob@example.com").unwrap()
    }

    fn offer() -> Offer {
        Offer::from_bytes("v=0\r\n")
    }

    async fn established(stub: Arc<StubSession>) -> CallSession {
        let mut session = CallSession::outgoing(stub, local());
        session.make_call(peer(), &offer()).await.unwrap();
        session.apply(&EngineEvent::CallEstablished);
        session
    }

    #[tokio::test]
    async fn test_register_round_trip() {
        let stub = StubSession::new();
        let mut session = CallSession::registration(stub.clone(), local());
        assert_eq!(session.id(), stub.id);

        session.register().await.unwrap();
        assert_eq!(session.state(), CallState::Registering);
        assert_eq!(
            session.apply(&EngineEvent::RegistrationDone),
            Applied::Transition {
                from: CallState::Registering,
                to: CallState::ReadyForCall
            }
        );

        session.register().await.unwrap();
        session.apply(&EngineEvent::RegistrationTimeout);
        assert_eq!(session.state(), CallState::Uninitialized);
        assert_eq!(*stub.calls.lock(), vec!["register", "register"]);
    }

    #[tokio::test]
    async fn test_illegal_commands_do_not_reach_engine() {
        let stub = StubSession::new();
        let mut session = CallSession::registration(stub.clone(), local());

        let err = session.make_call(peer(), &offer()).await.unwrap_err();
        assert!(err.is_state_error());
        let err = session.answer(&offer()).await.unwrap_err();
        assert!(err.is_state_error());
        let err = session.end_call().await.unwrap_err();
        assert!(err.is_state_error());
        let err = session.change_call(&offer()).await.unwrap_err();
        assert!(err.is_state_error());

        assert!(stub.calls.lock().is_empty());
        assert_eq!(session.state(), CallState::Uninitialized);
    }

    #[tokio::test]
    async fn test_engine_rejection_leaves_state_unchanged() {
        let stub = StubSession::rejecting(EngineError::transport("network down"));
        let mut session = CallSession::outgoing(stub, local());

        let err = session.make_call(peer(), &offer()).await.unwrap_err();
        assert!(matches!(
            err,
            CallControlError::Session { operation: "make_call", .. }
        ));
        assert_eq!(session.state(), CallState::ReadyForCall);
        assert!(session.peer().is_none());
    }

    #[tokio::test]
    async fn test_cancel_outgoing_call() {
        let mut session = CallSession::outgoing(StubSession::new(), local());
        session.make_call(peer(), &offer()).await.unwrap();
        session.apply(&EngineEvent::RingingBack);
        assert_eq!(session.state(), CallState::OutgoingCallRingBack);

        session.end_call().await.unwrap();
        assert_eq!(session.state(), CallState::OutgoingCallCanceling);
    }

    #[tokio::test]
    async fn test_answer_incoming_call() {
        let mut session = CallSession::incoming(StubSession::new(), local(), peer());
        assert_eq!(session.peer(), Some(&peer()));

        session.answer(&offer()).await.unwrap();
        assert_eq!(session.state(), CallState::IncomingCallAnswering);
        session.apply(&EngineEvent::CallEstablished);
        assert_eq!(session.state(), CallState::InCall);
        assert!(!session.is_holding());
    }

    #[tokio::test]
    async fn test_hold_toggles_only_on_call_changed() {
        let stub = StubSession::new();
        let mut session = established(stub.clone()).await;

        session.change_call(&offer()).await.unwrap();
        assert!(!session.is_holding());
        assert!(session.is_change_pending());

        // second request while the first is outstanding
        let err = session.change_call(&offer()).await.unwrap_err();
        assert!(err.is_state_error());

        let applied = session.apply(&EngineEvent::CallChanged { offer: offer() });
        assert_eq!(applied, Applied::HoldChanged { holding: true });
        assert!(!session.is_change_pending());

        session.apply(&EngineEvent::CallChanged { offer: offer() });
        assert!(!session.is_holding());
        assert_eq!(
            *stub.calls.lock(),
            vec!["make_call", "change_call"]
        );
    }

    #[tokio::test]
    async fn test_holding_cleared_when_leaving_in_call() {
        let mut session = established(StubSession::new()).await;
        session.apply(&EngineEvent::CallChanged { offer: offer() });
        assert!(session.is_holding());

        session.end_call().await.unwrap();
        assert_eq!(session.state(), CallState::EndingCall);
        assert!(!session.is_holding());
    }

    #[tokio::test]
    async fn test_abort_change_allows_new_request() {
        let stub = StubSession::new();
        let mut session = established(stub.clone()).await;
        assert!(!session.abort_change());

        session.change_call(&offer()).await.unwrap();
        assert!(session.abort_change());
        assert!(!session.is_change_pending());
        assert!(!session.is_holding());

        session.change_call(&offer()).await.unwrap();
        assert_eq!(
            *stub.calls.lock(),
            vec!["make_call", "change_call", "change_call"]
        );
    }

    #[test]
    fn test_out_of_place_events_are_ignored() {
        let mut session = CallSession::registration(StubSession::new(), local());
        assert_eq!(session.apply(&EngineEvent::RegistrationDone), Applied::Ignored);
        assert_eq!(session.apply(&EngineEvent::CallEstablished), Applied::Ignored);
        assert_eq!(
            session.apply(&EngineEvent::CallChanged { offer: offer() }),
            Applied::Ignored
        );
        assert_eq!(session.state(), CallState::Uninitialized);
    }

    #[test]
    #[traced_test]
    fn test_close_releases_engine_session() {
        let stub = StubSession::new();
        let session = CallSession::registration(stub.clone(), local());
        session.close();
        assert_eq!(*stub.calls.lock(), vec!["close"]);
        assert!(logs_contain("Releasing engine session"));
    }
}
