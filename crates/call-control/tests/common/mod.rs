//! Shared test helpers: a recording session engine
//!
//! The engine records every request it receives and lets tests deliver
//! events as if they came from the network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use rvoip_call_control::{
    CallState, EngineError, EngineEvent, EngineResult, EngineSession, EventListener,
    LocalIdentity, Offer, PeerIdentity, SessionEngine, SessionId,
};

/// One request observed by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateSession(SessionId),
    Register(SessionId),
    MakeCall(SessionId, String),
    Answer(SessionId),
    EndCall(SessionId),
    ChangeCall { session: SessionId, hold: bool },
    Close(SessionId),
}

#[derive(Debug, Default)]
struct Shared {
    requests: Vec<Request>,
    created: Vec<SessionId>,
    listener: Option<EventListener>,
    fail_next: Option<EngineError>,
    fail_create: Option<EngineError>,
    states: HashMap<SessionId, CallState>,
}

/// Engine double that records requests
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<Request> {
        self.shared.lock().requests.clone()
    }

    /// Requests other than session creation and release
    pub fn commands(&self) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| !matches!(r, Request::CreateSession(_) | Request::Close(_)))
            .collect()
    }

    /// Forget recorded requests; created session ids are kept
    pub fn clear(&self) {
        self.shared.lock().requests.clear();
    }

    /// Reject the next session request with `error`
    pub fn fail_next(&self, error: EngineError) {
        self.shared.lock().fail_next = Some(error);
    }

    /// Reject the next `create_session` with `error`
    pub fn fail_create(&self, error: EngineError) {
        self.shared.lock().fail_create = Some(error);
    }

    /// Ids of sessions created so far, oldest first
    pub fn sessions(&self) -> Vec<SessionId> {
        self.shared.lock().created.clone()
    }

    pub fn closed(&self) -> Vec<SessionId> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Close(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn registration_id(&self) -> SessionId {
        self.sessions()[0]
    }

    pub fn last_session_id(&self) -> SessionId {
        *self.sessions().last().expect("no session created")
    }

    /// Deliver an event as the engine would
    pub fn deliver(&self, session: SessionId, event: EngineEvent) {
        let listener = self.shared.lock().listener.clone().expect("no session created yet");
        listener.deliver(session, event);
    }

    /// Start an inbound call on the registration session
    pub fn ring(&self, caller: &str) -> SessionId {
        let inbound = RecordedSession::new(SessionId::new(), self.shared.clone());
        let id = inbound.id;
        self.deliver(
            self.registration_id(),
            EngineEvent::Ringing {
                caller: PeerIdentity::parse(caller).unwrap(),
                session: Arc::new(inbound),
            },
        );
        id
    }
}

#[async_trait]
impl SessionEngine for RecordingEngine {
    async fn create_session(
        &self,
        _identity: &LocalIdentity,
        listener: EventListener,
    ) -> EngineResult<Arc<dyn EngineSession>> {
        let mut shared = self.shared.lock();
        if let Some(e) = shared.fail_create.take() {
            return Err(e);
        }
        let id = SessionId::new();
        shared.requests.push(Request::CreateSession(id));
        shared.created.push(id);
        shared.listener = Some(listener);
        shared.states.insert(id, CallState::Uninitialized);
        Ok(Arc::new(RecordedSession::new(id, self.shared.clone())))
    }
}

#[derive(Debug)]
struct RecordedSession {
    id: SessionId,
    shared: Arc<Mutex<Shared>>,
}

impl RecordedSession {
    fn new(id: SessionId, shared: Arc<Mutex<Shared>>) -> Self {
        Self { id, shared }
    }

    fn record(&self, request: Request, next: CallState) -> EngineResult<()> {
        let mut shared = self.shared.lock();
        if let Some(e) = shared.fail_next.take() {
            return Err(e);
        }
        shared.requests.push(request);
        shared.states.insert(self.id, next);
        Ok(())
    }
}

#[async_trait]
impl EngineSession for RecordedSession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn register(&self) -> EngineResult<()> {
        self.record(Request::Register(self.id), CallState::Registering)
    }

    async fn make_call(&self, peer: &PeerIdentity, _offer: &Offer) -> EngineResult<()> {
        self.record(Request::MakeCall(self.id, peer.to_string()), CallState::OutgoingCall)
    }

    async fn answer(&self, _offer: &Offer) -> EngineResult<()> {
        self.record(Request::Answer(self.id), CallState::IncomingCallAnswering)
    }

    async fn end_call(&self) -> EngineResult<()> {
        self.record(Request::EndCall(self.id), CallState::EndingCall)
    }

    async fn change_call(&self, offer: &Offer) -> EngineResult<()> {
        self.record(
            Request::ChangeCall {
                session: self.id,
                hold: offer.is_hold(),
            },
            CallState::InCall,
        )
    }

    fn current_state(&self) -> CallState {
        self.shared
            .lock()
            .states
            .get(&self.id)
            .copied()
            .unwrap_or(CallState::Uninitialized)
    }

    fn close(&self) {
        self.shared.lock().requests.push(Request::Close(self.id));
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rvoip_call_control=debug")
        .with_test_writer()
        .try_init();
}
