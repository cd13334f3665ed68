//! Task-owned controller and its handle
//!
//! [`ControllerHandle::spawn`] moves a [`CallController`] onto its own tokio
//! task. User actions and engine events both end up on that task and are
//! applied one at a time, so a callback racing a gesture can never interleave
//! partial updates. Events already delivered by the engine are applied before
//! any user action queued after them.
//!
//! The presentation-facing `on_*` methods never block and never fail; the
//! async variants report what happened.

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CallController, DispatchOutcome, Gesture, StatusUpdate};
use crate::{
    engine::SessionEvent,
    error::{CallControlError, CallControlResult},
    identity::PeerIdentity,
};

/// A user action forwarded to the controller task
#[derive(Debug, Clone)]
pub enum UserAction {
    Gesture(Gesture),
    Register,
    Call,
    Hangup,
    /// Change the default call target
    SetPeer(Option<PeerIdentity>),
}

enum Request {
    Action {
        action: UserAction,
        reply: Option<oneshot::Sender<DispatchOutcome>>,
    },
    Snapshot(oneshot::Sender<StatusUpdate>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running controller
#[derive(Debug)]
pub struct ControllerHandle {
    requests: mpsc::UnboundedSender<Request>,
    latest: watch::Receiver<StatusUpdate>,
    updates: broadcast::Sender<StatusUpdate>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Action { action, .. } => f.debug_tuple("Action").field(action).finish(),
            Request::Snapshot(_) => f.write_str("Snapshot"),
            Request::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

impl ControllerHandle {
    /// Run `controller` on a new task fed by `events`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        controller: CallController,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        let (requests, inbox) = mpsc::unbounded_channel();
        let latest = controller.watch_status();
        let updates = controller.publisher.updates_sender();
        let task = tokio::spawn(run(controller, inbox, events));
        info!("Call controller started");
        Self {
            requests,
            latest,
            updates,
            task: Mutex::new(Some(task)),
        }
    }

    /// Latest status label. Never blocks.
    pub fn current_status_label(&self) -> String {
        self.latest.borrow().label.clone()
    }

    /// Latest published status. Never blocks.
    pub fn latest_status(&self) -> StatusUpdate {
        self.latest.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<StatusUpdate> {
        self.latest.clone()
    }

    /// Receive every status update published from now on
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusUpdate> {
        self.updates.subscribe()
    }

    /// Status after every event and action queued so far has been applied
    pub async fn status(&self) -> CallControlResult<StatusUpdate> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::Snapshot(tx))?;
        rx.await.map_err(|_| CallControlError::ControllerClosed)
    }

    pub fn on_user_gesture(&self) {
        self.fire(UserAction::Gesture(Gesture::Act));
    }

    pub fn on_accept_or_hold(&self) {
        self.fire(UserAction::Gesture(Gesture::AcceptOrHold));
    }

    pub fn on_decline_or_end(&self) {
        self.fire(UserAction::Gesture(Gesture::DeclineOrEnd));
    }

    pub fn on_register_requested(&self) {
        self.fire(UserAction::Register);
    }

    pub fn on_call_requested(&self) {
        self.fire(UserAction::Call);
    }

    pub fn on_hangup_requested(&self) {
        self.fire(UserAction::Hangup);
    }

    pub fn set_peer(&self, peer: Option<PeerIdentity>) {
        self.fire(UserAction::SetPeer(peer));
    }

    /// Perform `action` and wait for its outcome
    pub async fn perform(&self, action: UserAction) -> CallControlResult<DispatchOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::Action {
            action,
            reply: Some(tx),
        })?;
        rx.await.map_err(|_| CallControlError::ControllerClosed)
    }

    /// Stop the controller and release every engine session
    ///
    /// Sessions are closed before this returns. Calling it again is a no-op.
    pub async fn shutdown(&self) -> CallControlResult<()> {
        let (tx, rx) = oneshot::channel();
        if self.send(Request::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Call controller task did not finish cleanly");
            }
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }

    fn fire(&self, action: UserAction) {
        if let Err(e) = self.send(Request::Action {
            action,
            reply: None,
        }) {
            debug!(error = %e, "User action dropped");
        }
    }

    fn send(&self, request: Request) -> CallControlResult<()> {
        self.requests
            .send(request)
            .map_err(|_| CallControlError::ControllerClosed)
    }
}

async fn run(
    mut controller: CallController,
    mut inbox: mpsc::UnboundedReceiver<Request>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    loop {
        tokio::select! {
            biased;

            Some(event) = events.recv() => controller.apply_event(event).await,

            request = inbox.recv() => match request {
                Some(Request::Action { action, reply }) => {
                    let outcome = handle_action(&mut controller, action).await;
                    if let Some(reply) = reply {
                        let _ = reply.send(outcome);
                    }
                }
                Some(Request::Snapshot(reply)) => {
                    let _ = reply.send(controller.status());
                }
                Some(Request::Shutdown(reply)) => {
                    controller.release();
                    controller.publish();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    controller.release();
                    break;
                }
            },
        }
    }
    info!("Call controller stopped");
}

async fn handle_action(controller: &mut CallController, action: UserAction) -> DispatchOutcome {
    match action {
        UserAction::Gesture(gesture) => controller.act_on_status(gesture).await,
        UserAction::Register => controller.register().await,
        UserAction::Call => controller.call().await,
        UserAction::Hangup => controller.hangup().await,
        UserAction::SetPeer(peer) => {
            controller.set_peer(peer);
            DispatchOutcome::Ignored
        }
    }
}
