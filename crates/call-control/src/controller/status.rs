//! Status projection and publication
//!
//! The label shown to the user is a pure function of the active session's
//! `(state, holding)`. Every recomputation is pushed to two channels: a
//! `watch` holding the latest update for cheap non-blocking reads, and a
//! `broadcast` for observers that want every update.

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};

use crate::{
    call::{CallState, SessionId},
    error::RemoteFailure,
};

/// Label for a controller that has not created any session yet
pub const LABEL_NOT_SET_UP: &str = "Uninitialized";

/// Human-readable label for the active session
///
/// `state` is `None` when no session exists.
pub fn status_label(state: Option<CallState>, holding: bool) -> &'static str {
    let Some(state) = state else {
        return LABEL_NOT_SET_UP;
    };
    match state {
        CallState::Uninitialized => "Not registered",
        CallState::Registering => "Registering...",
        CallState::ReadyForCall => "Ready for call",
        CallState::IncomingCall => "Ringing...",
        CallState::IncomingCallAnswering => "Answering...",
        CallState::OutgoingCall => "Calling...",
        CallState::OutgoingCallRingBack => "Ringing back...",
        CallState::OutgoingCallCanceling => "Cancelling...",
        CallState::InCall if holding => "Holding",
        CallState::InCall => "Established",
        CallState::EndingCall => "Ending call...",
    }
}

/// A published status snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub label: String,
    /// State of the active session, `None` before any session exists
    pub state: Option<CallState>,
    pub holding: bool,
    pub active_session: Option<SessionId>,
    /// Most recent remote failure, cleared by the next transition
    pub notice: Option<RemoteFailure>,
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(
        state: Option<CallState>,
        holding: bool,
        active_session: Option<SessionId>,
        notice: Option<RemoteFailure>,
    ) -> Self {
        Self {
            label: status_label(state, holding).to_string(),
            state,
            holding,
            active_session,
            notice,
            timestamp: Utc::now(),
        }
    }

    /// Status of a controller with no session
    pub fn not_set_up() -> Self {
        Self::new(None, false, None, None)
    }
}

/// Fan-out of status updates
#[derive(Debug)]
pub struct StatusPublisher {
    latest: watch::Sender<StatusUpdate>,
    updates: broadcast::Sender<StatusUpdate>,
}

impl StatusPublisher {
    /// `capacity` bounds how many updates a slow observer may lag behind
    pub fn new(capacity: usize) -> Self {
        let (latest, _) = watch::channel(StatusUpdate::not_set_up());
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self { latest, updates }
    }

    /// Publish an update. Never blocks; observers that went away are ignored.
    pub fn publish(&self, update: StatusUpdate) {
        tracing::debug!(status = %update.label, notice = ?update.notice, "Publishing call status");
        self.latest.send_replace(update.clone());
        let _ = self.updates.send(update);
    }

    pub fn latest(&self) -> StatusUpdate {
        self.latest.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<StatusUpdate> {
        self.latest.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.updates.subscribe()
    }

    pub(crate) fn updates_sender(&self) -> broadcast::Sender<StatusUpdate> {
        self.updates.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(status_label(None, false), "Uninitialized");
        assert_eq!(status_label(Some(CallState::Uninitialized), false), "Not registered");
        assert_eq!(status_label(Some(CallState::ReadyForCall), false), "Ready for call");
        assert_eq!(status_label(Some(CallState::InCall), false), "Established");
        assert_eq!(status_label(Some(CallState::InCall), true), "Holding");
        assert_eq!(status_label(Some(CallState::OutgoingCallCanceling), false), "Cancelling...");
    }

    #[test]
    fn test_not_set_up_label_is_distinct() {
        let labels: Vec<_> = CallState::ALL
            .iter()
            .map(|s| status_label(Some(*s), false))
            .collect();
        assert!(!labels.contains(&LABEL_NOT_SET_UP));
    }

    #[tokio::test]
    async fn test_publish_reaches_watchers_and_subscribers() {
        let publisher = StatusPublisher::new(8);
        let mut watcher = publisher.watch();
        let mut updates = publisher.subscribe();

        let update = StatusUpdate::new(Some(CallState::Registering), false, None, None);
        publisher.publish(update.clone());

        watcher.changed().await.unwrap();
        assert_eq!(watcher.borrow().label, "Registering...");
        assert_eq!(updates.recv().await.unwrap(), update);
        assert_eq!(publisher.latest().label, "Registering...");
    }

    #[test]
    fn test_publish_without_observers() {
        let publisher = StatusPublisher::new(1);
        publisher.publish(StatusUpdate::new(Some(CallState::InCall), true, None, Some(RemoteFailure::Busy)));
        assert_eq!(publisher.latest().label, "Holding");
        assert_eq!(publisher.latest().notice, Some(RemoteFailure::Busy));
    }
}
