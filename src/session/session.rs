//! One negotiated viewer connection and its owned capture resources

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;

use crate::media::SharedSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Negotiating,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    /// Terminal states trigger teardown and removal
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Negotiating => "negotiating",
            SessionState::Connected => "connected",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Map the engine's connectivity signal onto our state machine. `None` for
/// transitions we do not act on (New/Connecting, and Disconnected, which
/// the engine may still recover from).
pub(crate) fn state_from_peer(state: RTCPeerConnectionState) -> Option<SessionState> {
    match state {
        RTCPeerConnectionState::Connected => Some(SessionState::Connected),
        RTCPeerConnectionState::Failed => Some(SessionState::Failed),
        RTCPeerConnectionState::Closed => Some(SessionState::Closed),
        _ => None,
    }
}

pub struct Session {
    pub id: Uuid,
    state: Mutex<SessionState>,
    peer: Arc<RTCPeerConnection>,
    sources: Vec<SharedSource>,
    stop: Arc<AtomicBool>,
}

impl Session {
    pub(crate) fn new(
        id: Uuid,
        peer: Arc<RTCPeerConnection>,
        sources: Vec<SharedSource>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState::Negotiating),
            peer,
            sources,
            stop,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, next: SessionState) {
        *self.state.lock() = next;
    }

    /// Stop the pumps, close the peer, then release capture resources on a
    /// blocking thread. The stop flag goes up first so no pump pulls from a
    /// producer that is shutting down; producer shutdown itself stops the
    /// hardware stream before the device handle is released. Safe to call
    /// more than once.
    pub(crate) async fn teardown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.peer.close().await {
            tracing::debug!(session = %self.id, error = %e, "peer close reported an error");
        }
        let sources = self.sources.clone();
        let released = tokio::task::spawn_blocking(move || {
            for source in sources {
                source.lock().shutdown();
            }
        })
        .await;
        if released.is_err() {
            tracing::warn!(session = %self.id, "capture teardown worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failed_and_closed_are_terminal() {
        assert!(!SessionState::Negotiating.is_terminal());
        assert!(!SessionState::Connected.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Closed.is_terminal());
    }

    #[test]
    fn transient_peer_states_are_ignored() {
        assert_eq!(state_from_peer(RTCPeerConnectionState::New), None);
        assert_eq!(state_from_peer(RTCPeerConnectionState::Connecting), None);
        assert_eq!(state_from_peer(RTCPeerConnectionState::Disconnected), None);
        assert_eq!(
            state_from_peer(RTCPeerConnectionState::Connected),
            Some(SessionState::Connected)
        );
        assert_eq!(
            state_from_peer(RTCPeerConnectionState::Failed),
            Some(SessionState::Failed)
        );
        assert_eq!(
            state_from_peer(RTCPeerConnectionState::Closed),
            Some(SessionState::Closed)
        );
    }
}
