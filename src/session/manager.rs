//! Negotiation endpoint backing and active-session bookkeeping

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::audio::AudioSampler;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::media::SharedSource;
use crate::session::session::{state_from_peer, Session, SessionState};
use crate::transport;
use crate::video::ScreenSampler;

pub struct ConnectionManager {
    config: AppConfig,
    sessions: DashMap<Uuid, Arc<Session>>,
}

impl ConnectionManager {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Negotiate one viewer session: build its capture pipeline, attach the
    /// producers to a fresh peer connection, and answer the offer. The
    /// session joins the active set only after every step has succeeded;
    /// sampler construction failure returns the error with nothing added,
    /// and a failure later in the exchange tears the session down first.
    pub async fn negotiate(
        self: Arc<Self>,
        offer: RTCSessionDescription,
    ) -> Result<RTCSessionDescription> {
        let audio_config = self.config.audio.clone();
        let video_config = self.config.video.clone();
        let (audio, video) =
            tokio::task::spawn_blocking(move || -> Result<(AudioSampler, ScreenSampler)> {
                let audio = AudioSampler::new(&audio_config)?;
                // if the display binding fails here, the audio device is
                // released by the sampler's Drop on unwind of this closure
                let video = ScreenSampler::new(&video_config)?;
                Ok((audio, video))
            })
            .await
            .map_err(|e| Error::Worker(e.to_string()))??;

        let id = Uuid::new_v4();
        let peer = transport::build_peer(&self.config.server)
            .await
            .map_err(Error::from)?;
        let audio_track = transport::audio_track();
        let video_track = transport::video_track(video.codec_params());

        let stop = Arc::new(AtomicBool::new(false));
        let audio: SharedSource = Arc::new(Mutex::new(Box::new(audio)));
        let video: SharedSource = Arc::new(Mutex::new(Box::new(video)));
        let session = Arc::new(Session::new(
            id,
            peer.clone(),
            vec![audio.clone(), video.clone()],
            stop.clone(),
        ));

        let outcome: Result<RTCSessionDescription> = async {
            transport::attach(&peer, audio_track.clone()).await?;
            transport::attach(&peer, video_track.clone()).await?;

            let manager = Arc::downgrade(&self);
            peer.on_peer_connection_state_change(Box::new(move |peer_state| {
                let manager = manager.clone();
                Box::pin(async move {
                    if let (Some(manager), Some(next)) =
                        (manager.upgrade(), state_from_peer(peer_state))
                    {
                        manager.on_connection_state(id, next).await;
                    }
                })
            }));

            transport::spawn_pump(audio_track, audio, stop.clone());
            transport::spawn_pump(video_track, video, stop.clone());

            Ok(transport::exchange(&peer, offer).await?)
        }
        .await;

        match outcome {
            Ok(answer) => {
                self.sessions.insert(id, session);
                tracing::info!(
                    session = %id,
                    active = self.sessions.len(),
                    "viewer session negotiated"
                );
                Ok(answer)
            }
            Err(e) => {
                session.teardown().await;
                Err(e)
            }
        }
    }

    /// React to a connectivity transition raised by the engine. Terminal
    /// states remove and tear down the session; a repeated notification for
    /// a session already removed is a no-op.
    pub async fn on_connection_state(&self, id: Uuid, next: SessionState) {
        if next.is_terminal() {
            self.remove_session(id, next).await;
        } else if let Some(session) = self.sessions.get(&id) {
            session.set_state(next);
            tracing::info!(session = %id, state = %next, "session connectivity changed");
        }
    }

    async fn remove_session(&self, id: Uuid, state: SessionState) {
        let Some((_, session)) = self.sessions.remove(&id) else {
            tracing::debug!(session = %id, "state change for unknown session ignored");
            return;
        };
        session.set_state(state);
        session.teardown().await;
        tracing::info!(
            session = %id,
            state = %state,
            active = self.sessions.len(),
            "session removed"
        );
    }

    /// Tear down every active session; used on process shutdown
    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.remove_session(id, SessionState::Closed).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;

    use crate::media::{MediaKind, MediaSource, MediaUnit, TimeBase};

    struct CountingSource {
        kind: MediaKind,
        shutdowns: Arc<AtomicUsize>,
    }

    impl MediaSource for CountingSource {
        fn kind(&self) -> MediaKind {
            self.kind
        }

        fn cadence(&self) -> Option<Duration> {
            None
        }

        fn next_unit(&mut self) -> MediaUnit {
            MediaUnit {
                kind: self.kind,
                payload: Bytes::new(),
                pts: 0,
                time_base: TimeBase::new(1, 1_000),
                duration: Duration::ZERO,
            }
        }

        fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Session with stub producers inserted straight into the active set
    async fn insert_stub(manager: &ConnectionManager) -> (Uuid, Arc<AtomicUsize>) {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let peer = transport::build_peer(&manager.config.server).await.unwrap();
        let sources: Vec<SharedSource> = [MediaKind::Audio, MediaKind::Video]
            .into_iter()
            .map(|kind| {
                Arc::new(Mutex::new(Box::new(CountingSource {
                    kind,
                    shutdowns: shutdowns.clone(),
                }) as Box<dyn MediaSource>))
            })
            .collect();
        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(
            id,
            peer,
            sources,
            Arc::new(AtomicBool::new(false)),
        ));
        manager.sessions.insert(id, session);
        (id, shutdowns)
    }

    fn unparsed_offer() -> RTCSessionDescription {
        serde_json::from_str(r#"{"type":"offer","sdp":"v=0\r\n"}"#).unwrap()
    }

    #[tokio::test]
    async fn negotiation_with_unopenable_device_leaves_set_unchanged() {
        let mut config = AppConfig::default();
        config.audio.device = Some("screencaster-test-no-such-device".to_string());
        let manager = Arc::new(ConnectionManager::new(config));

        assert_eq!(manager.active_sessions(), 0);
        let result = manager.clone().negotiate(unparsed_offer()).await;
        assert!(matches!(result, Err(Error::Audio(_))));
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn terminal_state_removes_exactly_that_session() {
        let manager = ConnectionManager::new(AppConfig::default());
        let (doomed, doomed_shutdowns) = insert_stub(&manager).await;
        let (survivor, survivor_shutdowns) = insert_stub(&manager).await;

        manager
            .on_connection_state(doomed, SessionState::Failed)
            .await;

        assert_eq!(manager.active_sessions(), 1);
        assert!(manager.sessions.contains_key(&survivor));
        // both producers of the doomed session released, survivor untouched
        assert_eq!(doomed_shutdowns.load(Ordering::SeqCst), 2);
        assert_eq!(survivor_shutdowns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_terminal_notification_is_a_no_op() {
        let manager = ConnectionManager::new(AppConfig::default());
        let (id, shutdowns) = insert_stub(&manager).await;

        manager.on_connection_state(id, SessionState::Closed).await;
        manager.on_connection_state(id, SessionState::Closed).await;

        assert_eq!(manager.active_sessions(), 0);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn connected_updates_state_without_removal() {
        let manager = ConnectionManager::new(AppConfig::default());
        let (id, _) = insert_stub(&manager).await;

        manager
            .on_connection_state(id, SessionState::Connected)
            .await;

        assert_eq!(manager.active_sessions(), 1);
        let session = manager.sessions.get(&id).unwrap();
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn shutdown_drains_every_session() {
        let manager = ConnectionManager::new(AppConfig::default());
        let (_, first) = insert_stub(&manager).await;
        let (_, second) = insert_stub(&manager).await;

        manager.shutdown().await;

        assert_eq!(manager.active_sessions(), 0);
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }
}
