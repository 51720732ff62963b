//! Peer connection construction and session description exchange

use std::sync::Arc;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use crate::config::ServerConfig;
use crate::error::TransportError;
use crate::video::CodecParams;

const STREAM_ID: &str = "screencaster";

/// Fresh peer connection with the engine's default codecs and interceptors
pub async fn build_peer(config: &ServerConfig) -> Result<Arc<RTCPeerConnection>, TransportError> {
    let mut media = MediaEngine::default();
    media.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut media)?;
    let api = APIBuilder::new()
        .with_media_engine(media)
        .with_interceptor_registry(registry)
        .build();

    let rtc_config = RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: vec![config.stun_server.clone()],
            ..Default::default()
        }],
        ..Default::default()
    };

    Ok(Arc::new(api.new_peer_connection(rtc_config).await?))
}

/// Outbound track for the audio producer
pub fn audio_track() -> Arc<TrackLocalStaticSample> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            ..Default::default()
        },
        "audio".to_owned(),
        STREAM_ID.to_owned(),
    ))
}

/// Outbound track for the video producer, negotiated with the sampler's
/// codec metadata
pub fn video_track(params: &CodecParams) -> Arc<TrackLocalStaticSample> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_H264.to_owned(),
            sdp_fmtp_line: params.fmtp_line(),
            ..Default::default()
        },
        "video".to_owned(),
        STREAM_ID.to_owned(),
    ))
}

pub async fn attach(
    peer: &RTCPeerConnection,
    track: Arc<TrackLocalStaticSample>,
) -> Result<(), TransportError> {
    peer.add_track(track as Arc<dyn TrackLocal + Send + Sync>)
        .await?;
    Ok(())
}

/// Apply the viewer's offer and produce our answer. Waits for ICE gathering
/// so the returned description carries its candidates.
pub async fn exchange(
    peer: &RTCPeerConnection,
    offer: RTCSessionDescription,
) -> Result<RTCSessionDescription, TransportError> {
    peer.set_remote_description(offer).await?;
    let answer = peer.create_answer(None).await?;
    let mut gather_complete = peer.gathering_complete_promise().await;
    peer.set_local_description(answer).await?;
    let _ = gather_complete.recv().await;
    peer.local_description()
        .await
        .ok_or(TransportError::MissingLocalDescription)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn peer_builds_without_network_activity() {
        let peer = build_peer(&ServerConfig::default()).await.unwrap();
        peer.close().await.unwrap();
    }
}
