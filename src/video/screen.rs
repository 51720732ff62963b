//! Screen sampling: one trimmed frame of the primary display per pull.
//!
//! Polling is synchronous and cheap relative to the frame interval, so
//! there is no queue between the display and the transport; the pump calls
//! straight into `next_unit` on its own clock.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use xcap::Monitor;

use crate::clock::TrackClock;
use crate::config::VideoConfig;
use crate::error::CaptureError;
use crate::media::{MediaKind, MediaSource, MediaUnit};

/// Codec metadata the transport needs for negotiation. Descriptive only;
/// encoding itself happens beyond the engine boundary.
#[derive(Debug, Clone)]
pub struct CodecParams {
    pub codec: &'static str,
    pub profile: &'static str,
    pub level: &'static str,
    pub packetization_mode: u8,
}

impl CodecParams {
    pub fn h264_high() -> Self {
        Self {
            codec: "h264",
            profile: "high",
            level: "4.2",
            packetization_mode: 1,
        }
    }

    /// profile-level-id octets: profile_idc, constraint flags, level_idc
    pub fn profile_level_id(&self) -> String {
        let profile_idc: u8 = match self.profile {
            "baseline" => 66,
            "main" => 77,
            _ => 100,
        };
        let level_idc = self
            .level
            .parse::<f32>()
            .map(|level| (level * 10.0).round() as u8)
            .unwrap_or(42);
        format!("{profile_idc:02x}00{level_idc:02x}")
    }

    /// fmtp attribute for the SDP media section
    pub fn fmtp_line(&self) -> String {
        format!(
            "level-asymmetry-allowed=1;packetization-mode={};profile-level-id={}",
            self.packetization_mode,
            self.profile_level_id()
        )
    }
}

pub struct ScreenSampler {
    monitor: Monitor,
    clock: TrackClock,
    frame_interval: Duration,
    last_size: (u32, u32),
    params: CodecParams,
}

impl ScreenSampler {
    /// Bind the primary display. No monitor at all is a construction-time
    /// error; everything after that degrades per pull instead of failing.
    pub fn new(config: &VideoConfig) -> Result<Self, CaptureError> {
        let mut monitors = Monitor::all().map_err(|e| CaptureError::Enumerate(e.to_string()))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoMonitor);
        }
        let index = monitors.iter().position(|m| m.is_primary()).unwrap_or(0);
        let monitor = monitors.swap_remove(index);

        let last_size = (monitor.width(), monitor.height());
        tracing::info!(
            monitor = %monitor.name(),
            width = last_size.0,
            height = last_size.1,
            fps = config.frame_rate,
            "bound display for capture"
        );

        Ok(Self {
            monitor,
            clock: TrackClock::video(config.frame_rate),
            frame_interval: Duration::from_secs(1) / config.frame_rate,
            last_size,
            params: CodecParams::h264_high(),
        })
    }

    pub fn codec_params(&self) -> &CodecParams {
        &self.params
    }

    fn grab(&mut self) -> Result<Bytes, CaptureError> {
        let image = self
            .monitor
            .capture_image()
            .map_err(|e| CaptureError::Grab(e.to_string()))?;
        self.last_size = (image.width(), image.height());
        Ok(strip_alpha(&image.into_raw()))
    }
}

impl MediaSource for ScreenSampler {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn cadence(&self) -> Option<Duration> {
        Some(self.frame_interval)
    }

    fn next_unit(&mut self) -> MediaUnit {
        let (pts, time_base) = self.clock.next_timestamp();
        let payload = match self.grab() {
            Ok(frame) => frame,
            Err(e) => {
                // a single lost grab must not end the session; reuse the
                // last known dimensions and send a blank frame
                tracing::warn!(error = %e, "screen grab failed, emitting blank frame");
                blank_frame(self.last_size.0, self.last_size.1)
            }
        };
        MediaUnit {
            kind: MediaKind::Video,
            payload,
            pts,
            time_base,
            duration: self.clock.tick_duration(),
        }
    }

    fn shutdown(&mut self) {
        // nothing held open between grabs; the monitor binding goes with us
    }
}

/// Drop the alpha channel of an RGBA buffer, keeping R, G, B order
fn strip_alpha(rgba: &[u8]) -> Bytes {
    let mut rgb = BytesMut::with_capacity(rgba.len() / 4 * 3);
    for pixel in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&pixel[..3]);
    }
    rgb.freeze()
}

fn blank_frame(width: u32, height: u32) -> Bytes {
    Bytes::from(vec![0u8; width as usize * height as usize * 3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_alpha_keeps_three_channels_in_order() {
        let rgba = [10, 20, 30, 255, 40, 50, 60, 128];
        let rgb = strip_alpha(&rgba);
        assert_eq!(&rgb[..], &[10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn strip_alpha_shrinks_by_a_quarter() {
        let rgba = vec![7u8; 64 * 4];
        assert_eq!(strip_alpha(&rgba).len(), 64 * 3);
    }

    #[test]
    fn blank_frame_has_rgb_dimensions() {
        let frame = blank_frame(16, 9);
        assert_eq!(frame.len(), 16 * 9 * 3);
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn h264_high_level_42_profile_id() {
        let params = CodecParams::h264_high();
        assert_eq!(params.profile_level_id(), "64002a");
        assert_eq!(
            params.fmtp_line(),
            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=64002a"
        );
    }

    #[test]
    fn baseline_profile_maps_to_its_idc() {
        let params = CodecParams {
            codec: "h264",
            profile: "baseline",
            level: "3.1",
            packetization_mode: 1,
        };
        assert_eq!(params.profile_level_id(), "42001f");
    }
}
