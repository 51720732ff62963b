//! Per-producer delivery workers.
//!
//! One blocking worker per attached track is the transport pull context:
//! it pulls a timed unit, hands it to the engine, and repeats until the
//! session's stop flag is raised. The audio source paces the loop itself by
//! blocking on its queue; the video source is paced here by a deadline loop
//! at its nominal frame interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tokio::runtime::Handle;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::media::SharedSource;

pub fn spawn_pump(
    track: Arc<TrackLocalStaticSample>,
    source: SharedSource,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || {
        let (kind, cadence) = {
            let source = source.lock();
            (source.kind(), source.cadence())
        };
        tracing::debug!(%kind, "media pump started");

        let mut deadline = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            let unit = source.lock().next_unit();
            let sample = Sample {
                data: unit.payload,
                duration: unit.duration,
                ..Default::default()
            };
            if let Err(e) = handle.block_on(track.write_sample(&sample)) {
                // normal before the viewer is connected and while closing
                tracing::trace!(%kind, error = %e, "engine not accepting samples");
            }

            if let Some(period) = cadence {
                deadline += period;
                match deadline.checked_duration_since(Instant::now()) {
                    Some(wait) => thread::sleep(wait),
                    None => deadline = Instant::now(), // fell behind, resync
                }
            }
        }
        tracing::debug!(%kind, "media pump stopped");
    })
}
