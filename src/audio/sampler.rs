//! System audio capture surfaced as timed units on demand.
//!
//! A dedicated thread owns the cpal stream (streams are not `Send`); the
//! hardware drives its callback independently of everything else and
//! deposits interleaved s16 blocks into the bounded queue. The pull side
//! runs on the transport's schedule and never propagates a capture failure:
//! late audio becomes silence, short reads are padded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::bounded;

use crate::audio::device::{AudioDevice, DeviceStrategy};
use crate::audio::queue::BlockQueue;
use crate::clock::TrackClock;
use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::media::{MediaKind, MediaSource, MediaUnit};

pub struct AudioSampler {
    queue: Arc<BlockQueue>,
    clock: TrackClock,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    block_bytes: usize,
    pull_timeout: Duration,
    device_name: String,
}

impl AudioSampler {
    /// Open the capture device and start the hardware stream. Failure to
    /// open the device fails construction; a partially started worker is
    /// joined before the error is returned.
    pub fn new(config: &AudioConfig) -> Result<Self, AudioError> {
        let device = DeviceStrategy::from_override(config.device.as_deref()).select()?;
        let device_name = device.name.clone();
        let sample_format = device.default_input_config()?.sample_format();

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.block_frames),
        };

        let queue = Arc::new(BlockQueue::new(config.queue_blocks, config.overflow));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let worker = {
            let queue = queue.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("audio-capture".to_string())
                .spawn(move || run_capture(device, stream_config, sample_format, queue, running, ready_tx))
                .map_err(|e| AudioError::StreamOpen(e.to_string()))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(AudioError::StreamOpen(
                    "capture thread exited before the stream came up".to_string(),
                ));
            }
        }

        tracing::info!(
            device = %device_name,
            rate = config.sample_rate,
            channels = config.channels,
            block_frames = config.block_frames,
            "audio capture started"
        );

        Ok(Self {
            queue,
            clock: TrackClock::audio(config.block_frames, config.sample_rate),
            running,
            worker: Some(worker),
            block_bytes: config.block_bytes(),
            pull_timeout: config.pull_timeout(),
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stop the hardware stream and release the device. Idempotent, and
    /// safe to call on a sampler whose stream never came up.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            tracing::debug!(device = %self.device_name, "audio capture stopped");
        }
    }

    fn silence(&self) -> Bytes {
        Bytes::from(vec![0u8; self.block_bytes])
    }
}

impl MediaSource for AudioSampler {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn cadence(&self) -> Option<Duration> {
        // the queue wait paces the pump
        None
    }

    fn next_unit(&mut self) -> MediaUnit {
        let (pts, time_base) = self.clock.next_timestamp();
        let payload = match self.queue.pop_timeout(self.pull_timeout) {
            Some(block) => align_block(block, self.block_bytes),
            None => {
                tracing::debug!(timeout = ?self.pull_timeout, "no audio in time, emitting silence");
                self.silence()
            }
        };
        MediaUnit {
            kind: MediaKind::Audio,
            payload,
            pts,
            time_base,
            duration: self.clock.tick_duration(),
        }
    }

    fn shutdown(&mut self) {
        AudioSampler::shutdown(self);
    }
}

impl Drop for AudioSampler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bring a block to the exact expected length: zero-pad short reads,
/// trim anything longer.
fn align_block(block: Bytes, want: usize) -> Bytes {
    match block.len() {
        len if len == want => block,
        len if len > want => block.slice(..want),
        len => {
            tracing::debug!(got = len, want, "short audio read, zero-padding");
            let mut padded = BytesMut::with_capacity(want);
            padded.extend_from_slice(&block);
            padded.resize(want, 0);
            padded.freeze()
        }
    }
}

/// Body of the capture thread: build and start the stream, report readiness,
/// then park until shutdown. Dropping the stream at the end of this scope
/// stops the hardware callback before the device handle is released.
fn run_capture(
    device: AudioDevice,
    config: StreamConfig,
    sample_format: SampleFormat,
    queue: Arc<BlockQueue>,
    running: Arc<AtomicBool>,
    ready_tx: crossbeam_channel::Sender<Result<(), AudioError>>,
) {
    let device = device.into_inner();
    let stream = match sample_format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, queue),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, queue),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, queue),
        other => Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::StreamOpen(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(10));
    }
}

/// Build an input stream whose callback converts whatever the hardware
/// delivers to interleaved s16le and enqueues one block per period.
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    queue: Arc<BlockQueue>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut block = BytesMut::with_capacity(data.len() * 2);
                for &sample in data {
                    block.extend_from_slice(&i16::from_sample(sample).to_le_bytes());
                }
                queue.push(block.freeze());
            },
            // overruns and device dropouts surface here; they degrade the
            // stream but never end the session
            |err| tracing::warn!(error = %err, "audio stream fault"),
            None,
        )
        .map_err(|e| AudioError::StreamOpen(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::OverflowPolicy;

    /// Sampler over a bare queue, no hardware attached. Pull semantics are
    /// identical to a live sampler whose device has gone quiet.
    fn detached(pull_timeout: Duration) -> AudioSampler {
        let config = AudioConfig::default();
        AudioSampler {
            queue: Arc::new(BlockQueue::new(config.queue_blocks, OverflowPolicy::EvictOldest)),
            clock: TrackClock::audio(config.block_frames, config.sample_rate),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            block_bytes: config.block_bytes(),
            pull_timeout,
            device_name: "detached".to_string(),
        }
    }

    const BLOCK_BYTES: usize = 4096;

    #[test]
    fn timeout_pull_synthesizes_silence() {
        let mut sampler = detached(Duration::from_millis(20));
        let unit = sampler.next_unit();
        assert_eq!(unit.kind, MediaKind::Audio);
        assert_eq!(unit.payload.len(), BLOCK_BYTES);
        assert!(unit.payload.iter().all(|&b| b == 0));
    }

    #[test]
    fn short_read_is_zero_padded() {
        let mut sampler = detached(Duration::from_millis(20));
        sampler.queue.push(Bytes::from(vec![0xAAu8; 100]));
        let unit = sampler.next_unit();
        assert_eq!(unit.payload.len(), BLOCK_BYTES);
        assert!(unit.payload[..100].iter().all(|&b| b == 0xAA));
        assert!(unit.payload[100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn payload_length_is_invariant_across_paths() {
        let mut sampler = detached(Duration::from_millis(20));
        sampler.queue.push(Bytes::from(vec![1u8; BLOCK_BYTES])); // exact
        sampler.queue.push(Bytes::from(vec![2u8; 10])); // short
        sampler.queue.push(Bytes::from(vec![3u8; BLOCK_BYTES + 512])); // long
        for _ in 0..4 {
            // fourth pull times out and synthesizes
            assert_eq!(sampler.next_unit().payload.len(), BLOCK_BYTES);
        }
    }

    #[test]
    fn timestamps_advance_by_block_regardless_of_data() {
        let mut sampler = detached(Duration::from_millis(5));
        sampler.queue.push(Bytes::from(vec![1u8; BLOCK_BYTES]));
        let first = sampler.next_unit();
        let starved = sampler.next_unit(); // silence
        sampler.queue.push(Bytes::from(vec![2u8; BLOCK_BYTES]));
        let third = sampler.next_unit();
        assert_eq!(first.pts, 0);
        assert_eq!(starved.pts, 1024);
        assert_eq!(third.pts, 2048);
        assert_eq!(first.time_base, third.time_base);
    }

    #[test]
    fn empty_queue_pull_returns_in_about_the_timeout() {
        let mut sampler = detached(Duration::from_millis(500));
        let start = std::time::Instant::now();
        let unit = sampler.next_unit();
        let elapsed = start.elapsed();
        assert!(unit.payload.iter().all(|&b| b == 0));
        assert!(elapsed >= Duration::from_millis(450), "returned too early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "returned too late: {elapsed:?}");
    }

    #[test]
    fn queued_audio_is_delivered_in_fifo_order() {
        let mut sampler = detached(Duration::from_millis(20));
        for tag in 1..=3u8 {
            sampler.queue.push(Bytes::from(vec![tag; BLOCK_BYTES]));
        }
        for tag in 1..=3u8 {
            assert_eq!(sampler.next_unit().payload[0], tag);
        }
    }

    #[test]
    fn shutdown_is_idempotent_and_safe_without_a_stream() {
        let mut sampler = detached(Duration::from_millis(5));
        sampler.shutdown();
        sampler.shutdown();
    }

    #[test]
    fn align_block_handles_all_three_shapes() {
        assert_eq!(align_block(Bytes::from(vec![1u8; 8]), 8).len(), 8);
        assert_eq!(align_block(Bytes::from(vec![1u8; 3]), 8).len(), 8);
        assert_eq!(align_block(Bytes::from(vec![1u8; 12]), 8).len(), 8);
        let padded = align_block(Bytes::from(vec![9u8; 2]), 4);
        assert_eq!(&padded[..], &[9, 9, 0, 0]);
    }
}
