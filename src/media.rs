//! Timed media units and the producer seam between the samplers and the
//! transport engine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

/// Which track a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation-timestamp unit, as a rational fraction of a second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: u32,
    pub den: u32,
}

impl TimeBase {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Wall-clock span covered by `steps` ticks of this time base
    pub fn span(&self, steps: i64) -> Duration {
        Duration::from_nanos(steps as u64 * self.num as u64 * 1_000_000_000 / self.den as u64)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// One timestamped payload on its way to the transport. Immutable once
/// constructed.
#[derive(Debug, Clone)]
pub struct MediaUnit {
    pub kind: MediaKind,
    pub payload: Bytes,
    pub pts: i64,
    pub time_base: TimeBase,
    /// Nominal span of this unit, used by the engine for pacing
    pub duration: Duration,
}

/// A producer of timed media units.
///
/// Implementations absorb every capture-path failure internally and degrade
/// to silence or a blank frame; `next_unit` therefore never fails. The only
/// blocking implementation is the audio sampler, and only up to its
/// configured pull timeout.
pub trait MediaSource: Send {
    fn kind(&self) -> MediaKind;

    /// Spacing the pump should apply between pulls. `None` means the source
    /// paces its caller itself (the audio sampler blocks on its queue).
    fn cadence(&self) -> Option<Duration>;

    fn next_unit(&mut self) -> MediaUnit;

    /// Release capture resources. Idempotent.
    fn shutdown(&mut self);
}

/// A producer as held by a session and its pump
pub type SharedSource = Arc<Mutex<Box<dyn MediaSource>>>;
