//! Video subsystem: screen sampling and codec negotiation metadata

pub mod screen;

pub use screen::{CodecParams, ScreenSampler};
