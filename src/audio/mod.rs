//! Audio subsystem: device selection, bounded block hand-off, sampler

pub mod device;
pub mod queue;
pub mod sampler;

pub use device::{list_devices, DeviceStrategy};
pub use queue::{BlockQueue, OverflowPolicy};
pub use sampler::AudioSampler;
