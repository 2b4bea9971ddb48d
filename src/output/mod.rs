//! Device selection (§4.7) and the cpal-backed audio output loop.

pub mod device;
mod engine;

pub use device::{AudioConfig, AudioDeviceInfo};
pub use engine::{AudioOutput, AudioOutputHandle};
