//! Error taxonomy for the engine.
//!
//! Internal components return the richer [`EngineError`]; the control
//! surface (`crate::control`) converts it to `Result<T, String>` at its
//! boundary, matching the plain-string contract the rest of the public API
//! uses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid track configuration: {0}")]
    Config(String),

    #[error("unknown voice synth_function '{0}', voice skipped")]
    UnknownVoice(String),

    #[error("unknown noise colour preset '{0}'")]
    UnknownNoisePreset(String),

    #[error("track update is not realtime-compatible with the running noise generator, rebuilding")]
    RealtimeIncompatibleUpdate,

    #[error("audio output writer failed: {0}")]
    OutputWrite(String),

    #[error("position out of bounds, clamped")]
    Bounds,

    #[error("fft size {0} is not a positive power of two")]
    InvalidSize(usize),

    #[error("failed to open audio device: {0}")]
    Device(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
