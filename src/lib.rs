//! Realtime binaural/entrainment audio engine: streaming noise synthesis,
//! oscillator voices, a crossfading track scheduler, and a cpal-backed
//! audio output loop behind a small control surface.

pub mod control;
pub mod error;
pub mod math;
pub mod model;
pub mod noise;
pub mod output;
pub mod scheduler;
pub mod voice;

pub use control::{init_default_logging, Engine, PlaybackStatus};
pub use error::{EngineError, EngineResult};
pub use model::TrackData;
pub use scheduler::TrackScheduler;
