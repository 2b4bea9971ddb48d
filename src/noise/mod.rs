//! Streaming noise generator (§4.5): FFT-shaped mono synthesis, optional
//! Butterworth shelving, and the swept-notch stereo overlay.

mod generator;
mod rms;
mod shelves;
mod sweep;

pub use generator::{FftNoiseGenerator, CROSSFADE_SAMPLES, UNDERRUN_FADE_SAMPLES};
pub use rms::RmsCompensator;
pub use shelves::ButterworthShelves;
pub use sweep::SweptNotchGenerator;
