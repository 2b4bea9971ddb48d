//! Branch-free math kernels shared by the voice and noise hot loops.
//!
//! Everything here is process-wide, read-only after first use (the sine
//! LUT), or cheap enough to compute per sample without allocating.

mod biquad;
mod fft;
mod lut;
mod noise_source;

pub use biquad::{
    biquad_time_varying_block, butterworth_highpass_coeffs, butterworth_lowpass_coeffs,
    notch_coeffs, BiquadCoeffs, BiquadState,
};
pub use fft::Fft;
pub use lut::{
    cos_lut, pan2, skewed_sine_phase, skewed_triangle_phase, sin_lut, trapezoid_envelope,
    LfoWaveform,
};
pub use noise_source::GaussianSource;
