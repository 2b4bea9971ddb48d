//! Shared binaural oscillator core (§4.4.1), reused unmodified by
//! [`crate::voice::binaural::BinauralBeat`] and
//! [`crate::voice::isochronic::IsochronicTone`] ("as binaural but...").

use crate::math::{sin_lut, skewed_sine_phase, skewed_triangle_phase};
use crate::model::ParamMap;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscShape {
    Sine,
    Triangle,
}

impl OscShape {
    fn skewed(&self, p: f64, skew: f64) -> f64 {
        match self {
            OscShape::Sine => skewed_sine_phase(p, skew),
            OscShape::Triangle => skewed_triangle_phase(p, skew),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BinauralParams {
    pub base_freq: f64,
    pub beat_freq: f64,
    pub force_mono: bool,
    pub left_high: bool,
    pub freq_osc_shape: OscShape,
    pub vib_freq_l: f64,
    pub vib_freq_r: f64,
    pub vib_range_l: f64,
    pub vib_range_r: f64,
    pub vib_phase_off_l: f64,
    pub vib_phase_off_r: f64,
    pub vib_skew_l: f64,
    pub vib_skew_r: f64,
    pub phase_osc_range: f64,
    pub phase_osc_freq: f64,
    pub amp_l: f64,
    pub amp_r: f64,
    pub amp_depth_l: f64,
    pub amp_depth_r: f64,
    pub amp_freq_l: f64,
    pub amp_freq_r: f64,
    pub amp_phase_off_l: f64,
    pub amp_phase_off_r: f64,
    pub amp_skew_l: f64,
    pub amp_skew_r: f64,
}

impl BinauralParams {
    pub fn from_params(p: &ParamMap) -> Self {
        let shape = if p.str("freqOscShape", "sine") == "triangle" {
            OscShape::Triangle
        } else {
            OscShape::Sine
        };
        BinauralParams {
            base_freq: p.f64("baseFreq", 200.0),
            beat_freq: p.f64("beatFreq", 4.0),
            force_mono: p.bool("forceMono", false),
            left_high: p.bool("leftHigh", true),
            freq_osc_shape: shape,
            vib_freq_l: p.f64("vibFreqL", 0.0),
            vib_freq_r: p.f64("vibFreqR", 0.0),
            vib_range_l: p.f64("vibRangeL", 0.0),
            vib_range_r: p.f64("vibRangeR", 0.0),
            vib_phase_off_l: p.f64("vibPhaseOffL", 0.0),
            vib_phase_off_r: p.f64("vibPhaseOffR", 0.0),
            vib_skew_l: p.f64("vibSkewL", 0.0),
            vib_skew_r: p.f64("vibSkewR", 0.0),
            phase_osc_range: p.f64("phaseOscRange", 0.0),
            phase_osc_freq: p.f64("phaseOscFreq", 0.0),
            amp_l: p.f64("ampL", 0.5),
            amp_r: p.f64("ampR", 0.5),
            amp_depth_l: p.f64("ampDepthL", 0.0),
            amp_depth_r: p.f64("ampDepthR", 0.0),
            amp_freq_l: p.f64("ampFreqL", 0.0),
            amp_freq_r: p.f64("ampFreqR", 0.0),
            amp_phase_off_l: p.f64("ampPhaseOffL", 0.0),
            amp_phase_off_r: p.f64("ampPhaseOffR", 0.0),
            amp_skew_l: p.f64("ampSkewL", 0.0),
            amp_skew_r: p.f64("ampSkewR", 0.0),
        }
    }

    pub fn peak(&self) -> f64 {
        self.amp_l.max(self.amp_r)
    }
}

/// Carries integrated phase across samples and, at step boundaries, across
/// steps (§4.4's phase-continuity contract).
#[derive(Debug, Clone, Copy, Default)]
pub struct BinauralCore {
    pub phase_l: f64,
    pub phase_r: f64,
}

impl BinauralCore {
    pub fn phases(&self) -> (f64, f64) {
        (self.phase_l, self.phase_r)
    }

    pub fn set_phases(&mut self, l: f64, r: f64) {
        self.phase_l = l;
        self.phase_r = r;
    }

    /// Advances the oscillator by one sample at absolute time `t` and
    /// returns `(left, right)` output samples (envelope and amp already
    /// applied).
    pub fn next_sample(&mut self, params: &BinauralParams, t: f64, fs: f64) -> (f64, f64) {
        let two_pi = 2.0 * PI;
        let dt = 1.0 / fs;

        let p_l = params.vib_freq_l * t + params.vib_phase_off_l / two_pi;
        let p_r = params.vib_freq_r * t + params.vib_phase_off_r / two_pi;
        let vib_l = (params.vib_range_l / 2.0) * params.freq_osc_shape.skewed(p_l, params.vib_skew_l);
        let vib_r = (params.vib_range_r / 2.0) * params.freq_osc_shape.skewed(p_r, params.vib_skew_r);

        let (freq_l, freq_r) = if params.force_mono || params.beat_freq == 0.0 {
            let f = params.base_freq.max(0.0);
            (f, f)
        } else {
            let half = params.beat_freq / 2.0;
            if params.left_high {
                (params.base_freq + vib_l + half, params.base_freq + vib_r - half)
            } else {
                (params.base_freq + vib_l - half, params.base_freq + vib_r + half)
            }
        };

        self.phase_l = (self.phase_l + two_pi * freq_l * dt).rem_euclid(two_pi);
        self.phase_r = (self.phase_r + two_pi * freq_r * dt).rem_euclid(two_pi);

        let d_phi = (params.phase_osc_range / 2.0) * sin_lut(two_pi * params.phase_osc_freq * t);
        let display_l = self.phase_l - d_phi;
        let display_r = self.phase_r + d_phi;

        let amp_phase_l = params.amp_freq_l * t + params.amp_phase_off_l;
        let amp_phase_r = params.amp_freq_r * t + params.amp_phase_off_r;
        let env_l = 1.0 - params.amp_depth_l * (1.0 + skewed_sine_phase(amp_phase_l, params.amp_skew_l)) / 2.0;
        let env_r = 1.0 - params.amp_depth_r * (1.0 + skewed_sine_phase(amp_phase_r, params.amp_skew_r)) / 2.0;

        let out_l = sin_lut(display_l) * env_l * params.amp_l;
        let out_r = sin_lut(display_r) * env_r * params.amp_r;
        (out_l, out_r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params() -> BinauralParams {
        BinauralParams::from_params(&ParamMap::default())
    }

    #[test]
    fn force_mono_collapses_to_base_frequency() {
        let mut params = default_params();
        params.force_mono = true;
        let mut core = BinauralCore::default();
        let fs = 48_000.0;
        for i in 0..100 {
            core.next_sample(&params, i as f64 / fs, fs);
        }
        assert!((core.phase_l - core.phase_r).abs() < 1e-9);
    }

    #[test]
    fn beat_freq_splits_channel_phase() {
        let mut params = default_params();
        params.beat_freq = 10.0;
        params.left_high = true;
        let mut core = BinauralCore::default();
        let fs = 48_000.0;
        for i in 0..480 {
            core.next_sample(&params, i as f64 / fs, fs);
        }
        assert!(core.phase_l != core.phase_r);
    }

    #[test]
    fn output_stays_within_amp_bounds() {
        let params = default_params();
        let mut core = BinauralCore::default();
        let fs = 48_000.0;
        for i in 0..4800 {
            let (l, r) = core.next_sample(&params, i as f64 / fs, fs);
            assert!(l.abs() <= params.amp_l + 1e-9);
            assert!(r.abs() <= params.amp_r + 1e-9);
        }
    }
}
