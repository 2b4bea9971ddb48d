//! `isochronic_tone` voice (§4.4.3): "as binaural but collapsed to a single
//! centre frequency and pulsed with a trapezoid envelope at `beatFreq`".

use crate::math::{pan2, trapezoid_envelope};
use crate::model::ParamMap;
use crate::voice::oscillator::{BinauralCore, BinauralParams};
use crate::voice::Voice;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy)]
pub struct IsochronicParams {
    pub base: BinauralParams,
    pub ramp_percent: f64,
    pub gap_percent: f64,
    pub pan_enabled: bool,
    pub pan_freq: f64,
    pub pan_range_min: f64,
    pub pan_range_max: f64,
    pub pan_phase_rad: f64,
}

impl IsochronicParams {
    pub fn from_params(p: &ParamMap) -> Self {
        let mut base = BinauralParams::from_params(p);
        base.force_mono = true;
        IsochronicParams {
            base,
            ramp_percent: p.f64("rampPercent", 0.2).clamp(0.0, 0.5),
            gap_percent: p.f64("gapPercent", 0.15).clamp(0.0, 1.0),
            pan_enabled: p.contains("panFreq"),
            pan_freq: p.f64("panFreq", 0.0),
            pan_range_min: p.f64("panRangeMin", -1.0).clamp(-1.0, 1.0),
            pan_range_max: p.f64("panRangeMax", 1.0).clamp(-1.0, 1.0),
            pan_phase_rad: p.f64("panPhase", 0.0).to_radians(),
        }
    }

    /// Equal-power pan gains at time `t`, or `(1.0, 1.0)` when no pan LFO
    /// was configured (§4.4.3 optional sinusoidal pan).
    pub(crate) fn pan_gains(&self, t: f64) -> (f64, f64) {
        if !self.pan_enabled {
            return (1.0, 1.0);
        }
        let lfo = 0.5 * (1.0 + (2.0 * PI * self.pan_freq * t + self.pan_phase_rad).sin());
        let p = self.pan_range_min + (self.pan_range_max - self.pan_range_min) * lfo;
        pan2(p.clamp(-1.0, 1.0))
    }
}

pub struct IsochronicTone {
    params: IsochronicParams,
    core: BinauralCore,
    fs: f64,
    elapsed: u64,
    total_samples: u64,
}

impl IsochronicTone {
    pub fn new(parameters: &ParamMap, fs: f64, step_duration: f64) -> Self {
        IsochronicTone {
            params: IsochronicParams::from_params(parameters),
            core: BinauralCore::default(),
            fs,
            elapsed: 0,
            total_samples: (step_duration * fs).round() as u64,
        }
    }
}

impl Voice for IsochronicTone {
    fn process(&mut self, out: &mut [f64]) {
        for frame in out.chunks_mut(2) {
            if self.elapsed >= self.total_samples {
                break;
            }
            let t = self.elapsed as f64 / self.fs;
            let (carrier, _) = self.core.next_sample(&self.params.base, t, self.fs);
            let beat_freq = self.params.base.beat_freq.max(0.0);
            let gate = if beat_freq > 0.0 {
                trapezoid_envelope(t, 1.0 / beat_freq, self.params.ramp_percent, self.params.gap_percent)
            } else {
                1.0
            };
            let sample = carrier * gate;
            let (gl, gr) = self.params.pan_gains(t);
            frame[0] += sample * gl;
            if frame.len() > 1 {
                frame[1] += sample * gr;
            }
            self.elapsed += 1;
        }
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.total_samples
    }

    fn phases(&self) -> Option<(f64, f64)> {
        Some(self.core.phases())
    }

    fn set_phases(&mut self, l: f64, r: f64) {
        self.core.set_phases(l, r);
    }

    fn normalization_peak(&self) -> f64 {
        self.params.base.peak()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, serde_json::Value)]) -> ParamMap {
        let mut m = serde_json::Map::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        ParamMap::from_value(&serde_json::Value::Object(m))
    }

    #[test]
    fn output_is_mono_in_both_channels() {
        let p = params(&[("baseFreq", serde_json::json!(100.0)), ("beatFreq", serde_json::json!(5.0)), ("ampL", serde_json::json!(1.0)), ("ampR", serde_json::json!(1.0))]);
        let mut voice = IsochronicTone::new(&p, 48_000.0, 0.1);
        let mut out = vec![0.0; 2 * 256];
        voice.process(&mut out);
        for frame in out.chunks(2) {
            assert!((frame[0] - frame[1]).abs() < 1e-12);
        }
    }

    #[test]
    fn gap_silences_the_trough_of_each_pulse() {
        let p = params(&[
            ("baseFreq", serde_json::json!(200.0)),
            ("beatFreq", serde_json::json!(10.0)),
            ("ampL", serde_json::json!(1.0)),
            ("ampR", serde_json::json!(1.0)),
            ("gapPercent", serde_json::json!(0.3)),
        ]);
        let voice = IsochronicTone::new(&p, 48_000.0, 1.0);
        let cycle = 1.0 / voice.params.base.beat_freq;
        let gate = trapezoid_envelope(cycle * 0.05, cycle, voice.params.ramp_percent, voice.params.gap_percent);
        assert_eq!(gate, 0.0);
    }

    #[test]
    fn finishes_after_step_duration() {
        let p = ParamMap::default();
        let mut voice = IsochronicTone::new(&p, 1000.0, 0.01);
        let mut out = vec![0.0; 2 * 20];
        voice.process(&mut out);
        assert!(voice.is_finished());
    }

    #[test]
    fn without_pan_freq_both_channels_stay_equal() {
        let p = params(&[("baseFreq", serde_json::json!(100.0)), ("beatFreq", serde_json::json!(5.0))]);
        let mut voice = IsochronicTone::new(&p, 48_000.0, 0.1);
        let mut out = vec![0.0; 2 * 256];
        voice.process(&mut out);
        for frame in out.chunks(2) {
            assert!((frame[0] - frame[1]).abs() < 1e-12);
        }
    }

    #[test]
    fn pan_freq_moves_energy_between_channels() {
        let p = params(&[
            ("baseFreq", serde_json::json!(100.0)),
            ("beatFreq", serde_json::json!(5.0)),
            ("panFreq", serde_json::json!(0.5)),
            ("panRangeMin", serde_json::json!(-1.0)),
            ("panRangeMax", serde_json::json!(1.0)),
        ]);
        let mut voice = IsochronicTone::new(&p, 48_000.0, 2.0);
        let mut out = vec![0.0; 2 * 48_000 * 2];
        voice.process(&mut out);
        let left_energy: f64 = out.chunks(2).map(|f| f[0] * f[0]).sum();
        let right_energy: f64 = out.chunks(2).map(|f| f[1] * f[1]).sum();
        // over a full pan cycle both channels should receive comparable energy
        assert!((left_energy - right_energy).abs() / left_energy.max(right_energy) < 0.1);
        // but some individual frames should be left- or right-biased
        let (gl0, gr0) = voice.params.pan_gains(0.5);
        assert_ne!(gl0, gr0);
    }
}
