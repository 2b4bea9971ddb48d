//! `binaural_beat` voice (§4.4.1): two detuned sinusoids, one per ear, with
//! vibrato, amplitude and phase LFOs layered on top of the oscillator core.

use crate::model::ParamMap;
use crate::voice::oscillator::{BinauralCore, BinauralParams};
use crate::voice::Voice;

pub struct BinauralBeat {
    params: BinauralParams,
    core: BinauralCore,
    fs: f64,
    elapsed: u64,
    total_samples: u64,
}

impl BinauralBeat {
    pub fn new(parameters: &ParamMap, fs: f64, step_duration: f64) -> Self {
        BinauralBeat {
            params: BinauralParams::from_params(parameters),
            core: BinauralCore::default(),
            fs,
            elapsed: 0,
            total_samples: (step_duration * fs).round() as u64,
        }
    }
}

impl Voice for BinauralBeat {
    fn process(&mut self, out: &mut [f64]) {
        for frame in out.chunks_mut(2) {
            if self.elapsed >= self.total_samples {
                break;
            }
            let t = self.elapsed as f64 / self.fs;
            let (l, r) = self.core.next_sample(&self.params, t, self.fs);
            frame[0] += l;
            if frame.len() > 1 {
                frame[1] += r;
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
        self.params.peak()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, f64)]) -> ParamMap {
        let mut m = serde_json::Map::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), serde_json::json!(v));
        }
        ParamMap::from_value(&serde_json::Value::Object(m))
    }

    #[test]
    fn single_tone_both_channels_equal_at_zero_beat() {
        let p = params(&[("baseFreq", 220.0), ("beatFreq", 0.0), ("ampL", 1.0), ("ampR", 1.0)]);
        let mut voice = BinauralBeat::new(&p, 48_000.0, 0.1);
        let mut out = vec![0.0; 2 * 256];
        voice.process(&mut out);
        for frame in out.chunks(2) {
            assert!((frame[0] - frame[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn beat_freq_splits_left_and_right_frequency() {
        let p = params(&[("baseFreq", 200.0), ("beatFreq", 10.0), ("ampL", 1.0), ("ampR", 1.0), ("leftHigh", 0.0)]);
        let mut voice = BinauralBeat::new(&p, 48_000.0, 1.0);
        let mut out = vec![0.0; 2 * 48_000];
        voice.process(&mut out);
        let (phi_l, phi_r) = voice.phases().unwrap();
        assert!((phi_l - phi_r).abs() > 1e-6);
    }

    #[test]
    fn finishes_after_step_duration() {
        let p = ParamMap::default();
        let mut voice = BinauralBeat::new(&p, 1000.0, 0.01);
        let mut out = vec![0.0; 2 * 20];
        voice.process(&mut out);
        assert!(voice.is_finished());
    }
}
