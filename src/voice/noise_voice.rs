//! `noise_swept_notch` / `noise_swept_notch_transition` voice (§4.4.6):
//! thin `Voice` adapter around [`crate::noise::SweptNotchGenerator`].

use crate::model::NoiseParams;
use crate::noise::SweptNotchGenerator;
use crate::voice::Voice;

pub struct NoiseSweptNotchVoice {
    generator: SweptNotchGenerator,
    amplitude: f64,
    elapsed: u64,
    total_samples: u64,
    scratch_l: Vec<f64>,
    scratch_r: Vec<f64>,
}

impl NoiseSweptNotchVoice {
    pub fn new(params: NoiseParams, fs: f64, step_duration: f64) -> Option<Self> {
        let total_samples = (step_duration * fs).round() as u64;
        let amplitude = params.amplitude;
        let generator = SweptNotchGenerator::new(params, fs, total_samples).ok()?;
        Some(NoiseSweptNotchVoice {
            generator,
            amplitude,
            elapsed: 0,
            total_samples,
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        })
    }
}

impl Voice for NoiseSweptNotchVoice {
    fn process(&mut self, out: &mut [f64]) {
        let frames = (out.len() / 2).min((self.total_samples - self.elapsed) as usize);
        if frames == 0 {
            return;
        }
        self.scratch_l.resize(frames, 0.0);
        self.scratch_r.resize(frames, 0.0);
        self.generator.generate(&mut self.scratch_l, &mut self.scratch_r);
        for i in 0..frames {
            out[2 * i] += self.scratch_l[i] * self.amplitude;
            if 2 * i + 1 < out.len() {
                out[2 * i + 1] += self.scratch_r[i] * self.amplitude;
            }
        }
        self.elapsed += frames as u64;
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.total_samples
    }

    fn normalization_peak(&self) -> f64 {
        self.amplitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::LfoWaveform;

    fn test_params() -> NoiseParams {
        NoiseParams {
            duration_seconds: 1.0,
            lfo_waveform: LfoWaveform::Sine,
            transition: false,
            start_lfo_freq: 0.1,
            end_lfo_freq: 0.1,
            sweeps: Vec::new(),
            exponent: 1.0,
            high_exponent: 1.0,
            distribution_curve: 1.0,
            lowcut: None,
            highcut: None,
            amplitude: 0.8,
            seed: 7,
            phase_offset_deg: 0.0,
            initial_offset: 0.0,
        }
    }

    #[test]
    fn produces_bounded_output_and_reports_peak() {
        let mut voice = NoiseSweptNotchVoice::new(test_params(), 8_000.0, 0.5).unwrap();
        assert_eq!(voice.normalization_peak(), 0.8);
        let mut out = vec![0.0; 2 * 2048];
        voice.process(&mut out);
        assert!(out.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn finishes_after_step_duration() {
        let mut voice = NoiseSweptNotchVoice::new(test_params(), 1000.0, 0.01).unwrap();
        let mut out = vec![0.0; 2 * 20];
        voice.process(&mut out);
        assert!(voice.is_finished());
    }
}
