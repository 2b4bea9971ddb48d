//! Background noise layer (§4.6.3): a single [`SweptNotchGenerator`] mixed
//! underneath every step, gated by its own start time and fade envelope and
//! independent of the step/crossfade state machine above it.

use crate::model::{envelope_value_at, is_realtime_compatible, BackgroundNoiseData};
use crate::noise::SweptNotchGenerator;

pub struct BackgroundNoiseState {
    pub data: BackgroundNoiseData,
    generator: SweptNotchGenerator,
    fs: f64,
    start_sample: u64,
    duration_samples: u64,
    fade_in_samples: u64,
    fade_out_samples: u64,
    /// Position within the noise layer's own timeline (0 at `start_sample`).
    playback_sample: u64,
}

impl BackgroundNoiseState {
    pub fn new(data: BackgroundNoiseData, fs: f64) -> Option<Self> {
        let duration_samples = (data.noise_params.duration_seconds * fs).round() as u64;
        let generator = SweptNotchGenerator::new(data.noise_params.clone(), fs, duration_samples).ok()?;
        Some(BackgroundNoiseState {
            start_sample: (data.start_time.max(0.0) * fs).round() as u64,
            duration_samples,
            fade_in_samples: (data.fade_in.max(0.0) * fs).round() as u64,
            fade_out_samples: (data.fade_out.max(0.0) * fs).round() as u64,
            data,
            generator,
            fs,
            playback_sample: 0,
        })
    }

    /// Whether `incoming` can replace `self.data` by updating the running
    /// generator in place rather than rebuilding it from scratch (§4.6.3:
    /// same start/fade/envelope, realtime-compatible noise parameters).
    pub fn is_compatible(&self, incoming: &BackgroundNoiseData) -> bool {
        (self.data.start_time - incoming.start_time).abs() < 1e-9
            && (self.data.fade_in - incoming.fade_in).abs() < 1e-9
            && (self.data.fade_out - incoming.fade_out).abs() < 1e-9
            && self.data.amp_envelope == incoming.amp_envelope
            && is_realtime_compatible(&self.data.noise_params, &incoming.noise_params)
    }

    pub fn update_in_place(&mut self, incoming: BackgroundNoiseData) {
        self.duration_samples = (incoming.noise_params.duration_seconds * self.fs).round() as u64;
        self.generator.update_realtime_params(incoming.noise_params.clone());
        self.data = incoming;
    }

    /// Realigns the generator's own stream position after a seek, by
    /// discarding samples rather than resetting (§4.6.4): the FFT source and
    /// overlap-add frame counter only ever move forward.
    pub fn realign_to(&mut self, absolute_sample: u64) {
        if absolute_sample <= self.start_sample {
            self.playback_sample = 0;
            return;
        }
        let target = (absolute_sample - self.start_sample).min(self.duration_samples);
        if target > self.playback_sample {
            self.generator.skip_samples(target - self.playback_sample);
        }
        self.playback_sample = target;
    }

    /// Adds this layer's contribution to `out` for the block starting at
    /// global sample index `block_start` (the scheduler's `absoluteSample`
    /// before this block is added). Frames before `start_sample` or past the
    /// layer's own duration are left untouched.
    pub fn mix_into(&mut self, out: &mut [f64], block_start: u64, frames: usize) {
        let block_end = block_start + frames as u64;
        let noise_end = self.start_sample + self.duration_samples;
        if block_end <= self.start_sample || block_start >= noise_end {
            return;
        }

        let local_start = self.start_sample.saturating_sub(block_start) as usize;
        let overlap_end = block_end.min(noise_end);
        let avail = (overlap_end - block_start.max(self.start_sample)) as usize;
        if avail == 0 {
            return;
        }

        let mut l = vec![0.0_f64; avail];
        let mut r = vec![0.0_f64; avail];
        self.generator.generate(&mut l, &mut r);

        for i in 0..avail {
            let pos = self.playback_sample + i as u64;
            let fade_in = if self.fade_in_samples > 0 {
                (pos as f64 / self.fade_in_samples as f64).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let remaining = self.duration_samples.saturating_sub(pos);
            let fade_out = if self.fade_out_samples > 0 {
                (remaining as f64 / self.fade_out_samples as f64).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let envelope = self
                .data
                .amp_envelope
                .as_deref()
                .map(|points| envelope_value_at(points, pos as f64 / self.fs))
                .unwrap_or(1.0);
            let gain = self.data.gain * fade_in * fade_out * envelope;

            let idx = (local_start + i) * 2;
            out[idx] += l[i] * gain;
            out[idx + 1] += r[i] * gain;
        }

        self.playback_sample += avail as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::LfoWaveform;
    use crate::model::NoiseParams;

    fn params() -> NoiseParams {
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
            amplitude: 0.5,
            seed: 3,
            phase_offset_deg: 0.0,
            initial_offset: 0.0,
        }
    }

    fn bg_data() -> BackgroundNoiseData {
        BackgroundNoiseData { noise_params: params(), gain: 0.5, start_time: 0.0, fade_in: 0.0, fade_out: 0.0, amp_envelope: None }
    }

    #[test]
    fn silent_before_start_time() {
        let mut bg = BackgroundNoiseState::new(
            BackgroundNoiseData { start_time: 1.0, ..bg_data() },
            1000.0,
        )
        .unwrap();
        let mut out = vec![0.0; 2 * 500];
        bg.mix_into(&mut out, 0, 500);
        assert!(out.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn produces_bounded_audio_once_started() {
        let mut bg = BackgroundNoiseState::new(bg_data(), 1000.0).unwrap();
        let mut out = vec![0.0; 2 * 500];
        bg.mix_into(&mut out, 0, 500);
        assert!(out.iter().any(|x| *x != 0.0));
        assert!(out.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn realign_skips_generator_forward() {
        let mut bg = BackgroundNoiseState::new(bg_data(), 1000.0).unwrap();
        bg.realign_to(200);
        assert_eq!(bg.playback_sample, 200);
    }
}
