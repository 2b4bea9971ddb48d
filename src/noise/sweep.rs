//! Swept-notch overlap-add layer (§4.5.4): wraps the mono FFT noise
//! generator, turns it into a stereo stream by running one or more
//! independent time-varying notch cascades per channel, and reconstructs
//! the result with a windowed, window-sum-normalised overlap-add.

use crate::error::EngineResult;
use crate::math::{biquad_time_varying_block, BiquadState, LfoWaveform};
use crate::model::{is_realtime_compatible, NoiseParams, NoiseSweep};
use crate::noise::generator::FftNoiseGenerator;
use crate::noise::rms::RmsCompensator;
use std::f64::consts::PI;

const FRAME: usize = 2048;
const HOP: usize = 1024;
const RING: usize = FRAME * 2;

fn hann_window() -> &'static [f64; FRAME] {
    static WINDOW: once_cell::sync::OnceCell<[f64; FRAME]> = once_cell::sync::OnceCell::new();
    WINDOW.get_or_init(|| {
        let mut w = [0.0; FRAME];
        for (i, v) in w.iter_mut().enumerate() {
            *v = 0.5 - 0.5 * (2.0 * PI * i as f64 / FRAME as f64).cos();
        }
        w
    })
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Per-frame fields pulled out of `SweptNotchGenerator` so that
/// `apply_sweep_channel` can run while `self.channels` is mutably borrowed.
struct SweepContext {
    fs: f64,
    lfo_waveform: LfoWaveform,
    transition: bool,
    start_lfo_freq: f64,
    end_lfo_freq: f64,
    initial_offset: f64,
    duration_samples: u64,
    frame_start_sample: u64,
}

fn alpha_at(ctx: &SweepContext, absolute_idx: u64) -> f64 {
    if !ctx.transition || ctx.duration_samples == 0 {
        return 0.0;
    }
    (absolute_idx as f64 / ctx.duration_samples as f64).clamp(0.0, 1.0)
}

fn apply_sweep_channel(ctx: &SweepContext, sweep: &NoiseSweep, cascade: &mut SweepCascade, block: &mut [f64; FRAME], phase_offset: f64) {
    let mut f_series = [0.0; FRAME];
    let mut q_series = [0.0; FRAME];
    let mut casc_series = [0usize; FRAME];
    let mut f_intra_series = [0.0; FRAME];

    for i in 0..FRAME {
        let absolute_idx = ctx.frame_start_sample + i as u64;
        let alpha = alpha_at(ctx, absolute_idx);
        let lfo_freq = lerp(ctx.start_lfo_freq, ctx.end_lfo_freq, alpha);
        let t = absolute_idx as f64 / ctx.fs;

        let base_phase = 2.0 * PI * lfo_freq * t + ctx.initial_offset.to_radians() + phase_offset;

        let min_freq = lerp(sweep.start_min_freq, sweep.end_min_freq, alpha);
        let max_freq = lerp(sweep.start_max_freq, sweep.end_max_freq, alpha);
        let centre = (min_freq + max_freq) / 2.0;
        let range = (max_freq - min_freq) / 2.0;

        let q = lerp(sweep.start_q, sweep.end_q, alpha);
        let cascade_depth = lerp(sweep.start_cascade as f64, sweep.end_cascade as f64, alpha).round() as usize;
        let cascade_depth = cascade_depth.clamp(1, cascade.main.len());

        f_series[i] = centre + range * ctx.lfo_waveform.shape(base_phase);
        q_series[i] = q;
        casc_series[i] = cascade_depth;

        if let Some(intra_offset_deg) = sweep.intra_offset_deg {
            let intra_phase = base_phase + intra_offset_deg.to_radians();
            f_intra_series[i] = centre + range * ctx.lfo_waveform.shape(intra_phase);
        }
    }

    biquad_time_varying_block(block, &f_series, &q_series, &casc_series, &mut cascade.main, ctx.fs);
    if let Some(intra_states) = cascade.intra.as_mut() {
        biquad_time_varying_block(block, &f_intra_series, &q_series, &casc_series, intra_states, ctx.fs);
    }
}

struct SweepCascade {
    main: Vec<BiquadState>,
    intra: Option<Vec<BiquadState>>,
}

impl SweepCascade {
    fn new(sweep: &NoiseSweep) -> Self {
        let depth = sweep.start_cascade.max(sweep.end_cascade).max(1) as usize;
        SweepCascade {
            main: vec![BiquadState::default(); depth],
            intra: sweep.intra_offset_deg.map(|_| vec![BiquadState::default(); depth]),
        }
    }
}

/// Per-channel state for one sweep: main + optional intra cascades.
struct SweepChannels {
    left: SweepCascade,
    right: SweepCascade,
}

struct Ring {
    acc: [f64; RING],
    window_sum: [f64; RING],
    write_pos: usize,
    read_pos: usize,
}

impl Ring {
    fn new() -> Self {
        Ring {
            acc: [0.0; RING],
            window_sum: [0.0; RING],
            write_pos: 0,
            read_pos: 0,
        }
    }

    fn lead(&self) -> usize {
        self.write_pos.wrapping_sub(self.read_pos)
    }

    fn add_frame(&mut self, frame: &[f64; FRAME], window: &[f64; FRAME]) {
        for i in 0..FRAME {
            let idx = (self.write_pos + i) % RING;
            self.acc[idx] += frame[i] * window[i];
            self.window_sum[idx] += window[i];
        }
        self.write_pos += HOP;
    }

    fn pop(&mut self) -> f64 {
        let idx = self.read_pos % RING;
        let sum = self.window_sum[idx];
        let value = if sum > 1e-9 { self.acc[idx] / sum } else { 0.0 };
        self.acc[idx] = 0.0;
        self.window_sum[idx] = 0.0;
        self.read_pos += 1;
        value
    }
}

/// The `noise_swept_notch` voice's DSP core: mono FFT noise in, stereo
/// swept-notch noise out.
pub struct SweptNotchGenerator {
    source: FftNoiseGenerator,
    fs: f64,
    sweeps: Vec<NoiseSweep>,
    lfo_waveform: LfoWaveform,
    transition: bool,
    start_lfo_freq: f64,
    end_lfo_freq: f64,
    initial_offset: f64,
    duration_samples: u64,

    channels: Vec<SweepChannels>,
    frame_start_sample: u64,

    ring_l: Ring,
    ring_r: Ring,
    rms_l: RmsCompensator,
    rms_r: RmsCompensator,
}

impl SweptNotchGenerator {
    pub fn new(params: NoiseParams, fs: f64, duration_samples: u64) -> EngineResult<Self> {
        let channels = params
            .sweeps
            .iter()
            .map(|s| SweepChannels {
                left: SweepCascade::new(s),
                right: SweepCascade::new(s),
            })
            .collect();

        let lfo_waveform = params.lfo_waveform;
        let transition = params.transition;
        let start_lfo_freq = params.start_lfo_freq;
        let end_lfo_freq = params.end_lfo_freq;
        let initial_offset = params.initial_offset;
        let sweeps = params.sweeps.clone();
        let source = FftNoiseGenerator::new(params, fs)?;

        Ok(SweptNotchGenerator {
            source,
            fs,
            sweeps,
            lfo_waveform,
            transition,
            start_lfo_freq,
            end_lfo_freq,
            initial_offset,
            duration_samples,
            channels,
            frame_start_sample: 0,
            ring_l: Ring::new(),
            ring_r: Ring::new(),
            rms_l: RmsCompensator::new(FRAME, 0.20, 0.998),
            rms_r: RmsCompensator::new(FRAME, 0.20, 0.998),
        })
    }

    /// Whether `params` can replace the running sweep set in place, per
    /// §4.5.4's `updateRealtimeParams` contract.
    pub fn is_update_compatible(&self, running: &NoiseParams, incoming: &NoiseParams) -> bool {
        let _ = self;
        is_realtime_compatible(running, incoming)
    }

    /// Replaces sweep and LFO parameters in place. Caller must have already
    /// checked [`Self::is_update_compatible`]; cascade depths and channel
    /// count are left untouched, so an incompatible `params` would panic or
    /// silently truncate sweeps rather than resize anything here.
    pub fn update_realtime_params(&mut self, params: NoiseParams) {
        self.lfo_waveform = params.lfo_waveform;
        self.transition = params.transition;
        self.start_lfo_freq = params.start_lfo_freq;
        self.end_lfo_freq = params.end_lfo_freq;
        self.initial_offset = params.initial_offset;
        self.sweeps = params.sweeps.clone();
        self.source.update_spectral_params(params);
    }

    /// Discards `samples` worth of output, realigning both the FFT source
    /// and the overlap-add frame counter after a seek (§4.6.4).
    pub fn skip_samples(&mut self, samples: u64) {
        let mut l = vec![0.0; 4096.min(samples.max(1) as usize)];
        let mut r = vec![0.0; l.len()];
        let mut remaining = samples;
        while remaining > 0 {
            let n = (l.len() as u64).min(remaining) as usize;
            self.generate(&mut l[..n], &mut r[..n]);
            remaining -= n as u64;
        }
    }

    fn generate_next_frame(&mut self) {
        let mut mono = [0.0; FRAME];
        self.source.generate(&mut mono);

        let mut left = mono;
        let mut right = mono;
        let pre_l = left;
        let pre_r = right;

        let ctx = SweepContext {
            fs: self.fs,
            lfo_waveform: self.lfo_waveform,
            transition: self.transition,
            start_lfo_freq: self.start_lfo_freq,
            end_lfo_freq: self.end_lfo_freq,
            initial_offset: self.initial_offset,
            duration_samples: self.duration_samples,
            frame_start_sample: self.frame_start_sample,
        };

        for (sweep, stages) in self.sweeps.iter().zip(self.channels.iter_mut()) {
            apply_sweep_channel(&ctx, sweep, &mut stages.left, &mut left, 0.0);
            apply_sweep_channel(&ctx, sweep, &mut stages.right, &mut right, sweep.phase_offset_deg.to_radians());
        }

        self.rms_l.process(&pre_l, &mut left);
        self.rms_r.process(&pre_r, &mut right);

        let window = hann_window();
        self.ring_l.add_frame(&left, window);
        self.ring_r.add_frame(&right, window);

        self.frame_start_sample += HOP as u64;
    }

    /// Fills `out_l`/`out_r` with the next `out_l.len()` stereo samples.
    pub fn generate(&mut self, out_l: &mut [f64], out_r: &mut [f64]) {
        debug_assert_eq!(out_l.len(), out_r.len());
        for i in 0..out_l.len() {
            while self.ring_l.lead() < FRAME {
                self.generate_next_frame();
            }
            out_l[i] = self.ring_l.pop();
            out_r[i] = self.ring_r.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::LfoWaveform;

    fn test_params(sweeps: Vec<NoiseSweep>) -> NoiseParams {
        NoiseParams {
            duration_seconds: 1.0,
            lfo_waveform: LfoWaveform::Sine,
            transition: false,
            start_lfo_freq: 0.1,
            end_lfo_freq: 0.1,
            sweeps,
            exponent: 1.0,
            high_exponent: 1.0,
            distribution_curve: 1.0,
            lowcut: None,
            highcut: None,
            amplitude: 1.0,
            seed: 11,
            phase_offset_deg: 0.0,
            initial_offset: 0.0,
        }
    }

    fn test_sweep() -> NoiseSweep {
        NoiseSweep {
            start_min_freq: 200.0,
            end_min_freq: 200.0,
            start_max_freq: 400.0,
            end_max_freq: 400.0,
            start_q: 4.0,
            end_q: 4.0,
            start_cascade: 2,
            end_cascade: 2,
            phase_offset_deg: 90.0,
            intra_offset_deg: None,
        }
    }

    #[test]
    fn produces_finite_bounded_stereo_output() {
        let params = test_params(vec![test_sweep()]);
        let mut gen = SweptNotchGenerator::new(params, 8_000.0, 8_000).unwrap();
        let mut l = vec![0.0; 4096];
        let mut r = vec![0.0; 4096];
        gen.generate(&mut l, &mut r);
        for &x in l.iter().chain(r.iter()) {
            assert!(x.is_finite());
            assert!(x.abs() <= 1.2, "sample {x} far outside expected range");
        }
    }

    #[test]
    fn zero_sweeps_still_produces_signal() {
        let params = test_params(Vec::new());
        let mut gen = SweptNotchGenerator::new(params, 8_000.0, 8_000).unwrap();
        let mut l = vec![0.0; 2048];
        let mut r = vec![0.0; 2048];
        gen.generate(&mut l, &mut r);
        assert!(l.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn left_and_right_diverge_with_nonzero_phase_offset() {
        let params = test_params(vec![test_sweep()]);
        let mut gen = SweptNotchGenerator::new(params, 8_000.0, 8_000).unwrap();
        let mut l = vec![0.0; 8192];
        let mut r = vec![0.0; 8192];
        gen.generate(&mut l, &mut r);
        let diff: f64 = l.iter().zip(r.iter()).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff > 0.0);
    }
}
