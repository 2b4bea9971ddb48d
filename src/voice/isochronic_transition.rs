//! `isochronic_tone_transition` (§4.4.4): the isochronic voice's start/end
//! parameter interpolation, reusing the same curve machinery as
//! [`crate::voice::binaural_transition::BinauralBeatTransition`].

use crate::math::trapezoid_envelope;
use crate::model::ParamMap;
use crate::voice::isochronic::IsochronicParams;
use crate::voice::oscillator::{BinauralCore, BinauralParams, OscShape};
use crate::voice::Voice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Curve {
    Linear,
    Logarithmic,
    Exponential,
}

impl Curve {
    fn parse(s: &str) -> Self {
        match s {
            "logarithmic" => Curve::Logarithmic,
            "exponential" => Curve::Exponential,
            _ => Curve::Linear,
        }
    }

    fn apply(&self, alpha: f64) -> f64 {
        match self {
            Curve::Linear => alpha,
            Curve::Logarithmic => 1.0 - (1.0 - alpha) * (1.0 - alpha),
            Curve::Exponential => alpha * alpha,
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn flip(a: bool, b: bool, alpha: f64) -> bool {
    if alpha < 0.5 {
        a
    } else {
        b
    }
}

fn pair_f64(p: &ParamMap, start_key: &str, end_key: &str, default: f64) -> (f64, f64) {
    let start = p.f64(start_key, default);
    let end = p.f64(end_key, start);
    (start, end)
}

fn pair_bool(p: &ParamMap, start_key: &str, end_key: &str, default: bool) -> (bool, bool) {
    let start = p.bool(start_key, default);
    let end = p.bool(end_key, start);
    (start, end)
}

pub struct IsochronicToneTransition {
    start: IsochronicParams,
    end: IsochronicParams,
    curve: Curve,
    initial_offset: f64,
    post_offset: f64,
    duration: f64,
    core: BinauralCore,
    fs: f64,
    elapsed: u64,
    total_samples: u64,
}

impl IsochronicToneTransition {
    pub fn new(p: &ParamMap, fs: f64, step_duration: f64) -> Self {
        let base = IsochronicParams::from_params(p);

        let (base_freq_s, base_freq_e) = pair_f64(p, "startBaseFreq", "endBaseFreq", base.base.base_freq);
        let (beat_freq_s, beat_freq_e) = pair_f64(p, "startBeatFreq", "endBeatFreq", base.base.beat_freq);
        let (amp_l_s, amp_l_e) = pair_f64(p, "startAmpL", "endAmpL", base.base.amp_l);
        let (amp_r_s, amp_r_e) = pair_f64(p, "startAmpR", "endAmpR", base.base.amp_r);
        let (ramp_s, ramp_e) = pair_f64(p, "startRampPercent", "endRampPercent", base.ramp_percent);
        let (gap_s, gap_e) = pair_f64(p, "startGapPercent", "endGapPercent", base.gap_percent);
        let (vib_freq_l_s, vib_freq_l_e) = pair_f64(p, "startVibFreqL", "endVibFreqL", base.base.vib_freq_l);
        let (vib_freq_r_s, vib_freq_r_e) = pair_f64(p, "startVibFreqR", "endVibFreqR", base.base.vib_freq_r);
        let (vib_range_l_s, vib_range_l_e) = pair_f64(p, "startVibRangeL", "endVibRangeL", base.base.vib_range_l);
        let (vib_range_r_s, vib_range_r_e) = pair_f64(p, "startVibRangeR", "endVibRangeR", base.base.vib_range_r);
        let (_mono_s, _mono_e) = pair_bool(p, "startForceMono", "endForceMono", true);

        let shape_start = base.base.freq_osc_shape;
        let shape_end = if p.str("endFreqOscShape", "").eq_ignore_ascii_case("triangle") {
            OscShape::Triangle
        } else if p.contains("endFreqOscShape") {
            OscShape::Sine
        } else {
            shape_start
        };

        let mut start_base = base.base;
        start_base.base_freq = base_freq_s;
        start_base.beat_freq = beat_freq_s;
        start_base.amp_l = amp_l_s;
        start_base.amp_r = amp_r_s;
        start_base.vib_freq_l = vib_freq_l_s;
        start_base.vib_freq_r = vib_freq_r_s;
        start_base.vib_range_l = vib_range_l_s;
        start_base.vib_range_r = vib_range_r_s;
        start_base.freq_osc_shape = shape_start;
        start_base.force_mono = true;

        let mut end_base = base.base;
        end_base.base_freq = base_freq_e;
        end_base.beat_freq = beat_freq_e;
        end_base.amp_l = amp_l_e;
        end_base.amp_r = amp_r_e;
        end_base.vib_freq_l = vib_freq_l_e;
        end_base.vib_freq_r = vib_freq_r_e;
        end_base.vib_range_l = vib_range_l_e;
        end_base.vib_range_r = vib_range_r_e;
        end_base.freq_osc_shape = shape_end;
        end_base.force_mono = true;

        let start = IsochronicParams {
            base: start_base,
            ramp_percent: ramp_s,
            gap_percent: gap_s,
            pan_enabled: base.pan_enabled,
            pan_freq: base.pan_freq,
            pan_range_min: base.pan_range_min,
            pan_range_max: base.pan_range_max,
            pan_phase_rad: base.pan_phase_rad,
        };
        let end = IsochronicParams {
            base: end_base,
            ramp_percent: ramp_e,
            gap_percent: gap_e,
            pan_enabled: base.pan_enabled,
            pan_freq: base.pan_freq,
            pan_range_min: base.pan_range_min,
            pan_range_max: base.pan_range_max,
            pan_phase_rad: base.pan_phase_rad,
        };

        let duration = p.f64("duration", step_duration);
        IsochronicToneTransition {
            start,
            end,
            curve: Curve::parse(p.str("curve", "linear")),
            initial_offset: p.f64("initialOffset", 0.0),
            post_offset: p.f64("postOffset", 0.0),
            duration,
            core: BinauralCore::default(),
            fs,
            elapsed: 0,
            total_samples: (step_duration * fs).round() as u64,
        }
    }

    fn alpha_at(&self, t: f64) -> f64 {
        let span = (self.duration - self.initial_offset - self.post_offset).max(1e-9);
        let raw = if t <= self.initial_offset {
            0.0
        } else if t >= self.duration - self.post_offset {
            1.0
        } else {
            (t - self.initial_offset) / span
        };
        self.curve.apply(raw.clamp(0.0, 1.0))
    }

    fn interpolated(&self, alpha: f64) -> IsochronicParams {
        let s = &self.start;
        let e = &self.end;
        let base = BinauralParams {
            base_freq: lerp(s.base.base_freq, e.base.base_freq, alpha),
            beat_freq: lerp(s.base.beat_freq, e.base.beat_freq, alpha),
            force_mono: true,
            left_high: s.base.left_high,
            freq_osc_shape: if alpha < 0.5 { s.base.freq_osc_shape } else { e.base.freq_osc_shape },
            vib_freq_l: lerp(s.base.vib_freq_l, e.base.vib_freq_l, alpha),
            vib_freq_r: lerp(s.base.vib_freq_r, e.base.vib_freq_r, alpha),
            vib_range_l: lerp(s.base.vib_range_l, e.base.vib_range_l, alpha),
            vib_range_r: lerp(s.base.vib_range_r, e.base.vib_range_r, alpha),
            vib_phase_off_l: s.base.vib_phase_off_l,
            vib_phase_off_r: s.base.vib_phase_off_r,
            vib_skew_l: s.base.vib_skew_l,
            vib_skew_r: s.base.vib_skew_r,
            phase_osc_range: s.base.phase_osc_range,
            phase_osc_freq: s.base.phase_osc_freq,
            amp_l: lerp(s.base.amp_l, e.base.amp_l, alpha),
            amp_r: lerp(s.base.amp_r, e.base.amp_r, alpha),
            amp_depth_l: s.base.amp_depth_l,
            amp_depth_r: s.base.amp_depth_r,
            amp_freq_l: s.base.amp_freq_l,
            amp_freq_r: s.base.amp_freq_r,
            amp_phase_off_l: s.base.amp_phase_off_l,
            amp_phase_off_r: s.base.amp_phase_off_r,
            amp_skew_l: s.base.amp_skew_l,
            amp_skew_r: s.base.amp_skew_r,
        };
        IsochronicParams {
            base,
            ramp_percent: lerp(s.ramp_percent, e.ramp_percent, alpha),
            gap_percent: lerp(s.gap_percent, e.gap_percent, alpha),
            pan_enabled: s.pan_enabled,
            pan_freq: s.pan_freq,
            pan_range_min: s.pan_range_min,
            pan_range_max: s.pan_range_max,
            pan_phase_rad: s.pan_phase_rad,
        }
    }
}

impl Voice for IsochronicToneTransition {
    fn process(&mut self, out: &mut [f64]) {
        for frame in out.chunks_mut(2) {
            if self.elapsed >= self.total_samples {
                break;
            }
            let t = self.elapsed as f64 / self.fs;
            let alpha = self.alpha_at(t);
            let params = self.interpolated(alpha);
            let (carrier, _) = self.core.next_sample(&params.base, t, self.fs);
            let beat_freq = params.base.beat_freq.max(0.0);
            let gate = if beat_freq > 0.0 {
                trapezoid_envelope(t, 1.0 / beat_freq, params.ramp_percent, params.gap_percent)
            } else {
                1.0
            };
            let sample = carrier * gate;
            let (gl, gr) = params.pan_gains(t);
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
        self.start.base.peak().max(self.end.base.peak())
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
    fn beat_freq_interpolates_across_the_transition() {
        let p = params(&[
            ("startBeatFreq", serde_json::json!(4.0)),
            ("endBeatFreq", serde_json::json!(12.0)),
            ("curve", serde_json::json!("linear")),
        ]);
        let voice = IsochronicToneTransition::new(&p, 48_000.0, 1.0);
        assert!((voice.interpolated(0.0).base.beat_freq - 4.0).abs() < 1e-9);
        assert!((voice.interpolated(1.0).base.beat_freq - 12.0).abs() < 1e-9);
    }

    #[test]
    fn finishes_after_total_samples() {
        let p = ParamMap::default();
        let mut voice = IsochronicToneTransition::new(&p, 1000.0, 0.01);
        let mut out = vec![0.0; 2 * 20];
        voice.process(&mut out);
        assert!(voice.is_finished());
    }
}
