//! `binaural_beat_transition` (§4.4.2): holds a start/end copy of every
//! `binaural_beat` parameter and linearly (or curve-warped) interpolates
//! between them across the voice's lifetime.

use crate::model::ParamMap;
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

/// Reads `start<Key>` defaulting to the non-transition default, and
/// `end<Key>` defaulting to the resolved start value — the cascade §9
/// describes for an incomplete transition parameter set.
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

pub struct BinauralBeatTransition {
    start: BinauralParams,
    end: BinauralParams,
    curve: Curve,
    initial_offset: f64,
    post_offset: f64,
    duration: f64,
    core: BinauralCore,
    fs: f64,
    elapsed: u64,
    total_samples: u64,
}

impl BinauralBeatTransition {
    pub fn new(p: &ParamMap, fs: f64, step_duration: f64) -> Self {
        let nontransition = BinauralParams::from_params(p);
        let (base_freq_s, base_freq_e) = pair_f64(p, "startBaseFreq", "endBaseFreq", nontransition.base_freq);
        let (beat_freq_s, beat_freq_e) = pair_f64(p, "startBeatFreq", "endBeatFreq", nontransition.beat_freq);
        let (force_mono_s, force_mono_e) = pair_bool(p, "startForceMono", "endForceMono", nontransition.force_mono);
        let (left_high_s, left_high_e) = pair_bool(p, "startLeftHigh", "endLeftHigh", nontransition.left_high);
        let (vib_freq_l_s, vib_freq_l_e) = pair_f64(p, "startVibFreqL", "endVibFreqL", nontransition.vib_freq_l);
        let (vib_freq_r_s, vib_freq_r_e) = pair_f64(p, "startVibFreqR", "endVibFreqR", nontransition.vib_freq_r);
        let (vib_range_l_s, vib_range_l_e) = pair_f64(p, "startVibRangeL", "endVibRangeL", nontransition.vib_range_l);
        let (vib_range_r_s, vib_range_r_e) = pair_f64(p, "startVibRangeR", "endVibRangeR", nontransition.vib_range_r);
        let (vib_phase_off_l_s, vib_phase_off_l_e) = pair_f64(p, "startVibPhaseOffL", "endVibPhaseOffL", nontransition.vib_phase_off_l);
        let (vib_phase_off_r_s, vib_phase_off_r_e) = pair_f64(p, "startVibPhaseOffR", "endVibPhaseOffR", nontransition.vib_phase_off_r);
        let (vib_skew_l_s, vib_skew_l_e) = pair_f64(p, "startVibSkewL", "endVibSkewL", nontransition.vib_skew_l);
        let (vib_skew_r_s, vib_skew_r_e) = pair_f64(p, "startVibSkewR", "endVibSkewR", nontransition.vib_skew_r);
        let (phase_osc_range_s, phase_osc_range_e) = pair_f64(p, "startPhaseOscRange", "endPhaseOscRange", nontransition.phase_osc_range);
        let (phase_osc_freq_s, phase_osc_freq_e) = pair_f64(p, "startPhaseOscFreq", "endPhaseOscFreq", nontransition.phase_osc_freq);
        let (amp_l_s, amp_l_e) = pair_f64(p, "startAmpL", "endAmpL", nontransition.amp_l);
        let (amp_r_s, amp_r_e) = pair_f64(p, "startAmpR", "endAmpR", nontransition.amp_r);
        let (amp_depth_l_s, amp_depth_l_e) = pair_f64(p, "startAmpDepthL", "endAmpDepthL", nontransition.amp_depth_l);
        let (amp_depth_r_s, amp_depth_r_e) = pair_f64(p, "startAmpDepthR", "endAmpDepthR", nontransition.amp_depth_r);
        let (amp_freq_l_s, amp_freq_l_e) = pair_f64(p, "startAmpFreqL", "endAmpFreqL", nontransition.amp_freq_l);
        let (amp_freq_r_s, amp_freq_r_e) = pair_f64(p, "startAmpFreqR", "endAmpFreqR", nontransition.amp_freq_r);
        let (amp_phase_off_l_s, amp_phase_off_l_e) = pair_f64(p, "startAmpPhaseOffL", "endAmpPhaseOffL", nontransition.amp_phase_off_l);
        let (amp_phase_off_r_s, amp_phase_off_r_e) = pair_f64(p, "startAmpPhaseOffR", "endAmpPhaseOffR", nontransition.amp_phase_off_r);
        let (amp_skew_l_s, amp_skew_l_e) = pair_f64(p, "startAmpSkewL", "endAmpSkewL", nontransition.amp_skew_l);
        let (amp_skew_r_s, amp_skew_r_e) = pair_f64(p, "startAmpSkewR", "endAmpSkewR", nontransition.amp_skew_r);

        let shape_start = nontransition.freq_osc_shape;
        let shape_end = if p.str("endFreqOscShape", "").eq_ignore_ascii_case("triangle") {
            OscShape::Triangle
        } else if p.contains("endFreqOscShape") {
            OscShape::Sine
        } else {
            shape_start
        };

        let start = BinauralParams {
            base_freq: base_freq_s,
            beat_freq: beat_freq_s,
            force_mono: force_mono_s,
            left_high: left_high_s,
            freq_osc_shape: shape_start,
            vib_freq_l: vib_freq_l_s,
            vib_freq_r: vib_freq_r_s,
            vib_range_l: vib_range_l_s,
            vib_range_r: vib_range_r_s,
            vib_phase_off_l: vib_phase_off_l_s,
            vib_phase_off_r: vib_phase_off_r_s,
            vib_skew_l: vib_skew_l_s,
            vib_skew_r: vib_skew_r_s,
            phase_osc_range: phase_osc_range_s,
            phase_osc_freq: phase_osc_freq_s,
            amp_l: amp_l_s,
            amp_r: amp_r_s,
            amp_depth_l: amp_depth_l_s,
            amp_depth_r: amp_depth_r_s,
            amp_freq_l: amp_freq_l_s,
            amp_freq_r: amp_freq_r_s,
            amp_phase_off_l: amp_phase_off_l_s,
            amp_phase_off_r: amp_phase_off_r_s,
            amp_skew_l: amp_skew_l_s,
            amp_skew_r: amp_skew_r_s,
        };
        let end = BinauralParams {
            base_freq: base_freq_e,
            beat_freq: beat_freq_e,
            force_mono: force_mono_e,
            left_high: left_high_e,
            freq_osc_shape: shape_end,
            vib_freq_l: vib_freq_l_e,
            vib_freq_r: vib_freq_r_e,
            vib_range_l: vib_range_l_e,
            vib_range_r: vib_range_r_e,
            vib_phase_off_l: vib_phase_off_l_e,
            vib_phase_off_r: vib_phase_off_r_e,
            vib_skew_l: vib_skew_l_e,
            vib_skew_r: vib_skew_r_e,
            phase_osc_range: phase_osc_range_e,
            phase_osc_freq: phase_osc_freq_e,
            amp_l: amp_l_e,
            amp_r: amp_r_e,
            amp_depth_l: amp_depth_l_e,
            amp_depth_r: amp_depth_r_e,
            amp_freq_l: amp_freq_l_e,
            amp_freq_r: amp_freq_r_e,
            amp_phase_off_l: amp_phase_off_l_e,
            amp_phase_off_r: amp_phase_off_r_e,
            amp_skew_l: amp_skew_l_e,
            amp_skew_r: amp_skew_r_e,
        };

        let duration = p.f64("duration", step_duration);
        BinauralBeatTransition {
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

    fn interpolated(&self, alpha: f64) -> BinauralParams {
        let s = &self.start;
        let e = &self.end;
        BinauralParams {
            base_freq: lerp(s.base_freq, e.base_freq, alpha),
            beat_freq: lerp(s.beat_freq, e.beat_freq, alpha),
            force_mono: flip(s.force_mono, e.force_mono, alpha),
            left_high: flip(s.left_high, e.left_high, alpha),
            freq_osc_shape: if alpha < 0.5 { s.freq_osc_shape } else { e.freq_osc_shape },
            vib_freq_l: lerp(s.vib_freq_l, e.vib_freq_l, alpha),
            vib_freq_r: lerp(s.vib_freq_r, e.vib_freq_r, alpha),
            vib_range_l: lerp(s.vib_range_l, e.vib_range_l, alpha),
            vib_range_r: lerp(s.vib_range_r, e.vib_range_r, alpha),
            vib_phase_off_l: lerp(s.vib_phase_off_l, e.vib_phase_off_l, alpha),
            vib_phase_off_r: lerp(s.vib_phase_off_r, e.vib_phase_off_r, alpha),
            vib_skew_l: lerp(s.vib_skew_l, e.vib_skew_l, alpha),
            vib_skew_r: lerp(s.vib_skew_r, e.vib_skew_r, alpha),
            phase_osc_range: lerp(s.phase_osc_range, e.phase_osc_range, alpha),
            phase_osc_freq: lerp(s.phase_osc_freq, e.phase_osc_freq, alpha),
            amp_l: lerp(s.amp_l, e.amp_l, alpha),
            amp_r: lerp(s.amp_r, e.amp_r, alpha),
            amp_depth_l: lerp(s.amp_depth_l, e.amp_depth_l, alpha),
            amp_depth_r: lerp(s.amp_depth_r, e.amp_depth_r, alpha),
            amp_freq_l: lerp(s.amp_freq_l, e.amp_freq_l, alpha),
            amp_freq_r: lerp(s.amp_freq_r, e.amp_freq_r, alpha),
            amp_phase_off_l: lerp(s.amp_phase_off_l, e.amp_phase_off_l, alpha),
            amp_phase_off_r: lerp(s.amp_phase_off_r, e.amp_phase_off_r, alpha),
            amp_skew_l: lerp(s.amp_skew_l, e.amp_skew_l, alpha),
            amp_skew_r: lerp(s.amp_skew_r, e.amp_skew_r, alpha),
        }
    }
}

impl Voice for BinauralBeatTransition {
    fn process(&mut self, out: &mut [f64]) {
        for frame in out.chunks_mut(2) {
            if self.elapsed >= self.total_samples {
                break;
            }
            let t = self.elapsed as f64 / self.fs;
            let alpha = self.alpha_at(t);
            let params = self.interpolated(alpha);
            let (l, r) = self.core.next_sample(&params, t, self.fs);
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
        self.start.amp_l.max(self.start.amp_r).max(self.end.amp_l).max(self.end.amp_r)
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
    fn beat_difference_rises_linearly_across_the_transition() {
        let p = params(&[
            ("startBeatFreq", serde_json::json!(4.0)),
            ("endBeatFreq", serde_json::json!(12.0)),
            ("curve", serde_json::json!("linear")),
            ("ampL", serde_json::json!(1.0)),
            ("ampR", serde_json::json!(1.0)),
        ]);
        let voice = BinauralBeatTransition::new(&p, 48_000.0, 1.0);
        assert!((voice.interpolated(0.0).beat_freq - 4.0).abs() < 1e-9);
        assert!((voice.interpolated(1.0).beat_freq - 12.0).abs() < 1e-9);
        assert!((voice.interpolated(0.5).beat_freq - 8.0).abs() < 1e-9);
    }

    #[test]
    fn logarithmic_curve_frontloads_the_change() {
        let curve = Curve::Logarithmic;
        assert!(curve.apply(0.5) > 0.5);
    }

    #[test]
    fn finishes_after_total_samples() {
        let p = ParamMap::default();
        let mut voice = BinauralBeatTransition::new(&p, 1000.0, 0.01);
        let mut out = vec![0.0; 2 * 20];
        voice.process(&mut out);
        assert!(voice.is_finished());
    }
}
