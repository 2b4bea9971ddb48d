//! Track scheduler (§4.6): steps a [`TrackData`] forward one audio block at
//! a time, lazily building voices, crossfading between non-continuous step
//! boundaries, mixing the background noise layer, and applying the three
//! gain stages (`voiceGain`, `noiseGain`, `masterGain`).

mod background;
mod mixdown;

use crate::model::{CrossfadeCurve, StepData, TrackData, VoiceType};
use crate::voice::{build_voice, Voice, VoiceKind};
use background::BackgroundNoiseState;

type Phases = Vec<Option<(f64, f64)>>;
type VoiceSlot = (VoiceType, VoiceKind);

/// Two steps can share a voice's phase across the boundary, skipping the
/// crossfade, only when their voice lists are pairwise identical in synth
/// tag, voice type, and parameters (§4.6.1 step 3).
fn steps_have_continuous_voices(a: &StepData, b: &StepData) -> bool {
    a.voices.len() == b.voices.len() && a.voices.iter().zip(b.voices.iter()).all(|(x, y)| x.continuous_with(y))
}

fn harvest_phases(voices: &[VoiceSlot]) -> Phases {
    voices.iter().map(|(_, v)| v.phases()).collect()
}

/// Applies harvested phases to the matching slot of `voices` in lockstep;
/// a slot where either side has no phase (a non-oscillator voice, or a
/// shorter list) is left untouched (§9).
fn apply_phases(voices: &mut [VoiceSlot], phases: &[Option<(f64, f64)>]) {
    for ((_, voice), phase) in voices.iter_mut().zip(phases.iter()) {
        if let (Some((l, r)), true) = (phase, voice.phases().is_some()) {
            voice.set_phases(*l, *r);
        }
    }
}

/// Outgoing/incoming gain pair at fraction `r` (0 at fade start, 1 at fade
/// end) for the configured crossfade shape.
fn curve_gains(curve: CrossfadeCurve, r: f64) -> (f64, f64) {
    match curve {
        CrossfadeCurve::Linear => (1.0 - r, r),
        CrossfadeCurve::EqualPower => {
            let angle = r * std::f64::consts::FRAC_PI_2;
            (angle.cos(), angle.sin())
        }
    }
}

pub struct TrackScheduler {
    track: TrackData,
    fs: f64,
    paused: bool,

    current_step_index: usize,
    current_sample_in_step: u64,
    absolute_sample: u64,

    active_voices: Vec<VoiceSlot>,
    active_built: bool,
    next_voices: Vec<VoiceSlot>,
    next_built: bool,
    accumulated_phases: Phases,

    crossfade_active: bool,
    crossfade_samples: u64,
    crossfade_position: u64,

    background_noise: Option<BackgroundNoiseState>,

    master_gain: f64,
    voice_gain: f64,
    noise_gain: f64,
}

impl TrackScheduler {
    pub fn new(track: TrackData) -> Self {
        let fs = track.global_settings.sample_rate as f64;
        let background_noise = track.background_noise.clone().and_then(|bn| BackgroundNoiseState::new(bn, fs));
        TrackScheduler {
            track,
            fs,
            paused: false,
            current_step_index: 0,
            current_sample_in_step: 0,
            absolute_sample: 0,
            active_voices: Vec::new(),
            active_built: false,
            next_voices: Vec::new(),
            next_built: false,
            accumulated_phases: Vec::new(),
            crossfade_active: false,
            crossfade_samples: 0,
            crossfade_position: 0,
            background_noise,
            master_gain: 1.0,
            voice_gain: 1.0,
            noise_gain: 1.0,
        }
    }

    // -- control surface -------------------------------------------------

    pub fn play(&mut self) {
        self.paused = false;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn sample_rate(&self) -> f64 {
        self.fs
    }

    pub fn position_seconds(&self) -> f64 {
        self.absolute_sample as f64 / self.fs
    }

    pub fn elapsed_samples(&self) -> u64 {
        self.absolute_sample
    }

    pub fn current_step(&self) -> usize {
        self.current_step_index
    }

    pub fn is_finished(&self) -> bool {
        self.current_step_index >= self.track.steps.len()
    }

    pub fn set_master_gain(&mut self, gain: f64) {
        self.master_gain = gain.max(0.0);
    }

    pub fn set_voice_gain(&mut self, gain: f64) {
        self.voice_gain = gain.max(0.0);
    }

    pub fn set_noise_gain(&mut self, gain: f64) {
        self.noise_gain = gain.max(0.0);
    }

    pub fn master_gain(&self) -> f64 {
        self.master_gain
    }

    /// Replaces the track and resets playback to the start (§3 lifecycle:
    /// `loadTrack`).
    pub fn load_track(&mut self, track: TrackData) {
        self.fs = track.global_settings.sample_rate as f64;
        self.background_noise = track.background_noise.clone().and_then(|bn| BackgroundNoiseState::new(bn, self.fs));
        self.track = track;
        self.reset_position();
    }

    /// Replaces the track definition without resetting playback position
    /// (§3 lifecycle: `updateTrack`). The background noise layer is updated
    /// in place when realtime-compatible (§4.6.3, §7), otherwise rebuilt
    /// from scratch. Active/next voices are always rebuilt at the current
    /// position with harvested phases, so the update is masked by the
    /// ordinary step-boundary crossfade machinery rather than needing its
    /// own glitch-free in-place path.
    pub fn update_track(&mut self, new_track: TrackData) {
        match (&mut self.background_noise, new_track.background_noise.clone()) {
            (Some(existing), Some(incoming)) if existing.is_compatible(&incoming) => {
                existing.update_in_place(incoming);
            }
            (_, incoming) => {
                self.background_noise = incoming.and_then(|bn| BackgroundNoiseState::new(bn, self.fs));
            }
        }

        self.current_step_index = self.current_step_index.min(new_track.steps.len().saturating_sub(1).max(0));
        self.track = new_track;

        self.active_voices.clear();
        self.active_built = false;
        self.next_voices.clear();
        self.next_built = false;
        self.crossfade_active = false;
        self.crossfade_samples = 0;
        self.crossfade_position = 0;
    }

    /// Seeks to an absolute track position (§4.6.4): locates the owning
    /// step, discards in-flight voices and crossfade state so they are
    /// rebuilt fresh (without phase continuity, since the jump itself is
    /// the discontinuity), and realigns the background noise generator by
    /// skipping samples forward to the new position.
    pub fn seek_to(&mut self, seconds: f64) {
        let target_abs = (seconds.max(0.0) * self.fs).round() as u64;
        self.absolute_sample = target_abs;

        let mut remaining = target_abs;
        let mut idx = 0;
        while idx + 1 < self.track.steps.len() {
            let step_samples = self.step_samples(idx);
            if remaining < step_samples {
                break;
            }
            remaining -= step_samples;
            idx += 1;
        }
        self.current_step_index = idx;
        self.current_sample_in_step = remaining;

        self.active_voices.clear();
        self.active_built = false;
        self.next_voices.clear();
        self.next_built = false;
        self.crossfade_active = false;
        self.crossfade_samples = 0;
        self.crossfade_position = 0;
        self.accumulated_phases.clear();

        if let Some(bg) = self.background_noise.as_mut() {
            bg.realign_to(target_abs);
        }
    }

    fn reset_position(&mut self) {
        self.current_step_index = 0;
        self.current_sample_in_step = 0;
        self.absolute_sample = 0;
        self.active_voices.clear();
        self.active_built = false;
        self.next_voices.clear();
        self.next_built = false;
        self.accumulated_phases.clear();
        self.crossfade_active = false;
        self.crossfade_samples = 0;
        self.crossfade_position = 0;
    }

    // -- rendering ---------------------------------------------------------

    /// Renders `frames` stereo frames into `out` (length `frames * 2`).
    pub fn process_block(&mut self, out: &mut [f64], frames: usize) {
        debug_assert_eq!(out.len(), frames * 2);
        for x in out.iter_mut() {
            *x = 0.0;
        }

        if self.paused {
            return;
        }

        let block_start = self.absolute_sample;
        let mut produced = 0usize;
        while produced < frames && self.current_step_index < self.track.steps.len() {
            self.ensure_active_voices();

            let step_samples = self.step_samples(self.current_step_index);
            if !self.crossfade_active && self.should_start_crossfade(step_samples) {
                self.begin_crossfade(step_samples);
            }

            if self.crossfade_active {
                let remaining = (self.crossfade_samples - self.crossfade_position) as usize;
                let chunk = remaining.min(frames - produced);
                if chunk == 0 {
                    self.finish_crossfade();
                    continue;
                }
                self.render_crossfade_chunk(&mut out[produced * 2..(produced + chunk) * 2], chunk);
                produced += chunk;
                if self.crossfade_position >= self.crossfade_samples {
                    self.finish_crossfade();
                }
            } else {
                let remaining = step_samples.saturating_sub(self.current_sample_in_step) as usize;
                if remaining == 0 {
                    self.advance_step();
                    continue;
                }
                let chunk = remaining.min(frames - produced);
                self.render_step_chunk(&mut out[produced * 2..(produced + chunk) * 2], chunk);
                produced += chunk;
                if self.current_sample_in_step >= step_samples {
                    self.advance_step();
                }
            }
        }

        for x in out.iter_mut() {
            *x *= self.voice_gain;
        }

        if let Some(bg) = self.background_noise.as_mut() {
            bg.mix_into(out, block_start, frames);
        }
        for x in out.iter_mut() {
            *x *= self.master_gain;
        }

        self.absolute_sample += frames as u64;
    }

    fn step_samples(&self, index: usize) -> u64 {
        (self.track.steps[index].duration * self.fs).round() as u64
    }

    fn build_voices_for_step(&self, index: usize) -> Vec<VoiceSlot> {
        let step = &self.track.steps[index];
        step.voices
            .iter()
            .filter_map(|vd| build_voice(vd, self.fs, step.duration).map(|vk| (vd.voice_type, vk)))
            .collect()
    }

    fn ensure_active_voices(&mut self) {
        if !self.active_built {
            let mut voices = self.build_voices_for_step(self.current_step_index);
            apply_phases(&mut voices, &self.accumulated_phases);
            self.active_voices = voices;
            self.active_built = true;
        }
    }

    fn ensure_next_voices(&mut self) {
        if !self.next_built {
            self.next_voices = self.build_voices_for_step(self.current_step_index + 1);
            self.next_built = true;
        }
    }

    fn should_start_crossfade(&self, step_samples: u64) -> bool {
        let Some(next_step) = self.track.steps.get(self.current_step_index + 1) else {
            return false;
        };
        let next_samples = (next_step.duration * self.fs).round() as u64;
        let fade_len = self.track.crossfade_samples(step_samples, next_samples);
        if fade_len == 0 {
            return false;
        }
        let remaining = step_samples.saturating_sub(self.current_sample_in_step);
        if remaining > fade_len {
            return false;
        }
        let current_step = &self.track.steps[self.current_step_index];
        !steps_have_continuous_voices(current_step, next_step)
    }

    fn begin_crossfade(&mut self, step_samples: u64) {
        let next_step = &self.track.steps[self.current_step_index + 1];
        let next_samples = (next_step.duration * self.fs).round() as u64;
        let fade_len = self.track.crossfade_samples(step_samples, next_samples);
        let remaining = step_samples.saturating_sub(self.current_sample_in_step);
        self.crossfade_samples = fade_len;
        self.crossfade_position = fade_len.saturating_sub(remaining);
        self.ensure_next_voices();
        self.crossfade_active = true;
    }

    fn render_step_chunk(&mut self, out: &mut [f64], frames: usize) {
        let step = &self.track.steps[self.current_step_index];
        let target = step.normalization_level.unwrap_or(self.track.global_settings.normalization_level);
        let rendered = mixdown::render_step_mixdown(&mut self.active_voices, frames, step.binaural_volume, step.noise_volume, target);
        for (o, r) in out.iter_mut().zip(rendered.iter()) {
            *o += r;
        }
        self.current_sample_in_step += frames as u64;
    }

    fn render_crossfade_chunk(&mut self, out: &mut [f64], frames: usize) {
        let cur_target = {
            let step = &self.track.steps[self.current_step_index];
            step.normalization_level.unwrap_or(self.track.global_settings.normalization_level)
        };
        let (cur_bin_vol, cur_noise_vol) = {
            let step = &self.track.steps[self.current_step_index];
            (step.binaural_volume, step.noise_volume)
        };
        let next_index = self.current_step_index + 1;
        let next_target = {
            let step = &self.track.steps[next_index];
            step.normalization_level.unwrap_or(self.track.global_settings.normalization_level)
        };
        let (next_bin_vol, next_noise_vol) = {
            let step = &self.track.steps[next_index];
            (step.binaural_volume, step.noise_volume)
        };

        let outgoing = mixdown::render_step_mixdown(&mut self.active_voices, frames, cur_bin_vol, cur_noise_vol, cur_target);
        let incoming = mixdown::render_step_mixdown(&mut self.next_voices, frames, next_bin_vol, next_noise_vol, next_target);

        let curve = self.track.global_settings.crossfade_curve;
        for i in 0..frames {
            let r = (self.crossfade_position + i as u64) as f64 / self.crossfade_samples as f64;
            let (g_out, g_in) = curve_gains(curve, r.clamp(0.0, 1.0));
            out[2 * i] += outgoing[2 * i] * g_out + incoming[2 * i] * g_in;
            out[2 * i + 1] += outgoing[2 * i + 1] * g_out + incoming[2 * i + 1] * g_in;
        }

        self.current_sample_in_step += frames as u64;
        self.crossfade_position += frames as u64;
    }

    fn finish_crossfade(&mut self) {
        let next_voices = std::mem::take(&mut self.next_voices);
        self.accumulated_phases = harvest_phases(&next_voices);
        self.active_voices = next_voices;
        self.active_built = true;
        self.next_voices = Vec::new();
        self.next_built = false;

        self.current_step_index += 1;
        self.current_sample_in_step = self.crossfade_samples;

        self.crossfade_active = false;
        self.crossfade_samples = 0;
        self.crossfade_position = 0;
    }

    fn advance_step(&mut self) {
        self.accumulated_phases = harvest_phases(&self.active_voices);
        self.current_step_index += 1;
        self.current_sample_in_step = 0;
        self.active_voices.clear();
        self.active_built = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GlobalSettings, StepData, VoiceData};

    fn binaural_voice(base_freq: f64, beat_freq: f64) -> VoiceData {
        let mut m = serde_json::Map::new();
        m.insert("baseFreq".into(), serde_json::json!(base_freq));
        m.insert("beatFreq".into(), serde_json::json!(beat_freq));
        m.insert("ampL".into(), serde_json::json!(1.0));
        m.insert("ampR".into(), serde_json::json!(1.0));
        VoiceData {
            synth_function: crate::model::SynthFunction::BinauralBeat,
            parameters: crate::model::ParamMap::from_value(&serde_json::Value::Object(m)),
            noise_params: None,
            volume_envelope: None,
            voice_type: VoiceType::Binaural,
        }
    }

    fn step(duration: f64, voices: Vec<VoiceData>) -> StepData {
        StepData { duration, voices, binaural_volume: 0.6, noise_volume: 0.6, normalization_level: None }
    }

    fn track(steps: Vec<StepData>, crossfade_duration: f64) -> TrackData {
        TrackData {
            global_settings: GlobalSettings {
                sample_rate: 1000,
                crossfade_duration,
                crossfade_curve: CrossfadeCurve::Linear,
                normalization_level: 0.9,
            },
            steps,
            background_noise: None,
            overlay_clips: Vec::new(),
        }
    }

    #[test]
    fn produces_silence_when_paused() {
        let mut sched = TrackScheduler::new(track(vec![step(1.0, vec![binaural_voice(200.0, 4.0)])], 0.0));
        sched.pause();
        let mut out = vec![0.0; 2 * 100];
        sched.process_block(&mut out, 100);
        assert!(out.iter().all(|x| *x == 0.0));
        assert_eq!(sched.elapsed_samples(), 0);
    }

    #[test]
    fn advances_step_index_across_a_step_boundary() {
        let mut sched = TrackScheduler::new(track(
            vec![step(0.05, vec![binaural_voice(200.0, 4.0)]), step(0.05, vec![binaural_voice(300.0, 6.0)])],
            0.0,
        ));
        let mut out = vec![0.0; 2 * 100];
        sched.process_block(&mut out, 100);
        assert_eq!(sched.current_step(), 1);
    }

    #[test]
    fn crossfade_blends_both_steps_output() {
        let mut sched = TrackScheduler::new(track(
            vec![step(0.1, vec![binaural_voice(200.0, 4.0)]), step(0.1, vec![binaural_voice(400.0, 8.0)])],
            0.05,
        ));
        let mut out = vec![0.0; 2 * 200];
        sched.process_block(&mut out, 200);
        assert!(out.iter().any(|x| x.is_finite() && *x != 0.0));
    }

    #[test]
    fn continuous_steps_skip_crossfade() {
        let v = binaural_voice(200.0, 4.0);
        let mut sched = TrackScheduler::new(track(vec![step(0.05, vec![v.clone()]), step(0.05, vec![v])], 0.04));
        let mut out = vec![0.0; 2 * 60];
        sched.process_block(&mut out, 60);
        assert!(!sched.crossfade_active);
    }

    #[test]
    fn seek_lands_in_the_right_step() {
        let mut sched = TrackScheduler::new(track(
            vec![step(1.0, vec![binaural_voice(200.0, 4.0)]), step(1.0, vec![binaural_voice(300.0, 6.0)])],
            0.0,
        ));
        sched.seek_to(1.5);
        assert_eq!(sched.current_step(), 1);
        assert_eq!(sched.current_sample_in_step, 500);
    }

    #[test]
    fn past_the_last_step_yields_silence() {
        let mut sched = TrackScheduler::new(track(vec![step(0.01, vec![binaural_voice(200.0, 4.0)])], 0.0));
        let mut out = vec![0.0; 2 * 50];
        sched.process_block(&mut out, 50);
        assert!(sched.is_finished());
        let mut out2 = vec![0.0; 2 * 10];
        sched.process_block(&mut out2, 10);
        assert!(out2.iter().all(|x| *x == 0.0));
    }
}
