//! Top-level track model: `TrackData`, `StepData`, `GlobalSettings`, and
//! JSON parsing (§3, §6.1).

use crate::error::{EngineError, EngineResult};
use crate::model::noise_data::{BackgroundNoiseData, BackgroundNoiseDataWire};
use crate::model::voice_data::{VoiceData, VoiceDataWire};
use serde::Deserialize;

pub const MAX_INDIVIDUAL_GAIN: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossfadeCurve {
    Linear,
    EqualPower,
}

impl Default for CrossfadeCurve {
    fn default() -> Self {
        CrossfadeCurve::Linear
    }
}

fn default_crossfade_duration() -> f64 {
    3.0
}
fn default_normalization_level() -> f64 {
    0.95
}
fn default_volume() -> f64 {
    0.6
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalSettingsWire {
    pub sample_rate: u32,
    #[serde(default = "default_crossfade_duration")]
    pub crossfade_duration: f64,
    #[serde(default)]
    pub crossfade_curve: CrossfadeCurve,
    #[serde(default = "default_normalization_level")]
    pub normalization_level: f64,
}

#[derive(Debug, Clone)]
pub struct GlobalSettings {
    pub sample_rate: u32,
    pub crossfade_duration: f64,
    pub crossfade_curve: CrossfadeCurve,
    pub normalization_level: f64,
}

impl From<GlobalSettingsWire> for GlobalSettings {
    fn from(w: GlobalSettingsWire) -> Self {
        GlobalSettings {
            sample_rate: w.sample_rate,
            crossfade_duration: w.crossfade_duration.max(0.0),
            crossfade_curve: w.crossfade_curve,
            normalization_level: w.normalization_level.clamp(f64::EPSILON, 1.0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StepDataWire {
    pub duration: f64,
    #[serde(default)]
    pub voices: Vec<VoiceDataWire>,
    #[serde(default = "default_volume")]
    pub binaural_volume: f64,
    #[serde(default = "default_volume")]
    pub noise_volume: f64,
    #[serde(default)]
    pub normalization_level: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StepData {
    pub duration: f64,
    pub voices: Vec<VoiceData>,
    pub binaural_volume: f64,
    pub noise_volume: f64,
    pub normalization_level: Option<f64>,
}

impl TryFrom<StepDataWire> for StepData {
    type Error = EngineError;

    fn try_from(w: StepDataWire) -> Result<Self, Self::Error> {
        if !(w.duration > 0.0) || !w.duration.is_finite() {
            return Err(EngineError::Config(format!(
                "step duration must be finite and > 0, got {}",
                w.duration
            )));
        }

        let mut voices = Vec::with_capacity(w.voices.len());
        for voice_wire in w.voices {
            match VoiceData::try_from(voice_wire) {
                Ok(v) => voices.push(v),
                Err(EngineError::UnknownVoice(tag)) => {
                    log::warn!("skipping voice with unknown synth_function '{tag}'");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(StepData {
            duration: w.duration,
            voices,
            binaural_volume: w.binaural_volume.clamp(0.0, MAX_INDIVIDUAL_GAIN),
            noise_volume: w.noise_volume.clamp(0.0, MAX_INDIVIDUAL_GAIN),
            normalization_level: w.normalization_level,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TrackDataWire {
    pub global_settings: GlobalSettingsWire,
    #[serde(default)]
    pub steps: Vec<StepDataWire>,
    #[serde(default)]
    pub background_noise: Option<BackgroundNoiseDataWire>,
    #[serde(default)]
    pub overlay_clips: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct TrackData {
    pub global_settings: GlobalSettings,
    pub steps: Vec<StepData>,
    pub background_noise: Option<BackgroundNoiseData>,
    pub overlay_clips: Vec<serde_json::Value>,
}

impl TrackData {
    pub fn from_json(json: &str) -> EngineResult<TrackData> {
        let wire: TrackDataWire = serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("invalid track JSON: {e}")))?;

        let mut steps = Vec::with_capacity(wire.steps.len());
        for step_wire in wire.steps {
            steps.push(StepData::try_from(step_wire)?);
        }

        Ok(TrackData {
            global_settings: wire.global_settings.into(),
            steps,
            background_noise: wire.background_noise.map(BackgroundNoiseData::from),
            overlay_clips: wire.overlay_clips,
        })
    }

    /// Samples in the configured crossfade, clamped to the shorter of the
    /// two adjacent steps (§3 entity invariant).
    pub fn crossfade_samples(&self, current_step_samples: u64, next_step_samples: u64) -> u64 {
        let configured = (self.global_settings.crossfade_duration * self.global_settings.sample_rate as f64) as u64;
        configured.min(current_step_samples).min(next_step_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_sample_rate() {
        let json = r#"{ "global_settings": {}, "steps": [] }"#;
        assert!(TrackData::from_json(json).is_err());
    }

    #[test]
    fn parses_minimal_track() {
        let json = r#"{
            "global_settings": { "sample_rate": 44100 },
            "steps": [
                { "duration": 1.0, "voices": [] }
            ]
        }"#;
        let track = TrackData::from_json(json).unwrap();
        assert_eq!(track.global_settings.sample_rate, 44100);
        assert_eq!(track.global_settings.crossfade_duration, 3.0);
        assert_eq!(track.steps.len(), 1);
        assert_eq!(track.steps[0].binaural_volume, 0.6);
    }

    #[test]
    fn rejects_nonpositive_step_duration() {
        let json = r#"{
            "global_settings": { "sample_rate": 44100 },
            "steps": [ { "duration": 0.0, "voices": [] } ]
        }"#;
        assert!(TrackData::from_json(json).is_err());
    }

    #[test]
    fn clamps_volumes_above_max_gain() {
        let json = r#"{
            "global_settings": { "sample_rate": 44100 },
            "steps": [ { "duration": 1.0, "voices": [], "binaural_volume": 5.0, "noise_volume": -1.0 } ]
        }"#;
        let track = TrackData::from_json(json).unwrap();
        assert_eq!(track.steps[0].binaural_volume, MAX_INDIVIDUAL_GAIN);
        assert_eq!(track.steps[0].noise_volume, 0.0);
    }

    #[test]
    fn skips_unknown_voice_but_keeps_step_valid() {
        let json = r#"{
            "global_settings": { "sample_rate": 44100 },
            "steps": [ { "duration": 1.0, "voices": [
                { "synth_function": "binaural_beat", "parameters": {} },
                { "synth_function": "made_up_thing", "parameters": {} }
            ] } ]
        }"#;
        let track = TrackData::from_json(json).unwrap();
        assert_eq!(track.steps[0].voices.len(), 1);
    }
}
