//! `VoiceData`: a synth-function tag, its parameter map, an optional volume
//! envelope, and the `voice_type` used for group normalisation (§3, §4.4).

use crate::error::EngineError;
use crate::model::noise_data::NoiseParamsWire;
use crate::model::params::ParamMap;
use crate::model::NoiseParams;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthFunction {
    BinauralBeat,
    BinauralBeatTransition,
    IsochronicTone,
    IsochronicToneTransition,
    NoiseSweptNotch,
    NoiseSweptNotchTransition,
}

impl SynthFunction {
    pub fn parse(tag: &str) -> Result<Self, EngineError> {
        match tag {
            "binaural_beat" => Ok(Self::BinauralBeat),
            "binaural_beat_transition" => Ok(Self::BinauralBeatTransition),
            "isochronic_tone" => Ok(Self::IsochronicTone),
            "isochronic_tone_transition" => Ok(Self::IsochronicToneTransition),
            "noise_swept_notch" => Ok(Self::NoiseSweptNotch),
            "noise_swept_notch_transition" => Ok(Self::NoiseSweptNotchTransition),
            other => Err(EngineError::UnknownVoice(other.to_string())),
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            Self::BinauralBeatTransition | Self::IsochronicToneTransition | Self::NoiseSweptNotchTransition
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceType {
    Binaural,
    Noise,
    Other,
}

impl Default for VoiceType {
    fn default() -> Self {
        VoiceType::Other
    }
}

fn default_parameters() -> serde_json::Value {
    serde_json::Value::Null
}

#[derive(Debug, Deserialize)]
pub struct VoiceDataWire {
    pub synth_function: String,
    #[serde(default = "default_parameters")]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub volume_envelope: Option<Vec<(f64, f64)>>,
    #[serde(default)]
    pub is_transition: bool,
    #[serde(default)]
    pub voice_type: VoiceType,
}

#[derive(Debug, Clone)]
pub struct VoiceData {
    pub synth_function: SynthFunction,
    pub parameters: ParamMap,
    /// Full `NoiseParams` decoded from `parameters` for the two
    /// `noise_swept_notch*` tags — those voices need the nested `sweeps`
    /// list a flat `ParamMap` cannot hold (§3, §9).
    pub noise_params: Option<NoiseParams>,
    pub volume_envelope: Option<Vec<(f64, f64)>>,
    pub voice_type: VoiceType,
}

impl TryFrom<VoiceDataWire> for VoiceData {
    type Error = EngineError;

    fn try_from(wire: VoiceDataWire) -> Result<Self, Self::Error> {
        let synth_function = SynthFunction::parse(&wire.synth_function)?;
        let parameters = ParamMap::from_value(&wire.parameters);

        let noise_params = if matches!(synth_function, SynthFunction::NoiseSweptNotch | SynthFunction::NoiseSweptNotchTransition) {
            let wire_params: NoiseParamsWire = serde_json::from_value(wire.parameters.clone()).unwrap_or_default();
            let mut np: NoiseParams = wire_params.into();
            if synth_function == SynthFunction::NoiseSweptNotchTransition {
                np.transition = true;
            }
            Some(np)
        } else {
            None
        };

        Ok(VoiceData {
            synth_function,
            parameters,
            noise_params,
            volume_envelope: wire.volume_envelope,
            voice_type: wire.voice_type,
        })
    }
}

impl VoiceData {
    /// Whether this voice and `other` describe the same oscillator with the
    /// same parameters, so a step boundary between them can skip the
    /// crossfade and hand phase straight across (§4.6.1 step 3).
    pub fn continuous_with(&self, other: &VoiceData) -> bool {
        self.synth_function == other.synth_function
            && self.voice_type == other.voice_type
            && self.parameters == other.parameters
            && self.noise_params == other.noise_params
    }
}

/// Linearly interpolates a sequence of `(time_seconds, amplitude)` control
/// points at `t`, clamping to the terminal value outside the span. Returns
/// `1.0` when `points` is empty (the "no envelope" default, §4.4.5).
pub fn envelope_value_at(points: &[(f64, f64)], t: f64) -> f64 {
    if points.is_empty() {
        return 1.0;
    }
    if t <= points[0].0 {
        return points[0].1;
    }
    if let Some(last) = points.last() {
        if t >= last.0 {
            return last.1;
        }
    }
    for window in points.windows(2) {
        let (t0, a0) = window[0];
        let (t1, a1) = window[1];
        if t >= t0 && t <= t1 {
            if (t1 - t0).abs() < 1e-12 {
                return a1;
            }
            let frac = (t - t0) / (t1 - t0);
            return a0 + (a1 - a0) * frac;
        }
    }
    points.last().unwrap().1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(SynthFunction::parse("warp_drive").is_err());
    }

    #[test]
    fn known_tags_parse() {
        assert_eq!(SynthFunction::parse("binaural_beat").unwrap(), SynthFunction::BinauralBeat);
        assert!(SynthFunction::parse("isochronic_tone_transition").unwrap().is_transition());
        assert!(!SynthFunction::parse("binaural_beat").unwrap().is_transition());
    }

    #[test]
    fn envelope_interpolates_and_clamps() {
        let points = vec![(0.0, 0.0), (1.0, 1.0), (2.0, 0.5)];
        assert_eq!(envelope_value_at(&points, -1.0), 0.0);
        assert_eq!(envelope_value_at(&points, 0.5), 0.5);
        assert_eq!(envelope_value_at(&points, 3.0), 0.5);
    }

    #[test]
    fn empty_envelope_defaults_to_unity() {
        assert_eq!(envelope_value_at(&[], 10.0), 1.0);
    }
}
