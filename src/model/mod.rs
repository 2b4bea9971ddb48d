//! Track/Step/Voice/Noise data model and JSON parsing (§3, §6.1).

mod noise_data;
mod params;
mod track;
mod voice_data;

pub use noise_data::{
    is_realtime_compatible, resolve_color_preset, BackgroundNoiseData, ColorPreset, NoiseParams,
    NoiseSweep,
};
pub use params::ParamMap;
pub use track::{CrossfadeCurve, GlobalSettings, StepData, TrackData, MAX_INDIVIDUAL_GAIN};
pub use voice_data::{envelope_value_at, SynthFunction, VoiceData, VoiceType};
