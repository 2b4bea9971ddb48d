//! Per-sample stereo voice synthesis (§4.4): binaural and isochronic
//! oscillators (plus their transition variants), the swept-notch noise
//! voice, and the volume-envelope wrapper any of them can be nested in.

mod binaural;
mod binaural_transition;
mod envelope;
mod isochronic;
mod isochronic_transition;
mod noise_voice;
mod oscillator;

pub use binaural::BinauralBeat;
pub use binaural_transition::BinauralBeatTransition;
pub use envelope::VolumeEnvelope;
pub use isochronic::IsochronicTone;
pub use isochronic_transition::IsochronicToneTransition;
pub use noise_voice::NoiseSweptNotchVoice;
pub use oscillator::OscShape;

use crate::model::{SynthFunction, VoiceData};

/// A single voice's per-sample synthesis contract (§4.4). Implementors
/// additively mix into an interleaved stereo buffer; oscillator voices also
/// expose phase so the scheduler can carry continuity across a step
/// boundary (§4.4, §9).
pub trait Voice: Send {
    /// Additively mixes `out.len()/2` stereo frames into `out`.
    fn process(&mut self, out: &mut [f64]);
    fn is_finished(&self) -> bool;
    fn phases(&self) -> Option<(f64, f64)> {
        None
    }
    fn set_phases(&mut self, _l: f64, _r: f64) {}
    /// Statically advertised upper bound on this voice's output magnitude,
    /// used by the scheduler to compute per-group normalisation gain.
    fn normalization_peak(&self) -> f64;
}

/// Closed set of concrete voice kinds (§9: tagged-variant dispatch over a
/// per-sample-loop vtable). `VolumeEnvelope` wraps any of them generically.
pub enum VoiceKind {
    Binaural(VolumeEnvelope<BinauralBeat>),
    BinauralTransition(VolumeEnvelope<BinauralBeatTransition>),
    Isochronic(VolumeEnvelope<IsochronicTone>),
    IsochronicTransition(VolumeEnvelope<IsochronicToneTransition>),
    Noise(VolumeEnvelope<NoiseSweptNotchVoice>),
}

impl Voice for VoiceKind {
    fn process(&mut self, out: &mut [f64]) {
        match self {
            VoiceKind::Binaural(v) => v.process(out),
            VoiceKind::BinauralTransition(v) => v.process(out),
            VoiceKind::Isochronic(v) => v.process(out),
            VoiceKind::IsochronicTransition(v) => v.process(out),
            VoiceKind::Noise(v) => v.process(out),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            VoiceKind::Binaural(v) => v.is_finished(),
            VoiceKind::BinauralTransition(v) => v.is_finished(),
            VoiceKind::Isochronic(v) => v.is_finished(),
            VoiceKind::IsochronicTransition(v) => v.is_finished(),
            VoiceKind::Noise(v) => v.is_finished(),
        }
    }

    fn phases(&self) -> Option<(f64, f64)> {
        match self {
            VoiceKind::Binaural(v) => v.phases(),
            VoiceKind::BinauralTransition(v) => v.phases(),
            VoiceKind::Isochronic(v) => v.phases(),
            VoiceKind::IsochronicTransition(v) => v.phases(),
            VoiceKind::Noise(v) => v.phases(),
        }
    }

    fn set_phases(&mut self, l: f64, r: f64) {
        match self {
            VoiceKind::Binaural(v) => v.set_phases(l, r),
            VoiceKind::BinauralTransition(v) => v.set_phases(l, r),
            VoiceKind::Isochronic(v) => v.set_phases(l, r),
            VoiceKind::IsochronicTransition(v) => v.set_phases(l, r),
            VoiceKind::Noise(v) => v.set_phases(l, r),
        }
    }

    fn normalization_peak(&self) -> f64 {
        match self {
            VoiceKind::Binaural(v) => v.normalization_peak(),
            VoiceKind::BinauralTransition(v) => v.normalization_peak(),
            VoiceKind::Isochronic(v) => v.normalization_peak(),
            VoiceKind::IsochronicTransition(v) => v.normalization_peak(),
            VoiceKind::Noise(v) => v.normalization_peak(),
        }
    }
}

/// Instantiates the voice for a step (§3 lifecycle: "voices are created
/// when a step becomes current"). Returns `None` only when noise generator
/// construction fails (e.g. a pathological FFT size); an unknown
/// `synth_function` never reaches here (`VoiceData` parsing already drops
/// it, §7).
pub fn build_voice(data: &VoiceData, fs: f64, step_duration: f64) -> Option<VoiceKind> {
    let envelope_points = data.volume_envelope.clone().unwrap_or_default();

    let kind = match data.synth_function {
        SynthFunction::BinauralBeat => {
            VoiceKind::Binaural(VolumeEnvelope::new(BinauralBeat::new(&data.parameters, fs, step_duration), envelope_points, fs))
        }
        SynthFunction::BinauralBeatTransition => VoiceKind::BinauralTransition(VolumeEnvelope::new(
            BinauralBeatTransition::new(&data.parameters, fs, step_duration),
            envelope_points,
            fs,
        )),
        SynthFunction::IsochronicTone => {
            VoiceKind::Isochronic(VolumeEnvelope::new(IsochronicTone::new(&data.parameters, fs, step_duration), envelope_points, fs))
        }
        SynthFunction::IsochronicToneTransition => VoiceKind::IsochronicTransition(VolumeEnvelope::new(
            IsochronicToneTransition::new(&data.parameters, fs, step_duration),
            envelope_points,
            fs,
        )),
        SynthFunction::NoiseSweptNotch | SynthFunction::NoiseSweptNotchTransition => {
            let noise_params = data.noise_params.clone()?;
            let voice = NoiseSweptNotchVoice::new(noise_params, fs, step_duration)?;
            VoiceKind::Noise(VolumeEnvelope::new(voice, envelope_points, fs))
        }
    };
    Some(kind)
}
