//! Per-step voice mixdown and group normalisation (§4.6.2): voices are
//! grouped by [`VoiceType`], each group is summed into a shared scratch
//! buffer, and the group is scaled down only as far as its own statically
//! advertised peak requires before being folded into the step's output.

use crate::model::VoiceType;
use crate::voice::{Voice, VoiceKind};

/// `Other`-typed voices aren't covered by `binauralVolume`/`noiseVolume`;
/// they get unity volume and are normalised against the step's target same
/// as the other two groups.
const OTHER_GROUP_VOLUME: f64 = 1.0;

/// Renders `voices` (each tagged with its `VoiceType`) for `frames` stereo
/// frames into a freshly allocated buffer, grouped and gain-normalised per
/// §4.6.2, and drops any voice that finished during this render.
pub fn render_step_mixdown(
    voices: &mut Vec<(VoiceType, VoiceKind)>,
    frames: usize,
    binaural_volume: f64,
    noise_volume: f64,
    normalization_target: f64,
) -> Vec<f64> {
    let mut out = vec![0.0_f64; frames * 2];
    if voices.is_empty() {
        return out;
    }

    for group in [VoiceType::Binaural, VoiceType::Noise, VoiceType::Other] {
        let volume = match group {
            VoiceType::Binaural => binaural_volume,
            VoiceType::Noise => noise_volume,
            VoiceType::Other => OTHER_GROUP_VOLUME,
        };
        render_group(voices, group, frames, volume, normalization_target, &mut out);
    }

    voices.retain(|(_, v)| !v.is_finished());
    out
}

fn render_group(
    voices: &mut [(VoiceType, VoiceKind)],
    group: VoiceType,
    frames: usize,
    volume: f64,
    normalization_target: f64,
    out: &mut [f64],
) {
    let mut scratch = vec![0.0_f64; frames * 2];
    let mut peak = 0.0_f64;
    let mut any = false;
    for (voice_type, voice) in voices.iter_mut() {
        if *voice_type != group {
            continue;
        }
        voice.process(&mut scratch);
        peak = peak.max(voice.normalization_peak());
        any = true;
    }
    if !any {
        return;
    }
    let gain = (normalization_target / peak.max(1e-9)).min(1.0) * volume;
    for (o, s) in out.iter_mut().zip(scratch.iter()) {
        *o += s * gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamMap;
    use crate::model::{SynthFunction, VoiceData};
    use crate::voice::build_voice;

    fn voice_data(synth: SynthFunction, voice_type: VoiceType, params: &[(&str, serde_json::Value)]) -> VoiceData {
        let mut m = serde_json::Map::new();
        for (k, v) in params {
            m.insert(k.to_string(), v.clone());
        }
        let parameters = ParamMap::from_value(&serde_json::Value::Object(m));
        VoiceData { synth_function: synth, parameters, noise_params: None, volume_envelope: None, voice_type }
    }

    #[test]
    fn group_gain_never_exceeds_normalization_target() {
        let data = voice_data(
            SynthFunction::BinauralBeat,
            VoiceType::Binaural,
            &[("baseFreq", serde_json::json!(200.0)), ("ampL", serde_json::json!(1.0)), ("ampR", serde_json::json!(1.0))],
        );
        let voice = build_voice(&data, 48_000.0, 1.0).unwrap();
        let mut voices = vec![(VoiceType::Binaural, voice)];
        let out = render_step_mixdown(&mut voices, 512, 0.6, 0.6, 0.5);
        assert!(out.iter().all(|x| x.abs() <= 0.6 + 1e-9));
    }

    #[test]
    fn empty_voice_list_produces_silence() {
        let mut voices: Vec<(VoiceType, VoiceKind)> = Vec::new();
        let out = render_step_mixdown(&mut voices, 128, 0.6, 0.6, 0.95);
        assert!(out.iter().all(|x| *x == 0.0));
    }

}
