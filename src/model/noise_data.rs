//! `NoiseParams`, `NoiseSweep`, `BackgroundNoiseData`, and colour-preset
//! resolution (§3, §9 open question, GLOSSARY).

use crate::math::LfoWaveform;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NoiseSweepWire {
    pub start_min_freq: f64,
    pub end_min_freq: f64,
    pub start_max_freq: f64,
    pub end_max_freq: f64,
    pub start_q: f64,
    pub end_q: f64,
    pub start_cascade: u32,
    pub end_cascade: u32,
    /// Phase offset in degrees between L and R for this sweep's LFO.
    #[serde(default)]
    pub phase_offset_deg: f64,
    /// Optional secondary ("intra") notch pair offset in degrees.
    #[serde(default)]
    pub intra_offset_deg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoiseSweep {
    pub start_min_freq: f64,
    pub end_min_freq: f64,
    pub start_max_freq: f64,
    pub end_max_freq: f64,
    pub start_q: f64,
    pub end_q: f64,
    pub start_cascade: u32,
    pub end_cascade: u32,
    pub phase_offset_deg: f64,
    pub intra_offset_deg: Option<f64>,
}

impl From<NoiseSweepWire> for NoiseSweep {
    fn from(w: NoiseSweepWire) -> Self {
        NoiseSweep {
            start_min_freq: w.start_min_freq,
            end_min_freq: w.end_min_freq,
            start_max_freq: w.start_max_freq,
            end_max_freq: w.end_max_freq,
            start_q: w.start_q,
            end_q: w.end_q,
            start_cascade: w.start_cascade.max(1),
            end_cascade: w.end_cascade.max(1),
            phase_offset_deg: w.phase_offset_deg,
            intra_offset_deg: w.intra_offset_deg,
        }
    }
}

fn default_lfo_waveform() -> String {
    "sine".to_string()
}
fn default_exponent() -> f64 {
    1.0
}
fn default_distribution_curve() -> f64 {
    1.0
}
fn default_amplitude() -> f64 {
    1.0
}

impl Default for NoiseParamsWire {
    fn default() -> Self {
        NoiseParamsWire {
            duration_seconds: 0.0,
            lfo_waveform: default_lfo_waveform(),
            transition: false,
            start_lfo_freq: 0.0,
            end_lfo_freq: 0.0,
            sweeps: Vec::new(),
            exponent: default_exponent(),
            high_exponent: default_exponent(),
            distribution_curve: default_distribution_curve(),
            lowcut: None,
            highcut: None,
            amplitude: default_amplitude(),
            seed: 0,
            phase_offset_deg: 0.0,
            initial_offset: 0.0,
            color_preset: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoiseParamsWire {
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default = "default_lfo_waveform")]
    pub lfo_waveform: String,
    #[serde(default)]
    pub transition: bool,
    #[serde(default)]
    pub start_lfo_freq: f64,
    #[serde(default)]
    pub end_lfo_freq: f64,
    #[serde(default)]
    pub sweeps: Vec<NoiseSweepWire>,
    #[serde(default = "default_exponent")]
    pub exponent: f64,
    #[serde(default = "default_exponent")]
    pub high_exponent: f64,
    #[serde(default = "default_distribution_curve")]
    pub distribution_curve: f64,
    #[serde(default)]
    pub lowcut: Option<f64>,
    #[serde(default)]
    pub highcut: Option<f64>,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub phase_offset_deg: f64,
    #[serde(default)]
    pub initial_offset: f64,
    #[serde(default)]
    pub color_preset: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoiseParams {
    pub duration_seconds: f64,
    pub lfo_waveform: LfoWaveform,
    pub transition: bool,
    pub start_lfo_freq: f64,
    pub end_lfo_freq: f64,
    pub sweeps: Vec<NoiseSweep>,
    pub exponent: f64,
    pub high_exponent: f64,
    pub distribution_curve: f64,
    pub lowcut: Option<f64>,
    pub highcut: Option<f64>,
    pub amplitude: f64,
    pub seed: u64,
    pub phase_offset_deg: f64,
    pub initial_offset: f64,
}

impl From<NoiseParamsWire> for NoiseParams {
    fn from(w: NoiseParamsWire) -> Self {
        let lfo_waveform = match w.lfo_waveform.as_str() {
            "triangle" => LfoWaveform::Triangle,
            _ => LfoWaveform::Sine,
        };

        let mut exponent = w.exponent;
        let mut high_exponent = w.high_exponent;
        let mut lowcut = w.lowcut;
        let mut highcut = w.highcut;

        // Only resolve a named preset when no explicit spectral fields are
        // present at all (§9 open question).
        let explicit_fields_present = w.exponent != default_exponent()
            || w.high_exponent != default_exponent()
            || w.lowcut.is_some()
            || w.highcut.is_some();

        if !explicit_fields_present {
            if let Some(name) = &w.color_preset {
                match resolve_color_preset(name) {
                    Some(preset) => {
                        exponent = preset.exponent;
                        high_exponent = preset.high_exponent;
                        lowcut = preset.lowcut.or(lowcut);
                        highcut = preset.highcut.or(highcut);
                    }
                    None => log::warn!("unknown noise colour preset '{name}', falling back to defaults"),
                }
            }
        }

        NoiseParams {
            duration_seconds: w.duration_seconds,
            lfo_waveform,
            transition: w.transition,
            start_lfo_freq: w.start_lfo_freq,
            end_lfo_freq: w.end_lfo_freq,
            sweeps: w.sweeps.into_iter().map(NoiseSweep::from).collect(),
            exponent,
            high_exponent,
            distribution_curve: w.distribution_curve.max(1e-6),
            lowcut,
            highcut,
            amplitude: w.amplitude,
            seed: w.seed,
            phase_offset_deg: w.phase_offset_deg,
            initial_offset: w.initial_offset,
        }
    }
}

/// Whether `a` can be updated in-place to `b` without rebuilding the
/// streaming noise generator: sweep count unchanged and every sweep's new
/// max cascade fits within what was already allocated for it (§4.5.4).
pub fn is_realtime_compatible(running: &NoiseParams, incoming: &NoiseParams) -> bool {
    if running.sweeps.len() != incoming.sweeps.len() {
        return false;
    }
    running
        .sweeps
        .iter()
        .zip(incoming.sweeps.iter())
        .all(|(r, i)| {
            let allocated = r.start_cascade.max(r.end_cascade);
            let needed = i.start_cascade.max(i.end_cascade);
            needed <= allocated
        })
}

pub struct ColorPreset {
    pub exponent: f64,
    pub high_exponent: f64,
    pub lowcut: Option<f64>,
    pub highcut: Option<f64>,
}

/// GLOSSARY colour presets.
pub fn resolve_color_preset(name: &str) -> Option<ColorPreset> {
    let preset = match name {
        "pink" => ColorPreset { exponent: 1.0, high_exponent: 1.0, lowcut: None, highcut: None },
        "brown" => ColorPreset { exponent: 2.0, high_exponent: 2.0, lowcut: None, highcut: None },
        "red" => ColorPreset { exponent: 2.0, high_exponent: 1.5, lowcut: None, highcut: None },
        "green" => ColorPreset {
            exponent: 0.0,
            high_exponent: 0.0,
            lowcut: Some(100.0),
            highcut: Some(8000.0),
        },
        "blue" => ColorPreset { exponent: -1.0, high_exponent: -1.0, lowcut: None, highcut: None },
        "purple" => ColorPreset { exponent: -2.0, high_exponent: -2.0, lowcut: None, highcut: None },
        "deep_brown" => ColorPreset { exponent: 2.5, high_exponent: 2.0, lowcut: None, highcut: None },
        "white" => ColorPreset { exponent: 0.0, high_exponent: 0.0, lowcut: None, highcut: None },
        _ => return None,
    };
    Some(preset)
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundNoiseDataWire {
    #[serde(default, alias = "noise_parameters", alias = "color_params")]
    pub noise_parameters: Option<NoiseParamsWire>,
    #[serde(default = "default_amplitude")]
    pub gain: f64,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub fade_out: f64,
    #[serde(default)]
    pub amp_envelope: Option<Vec<(f64, f64)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundNoiseData {
    pub noise_params: NoiseParams,
    pub gain: f64,
    pub start_time: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub amp_envelope: Option<Vec<(f64, f64)>>,
}

impl From<BackgroundNoiseDataWire> for BackgroundNoiseData {
    fn from(w: BackgroundNoiseDataWire) -> Self {
        BackgroundNoiseData {
            noise_params: w.noise_parameters.unwrap_or_default_wire().into(),
            gain: w.gain,
            start_time: w.start_time,
            fade_in: w.fade_in,
            fade_out: w.fade_out,
            amp_envelope: w.amp_envelope,
        }
    }
}

trait OptionWireExt {
    fn unwrap_or_default_wire(self) -> NoiseParamsWire;
}

impl OptionWireExt for Option<NoiseParamsWire> {
    fn unwrap_or_default_wire(self) -> NoiseParamsWire {
        self.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_glossary() {
        let pink = resolve_color_preset("pink").unwrap();
        assert_eq!(pink.exponent, 1.0);
        let green = resolve_color_preset("green").unwrap();
        assert_eq!(green.lowcut, Some(100.0));
        assert_eq!(green.highcut, Some(8000.0));
        assert!(resolve_color_preset("mauve").is_none());
    }

    #[test]
    fn explicit_fields_win_over_preset() {
        let wire = NoiseParamsWire {
            duration_seconds: 1.0,
            lfo_waveform: default_lfo_waveform(),
            transition: false,
            start_lfo_freq: 0.0,
            end_lfo_freq: 0.0,
            sweeps: Vec::new(),
            exponent: 3.0,
            high_exponent: default_exponent(),
            distribution_curve: default_distribution_curve(),
            lowcut: None,
            highcut: None,
            amplitude: default_amplitude(),
            seed: 0,
            phase_offset_deg: 0.0,
            initial_offset: 0.0,
            color_preset: Some("pink".to_string()),
        };
        let params: NoiseParams = wire.into();
        assert_eq!(params.exponent, 3.0);
    }

    #[test]
    fn compatibility_checks_sweep_count_and_cascade_bounds() {
        let sweep = |start_c, end_c| NoiseSweep {
            start_min_freq: 100.0,
            end_min_freq: 100.0,
            start_max_freq: 200.0,
            end_max_freq: 200.0,
            start_q: 1.0,
            end_q: 1.0,
            start_cascade: start_c,
            end_cascade: end_c,
            phase_offset_deg: 0.0,
            intra_offset_deg: None,
        };
        let mut running = make_noise_params();
        running.sweeps = vec![sweep(4, 4)];
        let mut ok = running.clone();
        ok.sweeps = vec![sweep(2, 3)];
        assert!(is_realtime_compatible(&running, &ok));

        let mut too_deep = running.clone();
        too_deep.sweeps = vec![sweep(5, 5)];
        assert!(!is_realtime_compatible(&running, &too_deep));

        let mut wrong_count = running.clone();
        wrong_count.sweeps = vec![sweep(1, 1), sweep(1, 1)];
        assert!(!is_realtime_compatible(&running, &wrong_count));
    }

    fn make_noise_params() -> NoiseParams {
        NoiseParams {
            duration_seconds: 1.0,
            lfo_waveform: LfoWaveform::Sine,
            transition: false,
            start_lfo_freq: 0.0,
            end_lfo_freq: 0.0,
            sweeps: Vec::new(),
            exponent: 1.0,
            high_exponent: 1.0,
            distribution_curve: 1.0,
            lowcut: None,
            highcut: None,
            amplitude: 1.0,
            seed: 0,
            phase_offset_deg: 0.0,
            initial_offset: 0.0,
        }
    }
}
