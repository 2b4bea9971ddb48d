//! Public control surface (§6.2): the crate's facade over the scheduler and
//! audio output, returning plain `Result<T, String>` at the boundary the
//! same way the teacher's `AudioEngine`/`AudioEngineHandle` do.
//!
//! Unlike the teacher, this crate does not keep a process-wide leaked
//! singleton (`cpal::Stream` isn't `Send`/`Sync`, and a host embedding this
//! crate owns its own lifetime for the engine rather than a stateless
//! command surface needing global access). `Engine` is a plain owned
//! struct a caller holds directly; `stop` halts and joins the writer
//! thread, while dropping it (or calling `release`) additionally releases
//! the stream and scheduler, honouring §4.7's "release destroys the writer".

use crate::model::TrackData;
use crate::output::{AudioConfig, AudioOutput};
use serde::Serialize;

/// Snapshot returned by `getPlaybackStatus` (§6.2).
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub position_seconds: f64,
    pub current_step: usize,
    pub is_paused: bool,
    pub sample_rate: u32,
}

/// Initializes `env_logger` from the `RUST_LOG` environment variable, for
/// callers (including the test suite) that want a logging subscriber
/// without pulling in their own setup. The crate itself never calls this
/// on its own, matching the teacher's bare `log::info!` call sites with no
/// implicit `init()`.
pub fn init_default_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}

/// Owns (at most) one running audio output. No track is loaded and no
/// device is open until `init` succeeds.
pub struct Engine {
    output: Option<AudioOutput>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine { output: None }
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    /// Opens the output device and starts the writer thread against an
    /// empty track (silence), so output exists before a track is loaded
    /// (§3 lifecycle). Replaces any previously running output.
    pub fn init(&mut self, device_name: Option<&str>, config: &AudioConfig) -> Result<(), String> {
        let empty = empty_track(config.sample_rate);
        let output = AudioOutput::new(device_name, config, empty)?;
        log::info!("engine initialised at {} Hz", output.sample_rate());
        self.output = Some(output);
        Ok(())
    }

    /// Parses and loads a track, resetting playback to its start (§3: `loadTrack`).
    pub fn load_track(&mut self, json: &str) -> Result<(), String> {
        let track = TrackData::from_json(json).map_err(|e| e.to_string())?;
        let output = self.output.as_ref().ok_or_else(|| "engine not initialised".to_string())?;
        output.handle().load_track(track);
        Ok(())
    }

    /// Parses and applies a track update without resetting position (§3:
    /// `updateTrack`).
    pub fn update_track(&mut self, json: &str) -> Result<(), String> {
        let track = TrackData::from_json(json).map_err(|e| e.to_string())?;
        let output = self.output.as_ref().ok_or_else(|| "engine not initialised".to_string())?;
        output.handle().update_track(track);
        Ok(())
    }

    pub fn play(&self) -> Result<(), String> {
        self.require_output()?.play();
        Ok(())
    }

    pub fn pause(&self) -> Result<(), String> {
        self.require_output()?.pause();
        Ok(())
    }

    /// Halts and joins the writer thread (§4.7: distinct from `release`,
    /// which additionally drops the stream and scheduler). A subsequent
    /// call on this engine fails until `init` opens a fresh output.
    pub fn stop(&mut self) -> Result<(), String> {
        let output = self.output.as_mut().ok_or_else(|| "engine not initialised".to_string())?;
        output.stop();
        Ok(())
    }

    pub fn seek_to(&self, seconds: f64) -> Result<(), String> {
        self.require_output()?.seek_to(seconds);
        Ok(())
    }

    pub fn set_master_gain(&self, gain: f64) -> Result<(), String> {
        self.require_output()?.set_master_gain(gain);
        Ok(())
    }

    pub fn current_position(&self) -> Option<f64> {
        self.output.as_ref().map(|o| o.handle().position_seconds())
    }

    pub fn elapsed_samples(&self) -> Option<u64> {
        self.output.as_ref().map(|o| o.handle().elapsed_samples())
    }

    pub fn current_step(&self) -> Option<usize> {
        self.output.as_ref().map(|o| o.handle().current_step())
    }

    pub fn is_paused(&self) -> Option<bool> {
        self.output.as_ref().map(|o| o.handle().is_paused())
    }

    pub fn is_playing(&self) -> Option<bool> {
        self.is_paused().map(|p| !p)
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.output.as_ref().map(|o| o.sample_rate())
    }

    /// `getPlaybackStatus` (§6.2): `None` exactly when no engine exists
    /// (nothing has been `init`ed yet).
    pub fn playback_status(&self) -> Option<PlaybackStatus> {
        let output = self.output.as_ref()?;
        let handle = output.handle();
        Some(PlaybackStatus {
            position_seconds: handle.position_seconds(),
            current_step: handle.current_step(),
            is_paused: handle.is_paused(),
            sample_rate: output.sample_rate(),
        })
    }

    /// Tears the output down entirely (§4.7: `release` destroys the
    /// writer). A subsequent `init` is required before any other call
    /// succeeds again.
    pub fn release(&mut self) {
        self.output = None;
    }

    fn require_output(&self) -> Result<crate::output::AudioOutputHandle, String> {
        self.output.as_ref().map(|o| o.handle()).ok_or_else(|| "engine not initialised".to_string())
    }
}

fn empty_track(sample_rate: u32) -> TrackData {
    use crate::model::{CrossfadeCurve, GlobalSettings};
    TrackData {
        global_settings: GlobalSettings {
            sample_rate,
            crossfade_duration: 3.0,
            crossfade_curve: CrossfadeCurve::Linear,
            normalization_level: 0.95,
        },
        steps: Vec::new(),
        background_noise: None,
        overlay_clips: Vec::new(),
    }
}
