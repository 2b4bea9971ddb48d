//! Audio output loop (§4.7): a dedicated writer thread pulls rendered
//! blocks off the scheduler through a single-producer/single-consumer
//! channel into a non-blocking cpal callback, mirroring the
//! request/response worker shape `noise::generator`'s FFT worker uses for
//! its own background thread.

use crate::output::device::{get_output_device, get_supported_config, AudioConfig};
use crate::scheduler::TrackScheduler;
use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Stereo frames rendered per `process_block` call on the writer thread
/// (§4.7's suggested 1024 frames).
const BLOCK_FRAMES: usize = 1024;
const RING_CAPACITY: usize = BLOCK_FRAMES * 2 * 4;

/// Shared handle to a running output's scheduler, cheap to clone and safe
/// to hold on the control thread (§5: the scheduler mutex is the sole
/// mutable boundary between control and audio).
#[derive(Clone)]
pub struct AudioOutputHandle {
    scheduler: Arc<Mutex<TrackScheduler>>,
}

impl AudioOutputHandle {
    pub fn play(&self) {
        self.scheduler.lock().play();
    }

    pub fn pause(&self) {
        self.scheduler.lock().pause();
    }

    pub fn seek_to(&self, seconds: f64) {
        self.scheduler.lock().seek_to(seconds);
    }

    pub fn set_master_gain(&self, gain: f64) {
        self.scheduler.lock().set_master_gain(gain);
    }

    pub fn load_track(&self, track: crate::model::TrackData) {
        self.scheduler.lock().load_track(track);
    }

    pub fn update_track(&self, track: crate::model::TrackData) {
        self.scheduler.lock().update_track(track);
    }

    pub fn position_seconds(&self) -> f64 {
        self.scheduler.lock().position_seconds()
    }

    pub fn elapsed_samples(&self) -> u64 {
        self.scheduler.lock().elapsed_samples()
    }

    pub fn current_step(&self) -> usize {
        self.scheduler.lock().current_step()
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler.lock().is_paused()
    }

    pub fn sample_rate(&self) -> f64 {
        self.scheduler.lock().sample_rate()
    }
}

/// Owns the writer thread and the cpal stream (§4.7). Dropping it stops
/// the thread and releases the stream, matching `release` in §3's
/// lifecycle and `FftNoiseGenerator`'s own stop/join `Drop` pattern.
pub struct AudioOutput {
    _stream: cpal::Stream,
    handle: AudioOutputHandle,
    stop: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl AudioOutput {
    pub fn new(device_name: Option<&str>, config: &AudioConfig, track: crate::model::TrackData) -> Result<Self, String> {
        let device = get_output_device(device_name)?;
        let stream_config = get_supported_config(&device, config)?;
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        let scheduler = Arc::new(Mutex::new(TrackScheduler::new(track)));
        let handle = AudioOutputHandle { scheduler: Arc::clone(&scheduler) };

        let (block_producer, mut block_consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();
        let stop = Arc::new(AtomicBool::new(false));

        let writer = spawn_writer_thread(Arc::clone(&scheduler), stop.clone(), block_producer);

        let err_fn = |err| log::error!("audio output stream error: {err}");
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    fill_output(data, channels, &mut block_consumer);
                },
                err_fn,
                None,
            )
            .map_err(|e| format!("failed to build output stream: {e}"))?;

        stream.play().map_err(|e| format!("failed to start output stream: {e}"))?;

        log::info!("audio output started at {sample_rate} Hz, {channels} channel(s)");

        Ok(AudioOutput { _stream: stream, handle, stop, writer: Some(writer), sample_rate })
    }

    pub fn handle(&self) -> AudioOutputHandle {
        self.handle.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stops the writer thread and joins it within the §4.7 deadline,
    /// leaving the cpal stream in place (it is dropped, and with it
    /// released, when `self` is dropped).
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The writer thread itself (§4.7): while not stopped, sleeps 10 ms when
/// paused, otherwise renders one block and blocking-pushes it (via a
/// bounded retry, not an actual OS block, so `stop` is still observed
/// promptly) into the ring buffer.
fn spawn_writer_thread(scheduler: Arc<Mutex<TrackScheduler>>, stop: Arc<AtomicBool>, mut producer: HeapProd<f32>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut scratch = vec![0.0_f64; BLOCK_FRAMES * 2];
        let mut f32_block = vec![0.0_f32; BLOCK_FRAMES * 2];

        while !stop.load(Ordering::Acquire) {
            let paused = scheduler.lock().is_paused();
            if paused {
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }

            scheduler.lock().process_block(&mut scratch, BLOCK_FRAMES);
            for (dst, src) in f32_block.iter_mut().zip(scratch.iter()) {
                *dst = *src as f32;
            }

            let mut offset = 0;
            while offset < f32_block.len() {
                offset += producer.push_slice(&f32_block[offset..]);
                if offset < f32_block.len() {
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    std::thread::sleep(Duration::from_micros(200));
                }
            }
        }
    })
}

/// The cpal callback (§6.3): non-blocking, pops whatever is available and
/// zero-fills the rest on underrun rather than stalling the audio thread.
/// No output-stage clamping per §6.3 — voices already clamp locally where
/// they must.
fn fill_output(data: &mut [f32], channels: usize, consumer: &mut HeapCons<f32>) {
    if channels == 2 {
        let popped = consumer.pop_slice(data);
        for sample in data[popped..].iter_mut() {
            *sample = 0.0;
        }
        for sample in data.iter_mut() {
            if !sample.is_finite() {
                *sample = 0.0;
            }
        }
        return;
    }

    // Non-stereo devices: expand/collapse the interleaved stereo stream to
    // the device's channel count, duplicating or averaging as needed.
    for frame in data.chunks_mut(channels) {
        let mut pair = [0.0_f32; 2];
        let popped = consumer.pop_slice(&mut pair);
        for s in pair[popped..].iter_mut() {
            *s = 0.0;
        }
        let (l, r) = (pair[0], pair[1]);
        match channels {
            1 => frame[0] = if l.is_finite() && r.is_finite() { 0.5 * (l + r) } else { 0.0 },
            _ => {
                for (i, s) in frame.iter_mut().enumerate() {
                    let v = if i % 2 == 0 { l } else { r };
                    *s = if v.is_finite() { v } else { 0.0 };
                }
            }
        }
    }
}
