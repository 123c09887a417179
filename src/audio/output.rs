//! Clip playback through the system audio output using CPAL.

use crate::audio::player::ClipPlayer;
use crate::audio::wav::{read_clip, resample};
use crate::error::{Result, VoxturnError};
use crate::pipeline::types::{AudioArtifact, Clip};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for desktop sound servers.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List audio output devices, marking sound-server devices as recommended.
pub fn list_output_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.output_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| VoxturnError::Playback {
        message: format!("Failed to enumerate output devices: {}", e),
    })?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if is_preferred_device(&name) {
                names.push(format!("{} [recommended]", name));
            } else {
                names.push(name);
            }
        }
    }
    Ok(names)
}

fn find_output_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host.output_devices().map_err(|e| VoxturnError::Playback {
                message: format!("Failed to enumerate output devices: {}", e),
            })?;
            for device in devices {
                if let Ok(dev_name) = device.name()
                    && dev_name == name
                {
                    return Ok(device);
                }
            }
            return Err(VoxturnError::OutputDeviceNotFound {
                device: name.to_string(),
            });
        }

        if let Ok(devices) = host.output_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_output_device()
            .ok_or_else(|| VoxturnError::OutputDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Plays clips on an output device, blocking until each clip finishes.
///
/// A stream is opened per clip at the device's native config; clips are
/// resampled and duplicated across channels in software.
pub struct CpalPlayer {
    device: cpal::Device,
}

impl CpalPlayer {
    /// Opens `device_name`, or the preferred default output device.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = find_output_device(device_name)?;
        if let Ok(name) = device.name() {
            tracing::info!(device = %name, "audio output ready");
        }
        Ok(Self { device })
    }
}

/// Fills interleaved output frames from a mono clip, then silence.
fn fill_frames<T: Copy>(
    data: &mut [T],
    channels: usize,
    clip: &[f32],
    position: &AtomicUsize,
    finished: &AtomicBool,
    convert: impl Fn(f32) -> T,
) {
    for frame in data.chunks_mut(channels.max(1)) {
        let index = position.fetch_add(1, Ordering::Relaxed);
        let value = match clip.get(index) {
            Some(&v) => v,
            None => {
                finished.store(true, Ordering::SeqCst);
                0.0
            }
        };
        let sample = convert(value);
        for slot in frame.iter_mut() {
            *slot = sample;
        }
    }
}

impl ClipPlayer for CpalPlayer {
    fn play(&self, artifact: &AudioArtifact, keep_playing: &AtomicBool) -> Result<()> {
        use cpal::SampleFormat;

        let (samples, clip_rate) = match &artifact.clip {
            Clip::File(path) => read_clip(path)?,
            Clip::Pcm {
                samples,
                sample_rate,
            } => (samples.as_ref().clone(), *sample_rate),
        };

        let default_config =
            self.device
                .default_output_config()
                .map_err(|e| VoxturnError::Playback {
                    message: format!("Failed to query default output config: {}", e),
                })?;
        let device_rate = default_config.sample_rate().0;
        let channels = default_config.channels() as usize;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        let clip: Arc<Vec<f32>> = Arc::new(
            resample(&samples, clip_rate, device_rate)
                .iter()
                .map(|&s| s as f32 / i16::MAX as f32)
                .collect(),
        );
        let expected = Duration::from_secs_f64(clip.len() as f64 / device_rate.max(1) as f64);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(clip.is_empty()));

        let err_callback = |err: cpal::StreamError| {
            tracing::warn!("audio output stream error: {}", err);
        };
        let build_error = |e: cpal::BuildStreamError| VoxturnError::Playback {
            message: format!("Failed to build output stream: {}", e),
        };

        let stream = {
            let clip = Arc::clone(&clip);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            match default_config.sample_format() {
                SampleFormat::F32 => self
                    .device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            fill_frames(data, channels, &clip, &position, &finished, |v| v);
                        },
                        err_callback,
                        None,
                    )
                    .map_err(build_error)?,
                SampleFormat::I16 => self
                    .device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                            fill_frames(data, channels, &clip, &position, &finished, |v| {
                                (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                            });
                        },
                        err_callback,
                        None,
                    )
                    .map_err(build_error)?,
                SampleFormat::U16 => self
                    .device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                            fill_frames(data, channels, &clip, &position, &finished, |v| {
                                ((v.clamp(-1.0, 1.0) * 0.5 + 0.5) * u16::MAX as f32) as u16
                            });
                        },
                        err_callback,
                        None,
                    )
                    .map_err(build_error)?,
                fmt => {
                    return Err(VoxturnError::Playback {
                        message: format!("Unsupported output sample format: {:?}", fmt),
                    });
                }
            }
        };

        stream.play().map_err(|e| VoxturnError::Playback {
            message: format!("Failed to start output stream: {}", e),
        })?;

        // Bounded in case the device stops pulling data
        let deadline = Instant::now() + expected + Duration::from_secs(2);
        while !finished.load(Ordering::SeqCst) {
            if !keep_playing.load(Ordering::SeqCst) {
                tracing::debug!(clip = %artifact.label(), "playback aborted");
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!(clip = %artifact.label(), "output device stalled, abandoning clip");
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        drop(stream);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}
