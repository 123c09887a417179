//! WAV decoding and encoding for recordings, clips and placeholders.
//!
//! Everything handed to the recognizer is 16-bit mono at 16kHz. Clips keep
//! their native rate and are only downmixed.

use crate::defaults::INPUT_SAMPLE_RATE;
use crate::error::{Result, VoxturnError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decode a WAV stream into 16kHz mono samples for recognition.
pub fn load_input<R: Read>(reader: R) -> Result<Vec<i16>> {
    let (mono, rate) = decode_mono(reader)?;
    Ok(resample(&mono, rate, INPUT_SAMPLE_RATE))
}

/// Decode a WAV file into 16kHz mono samples for recognition.
pub fn load_input_file(path: &Path) -> Result<Vec<i16>> {
    let file = File::open(path).map_err(|e| VoxturnError::AudioInput {
        message: format!("Failed to open {}: {}", path.display(), e),
    })?;
    load_input(BufReader::new(file))
}

/// Read a clip as mono samples at its native sample rate.
pub fn read_clip(path: &Path) -> Result<(Vec<i16>, u32)> {
    let file = File::open(path).map_err(|e| VoxturnError::Playback {
        message: format!("Failed to open clip {}: {}", path.display(), e),
    })?;
    decode_mono(BufReader::new(file)).map_err(|e| VoxturnError::Playback {
        message: format!("{}: {}", path.display(), e),
    })
}

/// Write mono 16-bit PCM to `path`, replacing any existing file.
pub fn write_pcm(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(write_error)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)
}

/// Write `secs` seconds of mono 16-bit silence to `path`.
pub fn write_silence(path: &Path, sample_rate: u32, secs: f32) -> Result<()> {
    let samples = vec![0i16; sample_count(sample_rate, secs)];
    write_pcm(path, &samples, sample_rate)
}

/// Number of samples in `secs` seconds of audio. Negative durations give 0.
pub fn sample_count(sample_rate: u32, secs: f32) -> usize {
    (sample_rate as f64 * secs.max(0.0) as f64).round() as usize
}

/// Duration of `samples` at `sample_rate`, in seconds.
pub fn duration_secs(samples: usize, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f32 / sample_rate as f32
}

fn write_error(e: hound::Error) -> VoxturnError {
    match e {
        hound::Error::IoError(io) => VoxturnError::Io(io),
        other => VoxturnError::Io(std::io::Error::other(other)),
    }
}

fn decode_mono<R: Read>(reader: R) -> Result<(Vec<i16>, u32)> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| VoxturnError::AudioInput {
        message: format!("Failed to parse WAV file: {}", e),
    })?;

    let spec = wav_reader.spec();
    let read_error = |e: hound::Error| VoxturnError::AudioInput {
        message: format!("Failed to read WAV samples: {}", e),
    };

    let raw: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_error)?,
        (hound::SampleFormat::Int, bits) if bits <= 32 => {
            let shift = bits.saturating_sub(16);
            let up = 16u16.saturating_sub(bits);
            wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| ((v >> shift) << up) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_error)?
        }
        (hound::SampleFormat::Float, 32) => wav_reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_error)?,
        (format, bits) => {
            return Err(VoxturnError::AudioInput {
                message: format!("Unsupported WAV encoding: {:?} {}-bit", format, bits),
            });
        }
    };

    Ok((downmix(&raw, spec.channels), spec.sample_rate))
}

/// Average interleaved channels into one.
fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx.min(samples.len() - 1)]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn load_input_16khz_mono_matches_exactly() {
        let input_samples = vec![100i16, 200, 300, 400, 500];
        let wav_data = make_wav_data(16000, 1, &input_samples);

        let samples = load_input(Cursor::new(wav_data)).unwrap();
        assert_eq!(samples, input_samples);
    }

    #[test]
    fn load_input_stereo_downmixes_to_mono() {
        let stereo_samples = vec![100i16, 200, 300, 400, -100, 100];
        let wav_data = make_wav_data(16000, 2, &stereo_samples);

        let samples = load_input(Cursor::new(wav_data)).unwrap();
        assert_eq!(samples, vec![150i16, 350, 0]);
    }

    #[test]
    fn load_input_resamples_44100_to_16000() {
        let input_samples = vec![1000i16; 44100];
        let wav_data = make_wav_data(44100, 1, &input_samples);

        let samples = load_input(Cursor::new(wav_data)).unwrap();
        assert!(samples.len() >= 15900 && samples.len() <= 16100);
        assert!(samples.iter().all(|&s| (900..=1100).contains(&s)));
    }

    #[test]
    fn load_input_reads_float_wav() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in [0.0f32, 0.5, -0.5, 2.0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let samples = load_input(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(samples[0], 0);
        assert!((samples[1] - 16383).abs() <= 1);
        assert!((samples[2] + 16383).abs() <= 1);
        assert_eq!(samples[3], i16::MAX);
    }

    #[test]
    fn invalid_wav_data_returns_error() {
        let result = load_input(Cursor::new(vec![0u8, 1, 2, 3, 4, 5]));
        match result {
            Err(VoxturnError::AudioInput { message }) => {
                assert!(message.contains("Failed to parse WAV file"));
            }
            _ => panic!("Expected AudioInput error"),
        }
    }

    #[test]
    fn missing_input_file_returns_error() {
        let result = load_input_file(Path::new("/nonexistent/voxturn/input.wav"));
        assert!(matches!(result, Err(VoxturnError::AudioInput { .. })));
    }

    #[test]
    fn write_silence_produces_expected_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");

        write_silence(&path, 22050, 0.3).unwrap();

        let (samples, rate) = read_clip(&path).unwrap();
        assert_eq!(rate, 22050);
        assert_eq!(samples.len(), 6615);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn write_pcm_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        write_pcm(&path, &[1, 2, 3, 4], 8000).unwrap();
        write_pcm(&path, &[7, 8], 16000).unwrap();

        assert_eq!(read_clip(&path).unwrap(), (vec![7, 8], 16000));
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let result = write_silence(Path::new("/nonexistent/voxturn/x.wav"), 22050, 0.3);
        assert!(matches!(result, Err(VoxturnError::Io(_))));
    }

    #[test]
    fn read_clip_missing_file_is_playback_error() {
        let result = read_clip(Path::new("/nonexistent/voxturn/clip.wav"));
        assert!(matches!(result, Err(VoxturnError::Playback { .. })));
    }

    #[test]
    fn sample_count_and_duration() {
        assert_eq!(sample_count(22050, 0.3), 6615);
        assert_eq!(sample_count(16000, -1.0), 0);
        assert_eq!(duration_secs(8000, 16000), 0.5);
        assert_eq!(duration_secs(10, 0), 0.0);
    }

    #[test]
    fn resample_identity_same_rate() {
        let samples = vec![100i16, 200, 300, 400, 500];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn resample_upsample_verification() {
        let resampled = resample(&[0i16, 1000, 2000], 8000, 16000);

        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0);
        assert!(resampled[1] > 0 && resampled[1] < 1000);
        assert_eq!(resampled[2], 1000);
    }

    #[test]
    fn resample_handles_edge_cases() {
        assert!(resample(&[], 16000, 8000).is_empty());

        let single = resample(&[100i16], 16000, 8000);
        assert_eq!(single, vec![100]);
    }
}
