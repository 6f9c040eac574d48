//! # Audio Decoding
//!
//! Converts uploaded audio into the 16 kHz mono f32 samples the Whisper
//! model consumes.
//!
//! ## Accepted inputs:
//! - **WAV** (RIFF container): 8/16/24-bit integer or 32-bit float PCM, any
//!   channel count, any sample rate (resampled to 16 kHz)
//! - **Raw PCM**: headerless 16-bit little-endian mono at 16 kHz, for
//!   recorders that strip the container

use anyhow::{anyhow, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::path::Path;

/// Sample rate expected by the Whisper front-end.
pub const MODEL_SAMPLE_RATE: u32 = 16_000;

/// Decode an audio file into 16 kHz mono f32 samples.
pub fn decode_audio_file(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow!("failed to read buffered audio {}: {}", path.display(), e))?;
    decode_audio_bytes(&bytes)
}

/// Decode raw upload bytes into 16 kHz mono f32 samples.
pub fn decode_audio_bytes(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.is_empty() {
        return Err(anyhow!("audio payload is empty"));
    }

    if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)
    } else {
        // Headerless fallback: interpret as 16-bit LE mono PCM at 16 kHz.
        decode_raw_pcm16(bytes)
    }
}

fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>> {
    let mut cursor = Cursor::new(bytes);
    let (header, data) = wav::read(&mut cursor).map_err(|e| anyhow!("invalid WAV data: {}", e))?;

    if header.channel_count == 0 {
        return Err(anyhow!("WAV header declares zero channels"));
    }

    let samples: Vec<f32> = match data {
        wav::BitDepth::Eight(s) => s.iter().map(|&v| (v as f32 - 128.0) / 128.0).collect(),
        wav::BitDepth::Sixteen(s) => pcm16_to_float(&s),
        wav::BitDepth::TwentyFour(s) => s.iter().map(|&v| v as f32 / 8_388_608.0).collect(),
        wav::BitDepth::ThirtyTwoFloat(s) => s,
        wav::BitDepth::Empty => return Err(anyhow!("WAV file contains no samples")),
    };

    let mono = downmix(&samples, header.channel_count as usize);
    Ok(resample_linear(&mono, header.sampling_rate, MODEL_SAMPLE_RATE))
}

fn decode_raw_pcm16(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        return Err(anyhow!("raw PCM length must be even for 16-bit samples"));
    }

    let mut cursor = Cursor::new(bytes);
    let mut samples = Vec::with_capacity(bytes.len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample);
    }
    Ok(pcm16_to_float(&samples))
}

/// Scale 16-bit integer PCM into the [-1.0, 1.0] float range.
pub fn pcm16_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32_768.0).collect()
}

/// Average interleaved channels down to mono.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler. Adequate for speech at these rates.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sampling_rate: u32, channel_count: u16, samples: &[i16]) -> Vec<u8> {
        let header = wav::Header::new(wav::WAV_FORMAT_PCM, channel_count, sampling_rate, 16);
        let mut out = Cursor::new(Vec::new());
        wav::write(header, &wav::BitDepth::Sixteen(samples.to_vec()), &mut out).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_mono_wav_passthrough() {
        let bytes = wav_bytes(16_000, 1, &[0, 16_384, -16_384, 32_767]);
        let samples = decode_audio_bytes(&bytes).unwrap();
        assert_eq!(samples.len(), 4);
        assert!((samples[1] - 0.5).abs() < 1e-3);
        assert!((samples[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_stereo_downmix() {
        // L=0.5, R=-0.5 averages to silence.
        let bytes = wav_bytes(16_000, 2, &[16_384, -16_384, 16_384, -16_384]);
        let samples = decode_audio_bytes(&bytes).unwrap();
        assert_eq!(samples.len(), 2);
        for s in samples {
            assert!(s.abs() < 1e-3);
        }
    }

    #[test]
    fn test_resample_halves_8k_input_length_ratio() {
        // 8 kHz input doubles in length when brought up to 16 kHz.
        let source: Vec<i16> = (0..800).map(|i| (i % 100) as i16 * 100).collect();
        let bytes = wav_bytes(8_000, 1, &source);
        let samples = decode_audio_bytes(&bytes).unwrap();
        assert!((samples.len() as i64 - 1600).abs() <= 2);
    }

    #[test]
    fn test_raw_pcm_fallback() {
        let mut bytes = Vec::new();
        for s in [0i16, 1000, -1000, 32_767] {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let samples = decode_audio_bytes(&bytes).unwrap();
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn test_rejects_empty_and_odd_payloads() {
        assert!(decode_audio_bytes(&[]).is_err());
        assert!(decode_audio_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_pcm16_range() {
        let floats = pcm16_to_float(&[i16::MIN, 0, i16::MAX]);
        assert_eq!(floats[0], -1.0);
        assert_eq!(floats[1], 0.0);
        assert!(floats[2] < 1.0);
    }
}
