//! Local noise gate applied before speech recognition
//!
//! Decodes WAV or MP3 to mono samples, estimates the noise floor from the
//! quietest frames and attenuates every frame that does not rise clearly above
//! it. The result is re-encoded as 16-bit mono WAV.

use std::io::Cursor;

use async_trait::async_trait;

use crate::engines::{MediaBlob, NoiseReducer};
use crate::{Error, Result};

/// Frames per second used for energy analysis (20 ms frames)
const FRAMES_PER_SECOND: u32 = 50;

/// Percentile of frame energies taken as the noise floor
const NOISE_PERCENTILE: f32 = 0.1;

/// A frame passes the gate when its energy exceeds the floor by this factor
const GATE_RATIO: f32 = 2.0;

/// Energy below which a frame is always considered silence
const MIN_GATE: f32 = 1e-4;

/// Gain applied to gated frames
const ATTENUATION: f32 = 0.1;

/// Energy-based noise gate
#[derive(Debug, Default, Clone, Copy)]
pub struct NoiseGate;

impl NoiseGate {
    /// Create a new noise gate
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Run the gate synchronously
    ///
    /// # Errors
    ///
    /// Returns error if the audio is neither WAV nor MP3
    pub fn process(audio: &MediaBlob) -> Result<MediaBlob> {
        let (mut samples, sample_rate) = decode(&audio.bytes)?;
        if samples.is_empty() {
            return Err(Error::Audio("no samples decoded".to_string()));
        }

        let gated = apply_gate(&mut samples, sample_rate);
        tracing::debug!(
            samples = samples.len(),
            sample_rate,
            gated_frames = gated,
            "noise gate applied"
        );

        let stem = audio
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.').map(|(stem, _)| stem))
            .unwrap_or("audio");

        Ok(MediaBlob::new(samples_to_wav(&samples, sample_rate)?)
            .with_mime_type("audio/wav")
            .with_file_name(format!("{stem}.wav")))
    }
}

#[async_trait]
impl NoiseReducer for NoiseGate {
    async fn reduce(&self, audio: &MediaBlob) -> Result<MediaBlob> {
        let audio = audio.clone();
        tokio::task::spawn_blocking(move || Self::process(&audio))
            .await
            .map_err(|e| Error::Audio(format!("noise gate task failed: {e}")))?
    }

    fn supports(&self, audio: &MediaBlob) -> bool {
        AudioFormat::sniff(&audio.bytes).is_some()
    }

    fn name(&self) -> &'static str {
        "noise-gate"
    }
}

/// Containers the gate can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    /// Identify the container from its leading bytes
    fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'R', b'I', b'F', b'F', ..] => Some(Self::Wav),
            [b'I', b'D', b'3', ..] => Some(Self::Mp3),
            // MPEG audio frame sync
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Some(Self::Mp3),
            _ => None,
        }
    }
}

/// Attenuate frames below the estimated gate, returning how many were gated
fn apply_gate(samples: &mut [f32], sample_rate: u32) -> usize {
    let frame_len = (sample_rate / FRAMES_PER_SECOND).max(1) as usize;

    let mut energies: Vec<f32> = samples.chunks(frame_len).map(calculate_energy).collect();
    let frame_energies = energies.clone();
    energies.sort_by(f32::total_cmp);

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let floor_index = ((energies.len() - 1) as f32 * NOISE_PERCENTILE) as usize;
    let gate = (energies[floor_index] * GATE_RATIO).max(MIN_GATE);

    let mut gated = 0;
    for (frame, energy) in samples.chunks_mut(frame_len).zip(frame_energies) {
        if energy < gate {
            gated += 1;
            for sample in frame {
                *sample *= ATTENUATION;
            }
        }
    }
    gated
}

/// Decode WAV or MP3 bytes into mono f32 samples
fn decode(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    match AudioFormat::sniff(bytes) {
        Some(AudioFormat::Wav) => decode_wav(bytes),
        Some(AudioFormat::Mp3) => decode_mp3(bytes),
        None => Err(Error::Audio("unsupported audio format".to_string())),
    }
}

fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            #[allow(clippy::cast_precision_loss)]
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    #[allow(clippy::cast_precision_loss)]
                    s.map(|v| v as f32 / scale)
                })
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
    };

    Ok((downmix(&interleaved, channels), spec.sample_rate))
}

fn decode_mp3(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = 0_u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                let frame_samples: Vec<f32> =
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&frame_samples, frame.channels.max(1)));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("unsupported audio format".to_string()));
    }

    Ok((samples, sample_rate))
}

/// Average interleaved channels down to mono
#[allow(clippy::cast_precision_loss)]
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
