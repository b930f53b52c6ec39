//! WAV decoding
//!
//! Narration clips come out of the TTS batch as RIFF/WAVE. The decoder walks the
//! chunk list rather than assuming a 44-byte header, so `LIST`/`fact` chunks
//! written by other tools are skipped.
//!
//! Supported sample formats:
//!
//! | format tag | bits | notes |
//! |---|---|---|
//! | 1 (PCM) | 8, 16, 24, 32 | 8-bit is unsigned |
//! | 3 (IEEE float) | 32 | |
//! | 0xFFFE (extensible) | any of the above | sub-format read from the extension |

use crate::error::AudioLoadError;

const FORMAT_PCM: u16 = 1;
const FORMAT_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Decoded clip, samples interleaved and normalized to [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    /// Interleaved samples covering `[from_secs, to_secs)`, clamped to the clip
    pub fn window(&self, from_secs: f64, to_secs: f64) -> &[f32] {
        let frames = self.frames();
        let to_frame = |secs: f64| ((secs.max(0.0) * self.sample_rate as f64) as usize).min(frames);
        let start = to_frame(from_secs);
        let end = to_frame(to_secs).max(start);
        let ch = self.channels as usize;
        &self.samples[start * ch..end * ch]
    }
}

#[derive(Debug, Clone, Copy)]
struct WavFormat {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn parse_fmt(chunk: &[u8]) -> Result<WavFormat, AudioLoadError> {
    let short = || AudioLoadError::Decode("fmt chunk too short".to_string());
    let mut format = WavFormat {
        format_tag: read_u16(chunk, 0).ok_or_else(short)?,
        channels: read_u16(chunk, 2).ok_or_else(short)?,
        sample_rate: read_u32(chunk, 4).ok_or_else(short)?,
        bits_per_sample: read_u16(chunk, 14).ok_or_else(short)?,
    };

    if format.format_tag == FORMAT_EXTENSIBLE {
        // First two bytes of the sub-format GUID carry the real tag
        format.format_tag = read_u16(chunk, 24).ok_or_else(short)?;
    }
    Ok(format)
}

/// Decode a RIFF/WAVE byte buffer
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, AudioLoadError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(AudioLoadError::UnsupportedFormat(
            "not a RIFF/WAVE stream".to_string(),
        ));
    }

    let mut format = None;
    let mut data: Option<&[u8]> = None;
    let mut pos = 12;

    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(bytes, pos + 4).unwrap_or(0) as usize;
        let body_start = pos + 8;
        // Truncated streams keep whatever the last chunk actually holds
        let body_end = body_start.saturating_add(size).min(bytes.len());
        let body = &bytes[body_start..body_end];

        match id {
            b"fmt " => format = Some(parse_fmt(body)?),
            b"data" => data = Some(body),
            _ => {}
        }

        // Chunks are word aligned
        pos = body_start.saturating_add(size).saturating_add(size & 1);
    }

    let format = format.ok_or_else(|| AudioLoadError::Decode("missing fmt chunk".to_string()))?;
    let data = data.ok_or_else(|| AudioLoadError::Decode("missing data chunk".to_string()))?;

    if format.channels == 0 || format.sample_rate == 0 {
        return Err(AudioLoadError::Decode(format!(
            "invalid stream: {} channels at {} Hz",
            format.channels, format.sample_rate
        )));
    }

    let mut samples: Vec<f32> = match (format.format_tag, format.bits_per_sample) {
        (FORMAT_PCM, 8) => data.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect(),
        (FORMAT_PCM, 16) => data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
        (FORMAT_PCM, 24) => data
            .chunks_exact(3)
            .map(|b| {
                let v = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
                v as f32 / 8_388_608.0
            })
            .collect(),
        (FORMAT_PCM, 32) => data
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0)
            .collect(),
        (FORMAT_FLOAT, 32) => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        (tag, bits) => {
            return Err(AudioLoadError::UnsupportedFormat(format!(
                "format tag {} with {} bits per sample",
                tag, bits
            )))
        }
    };

    // Drop a trailing partial frame
    let ch = format.channels as usize;
    samples.truncate(samples.len() / ch * ch);

    Ok(DecodedAudio {
        sample_rate: format.sample_rate,
        channels: format.channels,
        samples,
    })
}

/// Encode as 16-bit PCM WAV
pub fn encode_wav_pcm16(audio: &DecodedAudio) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let data_size = (audio.samples.len() * 2) as u32;
    let byte_rate = audio.sample_rate * audio.channels as u32 * bits_per_sample as u32 / 8;
    let block_align = audio.channels * bits_per_sample / 8;

    let mut wav = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    wav.extend_from_slice(&audio.channels.to_le_bytes());
    wav.extend_from_slice(&audio.sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for sample in &audio.samples {
        let v = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        wav.extend_from_slice(&v.to_le_bytes());
    }

    wav
}
