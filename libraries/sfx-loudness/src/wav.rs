//! 16-bit PCM RIFF/WAVE codec
//!
//! Decodes a WAVE container held in memory into planar float samples and
//! encodes planar samples back. Only linear PCM (format tag 1) at 16 bits per
//! sample is accepted.
//!
//! # Sample scaling
//!
//! Decoding divides by 32768 and encoding multiplies by 32767 after clamping
//! to `[-1.0, 1.0]`. The two factors differ on purpose: `i16::MIN` decodes to
//! exactly `-1.0`, while a full-scale float never encodes past `i16::MAX`.
//! A decode/encode cycle therefore shifts a sample by at most 1.5 LSB.
//!
//! # Layout
//!
//! ```text
//! 0   "RIFF"  u32 riff size  "WAVE"
//! 12  chunk*  ( tag[4]  u32 length  body[length]  pad to even )
//! ```

use crate::audio::{validate_channel_lengths, DecodedAudio, SUPPORTED_BITS_PER_SAMPLE};
use crate::error::{LoudnessError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, trace};

const RIFF_TAG: &[u8; 4] = b"RIFF";
const WAVE_TAG: &[u8; 4] = b"WAVE";
const FMT_TAG: &[u8; 4] = b"fmt ";
const DATA_TAG: &[u8; 4] = b"data";

/// Smallest buffer that can hold a canonical header (RIFF + fmt + data headers)
pub const MIN_CONTAINER_LEN: usize = 44;

/// Offset of the first chunk after the RIFF/WAVE preamble
const FIRST_CHUNK_OFFSET: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const FMT_BODY_LEN: usize = 16;

/// Linear PCM format tag
const FORMAT_PCM: u16 = 1;

const DECODE_SCALE: f32 = 32768.0;
const ENCODE_SCALE: f64 = 32767.0;

/// Contents of the `fmt ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatChunk {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

impl FormatChunk {
    fn parse(body: &[u8]) -> Self {
        Self {
            format_tag: u16_at(body, 0),
            channels: u16_at(body, 2),
            sample_rate: u32_at(body, 4),
            byte_rate: u32_at(body, 8),
            block_align: u16_at(body, 12),
            bits_per_sample: u16_at(body, 14),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(FMT_TAG);
        out.extend_from_slice(&(FMT_BODY_LEN as u32).to_le_bytes());
        out.extend_from_slice(&self.format_tag.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.byte_rate.to_le_bytes());
        out.extend_from_slice(&self.block_align.to_le_bytes());
        out.extend_from_slice(&self.bits_per_sample.to_le_bytes());
    }
}

/// Location of the `data` chunk body inside the buffer
#[derive(Debug, Clone, Copy)]
struct DataChunk {
    offset: usize,
    len: usize,
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn i16_at(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Walk the chunk list and pick out the `fmt ` and `data` chunks
fn scan_chunks(bytes: &[u8]) -> Result<(Option<FormatChunk>, Option<DataChunk>)> {
    let mut format = None;
    let mut data = None;
    let mut offset = FIRST_CHUNK_OFFSET;

    while offset + CHUNK_HEADER_LEN <= bytes.len() && (format.is_none() || data.is_none()) {
        let tag = &bytes[offset..offset + 4];
        let len = u32_at(bytes, offset + 4) as usize;
        let body = offset + CHUNK_HEADER_LEN;
        let end = body.saturating_add(len);

        trace!(
            tag = %String::from_utf8_lossy(tag),
            offset,
            len,
            "Scanning WAVE chunk"
        );

        if end > bytes.len() {
            return Err(LoudnessError::TruncatedInput {
                needed: end,
                actual: bytes.len(),
            });
        }

        if tag == FMT_TAG {
            if len < FMT_BODY_LEN {
                return Err(LoudnessError::MalformedContainer(format!(
                    "fmt chunk is {} bytes, expected at least {}",
                    len, FMT_BODY_LEN
                )));
            }
            format = Some(FormatChunk::parse(&bytes[body..end]));
        } else if tag == DATA_TAG {
            data = Some(DataChunk { offset: body, len });
        }

        // Chunk bodies are padded to an even length
        offset = end.saturating_add(len & 1);
    }

    Ok((format, data))
}

/// Decode a 16-bit PCM WAVE buffer into planar float samples
///
/// # Errors
/// - [`LoudnessError::TruncatedInput`] for buffers under 44 bytes or chunks
///   running past the end of the buffer
/// - [`LoudnessError::MalformedContainer`] for wrong RIFF/WAVE tags
/// - [`LoudnessError::MissingChunk`] when `fmt ` or `data` is absent
/// - [`LoudnessError::UnsupportedFormat`] for non-PCM or non-16-bit data
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio> {
    if bytes.len() < MIN_CONTAINER_LEN {
        return Err(LoudnessError::TruncatedInput {
            needed: MIN_CONTAINER_LEN,
            actual: bytes.len(),
        });
    }
    if &bytes[0..4] != RIFF_TAG {
        return Err(LoudnessError::MalformedContainer(
            "missing RIFF tag".to_string(),
        ));
    }
    if &bytes[8..12] != WAVE_TAG {
        return Err(LoudnessError::MalformedContainer(
            "missing WAVE tag".to_string(),
        ));
    }

    let (format, data) = scan_chunks(bytes)?;
    let format = format.ok_or(LoudnessError::MissingChunk("fmt "))?;
    let data = data.ok_or(LoudnessError::MissingChunk("data"))?;

    if format.format_tag != FORMAT_PCM {
        return Err(LoudnessError::UnsupportedFormat(format!(
            "format tag {} (only PCM = 1 is supported)",
            format.format_tag
        )));
    }
    if format.bits_per_sample != SUPPORTED_BITS_PER_SAMPLE {
        return Err(LoudnessError::UnsupportedFormat(format!(
            "{} bits per sample (only 16 is supported)",
            format.bits_per_sample
        )));
    }
    if format.channels == 0 {
        return Err(LoudnessError::ZeroChannelAudio);
    }
    if format.sample_rate == 0 {
        return Err(LoudnessError::InvalidSampleRate(format.sample_rate));
    }

    let channel_count = usize::from(format.channels);
    let block_align = usize::from(format.block_align);
    if block_align < channel_count * 2 {
        return Err(LoudnessError::MalformedContainer(format!(
            "block align {} is too small for {} channels",
            block_align, channel_count
        )));
    }

    let frames = data.len / block_align;
    let body = &bytes[data.offset..data.offset + data.len];
    let mut channels: Vec<Vec<f32>> = (0..channel_count)
        .map(|_| Vec::with_capacity(frames))
        .collect();

    for frame in 0..frames {
        let frame_offset = frame * block_align;
        for (ch, samples) in channels.iter_mut().enumerate() {
            samples.push(f32::from(i16_at(body, frame_offset + ch * 2)) / DECODE_SCALE);
        }
    }

    debug!(
        sample_rate = format.sample_rate,
        channels = channel_count,
        frames,
        "Decoded PCM clip"
    );

    Ok(DecodedAudio {
        sample_rate: format.sample_rate,
        channels,
        bits_per_sample: format.bits_per_sample,
    })
}

/// Convert a float sample to 16-bit PCM
fn quantize(sample: f32) -> i16 {
    (f64::from(sample.clamp(-1.0, 1.0)) * ENCODE_SCALE).round() as i16
}

/// Encode a clip as a 16-bit PCM WAVE buffer
///
/// # Errors
/// - [`LoudnessError::UnsupportedFormat`] if the clip is not 16-bit or its
///   channels differ in length
/// - [`LoudnessError::ZeroChannelAudio`] if the clip has no channels
/// - [`LoudnessError::InvalidSampleRate`] for a zero sample rate
pub fn encode(audio: &DecodedAudio) -> Result<Vec<u8>> {
    if audio.bits_per_sample != SUPPORTED_BITS_PER_SAMPLE {
        return Err(LoudnessError::UnsupportedFormat(format!(
            "cannot encode {} bits per sample (only 16 is supported)",
            audio.bits_per_sample
        )));
    }
    if audio.channels.is_empty() {
        return Err(LoudnessError::ZeroChannelAudio);
    }
    validate_channel_lengths(&audio.channels)?;
    if audio.sample_rate == 0 {
        return Err(LoudnessError::InvalidSampleRate(audio.sample_rate));
    }

    let too_large =
        || LoudnessError::UnsupportedFormat("clip too large for a WAVE container".to_string());

    let channel_count = u16::try_from(audio.channels.len()).map_err(|_| too_large())?;
    let block_align = channel_count.checked_mul(2).ok_or_else(too_large)?;
    let frames = audio.frames();
    let data_len = frames
        .checked_mul(usize::from(block_align))
        .and_then(|len| u32::try_from(len).ok())
        .ok_or_else(too_large)?;
    let riff_len = data_len.checked_add(36).ok_or_else(too_large)?;
    let byte_rate = audio
        .sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or_else(too_large)?;

    let format = FormatChunk {
        format_tag: FORMAT_PCM,
        channels: channel_count,
        sample_rate: audio.sample_rate,
        byte_rate,
        block_align,
        bits_per_sample: SUPPORTED_BITS_PER_SAMPLE,
    };

    let mut out = Vec::with_capacity(MIN_CONTAINER_LEN + data_len as usize);
    out.extend_from_slice(RIFF_TAG);
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(WAVE_TAG);
    format.write(&mut out);
    out.extend_from_slice(DATA_TAG);
    out.extend_from_slice(&data_len.to_le_bytes());

    for frame in 0..frames {
        for channel in &audio.channels {
            out.extend_from_slice(&quantize(channel[frame]).to_le_bytes());
        }
    }

    Ok(out)
}

/// Encode a clip as base64 text for embedding in source or config files
pub fn encode_to_portable_text(audio: &DecodedAudio) -> Result<String> {
    Ok(STANDARD.encode(encode(audio)?))
}

/// Decode a clip from the base64 text produced by [`encode_to_portable_text`]
pub fn decode_portable_text(text: &str) -> Result<DecodedAudio> {
    let bytes = STANDARD.decode(text.trim())?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a WAVE buffer by hand, with optional chunks placed before `data`
    fn build_wav(
        format_tag: u16,
        channels: u16,
        sample_rate: u32,
        bits: u16,
        extra_chunks: &[(&[u8; 4], &[u8])],
        data: Option<&[u8]>,
    ) -> Vec<u8> {
        let block_align = channels * (bits / 8);
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(b"WAVE");
        FormatChunk {
            format_tag,
            channels,
            sample_rate,
            byte_rate: sample_rate * u32::from(block_align),
            block_align,
            bits_per_sample: bits,
        }
        .write(&mut out);
        for (tag, body) in extra_chunks {
            out.extend_from_slice(*tag);
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(body);
            if body.len() % 2 == 1 {
                out.push(0);
            }
        }
        if let Some(data) = data {
            out.extend_from_slice(b"data");
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
        // Keep every buffer above the minimum header size
        while out.len() < MIN_CONTAINER_LEN {
            out.extend_from_slice(b"pad ");
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        let riff_len = (out.len() - 8) as u32;
        out[4..8].copy_from_slice(&riff_len.to_le_bytes());
        out
    }

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_truncated_input() {
        let err = decode(&[0u8; 43]).unwrap_err();
        assert!(matches!(
            err,
            LoudnessError::TruncatedInput {
                needed: 44,
                actual: 43
            }
        ));
    }

    #[test]
    fn test_bad_tags() {
        let mut bytes = build_wav(1, 1, 48000, 16, &[], Some(&pcm(&[0; 8])));
        bytes[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::MalformedContainer(_))
        ));

        let mut bytes = build_wav(1, 1, 48000, 16, &[], Some(&pcm(&[0; 8])));
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::MalformedContainer(_))
        ));
    }

    #[test]
    fn test_missing_data_chunk() {
        let bytes = build_wav(1, 1, 48000, 16, &[(b"LIST", &[0u8; 20][..])], None);
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::MissingChunk("data"))
        ));
    }

    #[test]
    fn test_missing_fmt_chunk() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&36u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&24u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 24]);
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::MissingChunk("fmt "))
        ));
    }

    #[test]
    fn test_unsupported_format_tag() {
        // IEEE float
        let bytes = build_wav(3, 1, 48000, 16, &[], Some(&pcm(&[0; 8])));
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let bytes = build_wav(1, 1, 48000, 24, &[], Some(&[0u8; 24]));
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_zero_channels_in_header() {
        let bytes = build_wav(1, 0, 48000, 16, &[], Some(&pcm(&[0; 8])));
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::ZeroChannelAudio)
        ));
    }

    #[test]
    fn test_short_fmt_chunk() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&14u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 0, 1, 0, 0x80, 0xbb, 0, 0, 0, 0x77, 1, 0, 2, 0]);
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&24u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 24]);
        let riff_len = (bytes.len() - 8) as u32;
        bytes[4..8].copy_from_slice(&riff_len.to_le_bytes());

        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::MalformedContainer(_))
        ));
    }

    #[test]
    fn test_zero_sample_rate_in_header() {
        let bytes = build_wav(1, 1, 0, 16, &[], Some(&pcm(&[0; 8])));
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_block_align_too_small() {
        let mut bytes = build_wav(1, 2, 48000, 16, &[], Some(&pcm(&[0; 8])));
        // block_align sits 12 bytes into the fmt body, which starts at 20
        assert_eq!(u16_at(&bytes, 32), 4);
        bytes[32..34].copy_from_slice(&2u16.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::MalformedContainer(_))
        ));
    }

    #[test]
    fn test_wide_block_align_skips_padding() {
        // 1 channel with 4-byte frames: only the first sample of each frame is read
        let mut bytes = build_wav(1, 1, 48000, 16, &[], Some(&pcm(&[100, 7, 200, 7, 300, 7])));
        bytes[32..34].copy_from_slice(&4u16.to_le_bytes());
        let audio = decode(&bytes).unwrap();
        assert_eq!(
            audio.channels,
            vec![vec![100.0 / 32768.0, 200.0 / 32768.0, 300.0 / 32768.0]]
        );
    }

    #[test]
    fn test_data_chunk_past_end() {
        let mut bytes = build_wav(1, 1, 48000, 16, &[], Some(&pcm(&[0; 8])));
        let len_offset = bytes.len() - 16 - 4;
        bytes[len_offset..len_offset + 4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(LoudnessError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_odd_chunk_is_padded() {
        let data = pcm(&[16384, -16384, 0, 32767]);
        let bytes = build_wav(1, 1, 22050, 16, &[(b"note", &b"abc"[..])], Some(&data));
        let audio = decode(&bytes).unwrap();
        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.channels, vec![vec![0.5, -0.5, 0.0, 32767.0 / 32768.0]]);
    }

    #[test]
    fn test_stereo_deinterleave() {
        let data = pcm(&[100, -100, 200, -200, 300, -300]);
        let bytes = build_wav(1, 2, 44100, 16, &[], Some(&data));
        let audio = decode(&bytes).unwrap();
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.frames(), 3);
        assert_eq!(audio.channels[0][2], 300.0 / 32768.0);
        assert_eq!(audio.channels[1][2], -300.0 / 32768.0);
    }

    #[test]
    fn test_decode_divides_by_32768() {
        let data = pcm(&[i16::MIN, i16::MAX]);
        let bytes = build_wav(1, 1, 48000, 16, &[], Some(&data));
        let audio = decode(&bytes).unwrap();
        assert_eq!(audio.channels[0][0], -1.0);
        assert_eq!(audio.channels[0][1], 32767.0 / 32768.0);
    }

    #[test]
    fn test_encode_multiplies_by_32767() {
        let audio = DecodedAudio::mono(48000, vec![1.0, -1.0, 0.5, 2.0, -3.0]);
        let bytes = encode(&audio).unwrap();
        let body = &bytes[44..];
        let samples: Vec<i16> = body
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        // Full scale never reaches i16::MIN, out-of-range input is clamped
        assert_eq!(samples, vec![32767, -32767, 16384, 32767, -32767]);
    }

    #[test]
    fn test_encode_header_layout() {
        let audio = DecodedAudio::new(44100, vec![vec![0.0; 10], vec![0.0; 10]]);
        let bytes = encode(&audio).unwrap();
        assert_eq!(bytes.len(), 44 + 40);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + 40);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), 2);
        assert_eq!(u32_at(&bytes, 24), 44100);
        assert_eq!(u32_at(&bytes, 28), 44100 * 4);
        assert_eq!(u16_at(&bytes, 32), 4);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 40);
    }

    #[test]
    fn test_encode_rejections() {
        let empty = DecodedAudio::new(48000, Vec::new());
        assert!(matches!(encode(&empty), Err(LoudnessError::ZeroChannelAudio)));

        let ragged = DecodedAudio::new(48000, vec![vec![0.0; 4], vec![0.0; 3]]);
        assert!(matches!(
            encode(&ragged),
            Err(LoudnessError::UnsupportedFormat(_))
        ));

        let mut wide = DecodedAudio::mono(48000, vec![0.0; 4]);
        wide.bits_per_sample = 24;
        assert!(matches!(
            encode(&wide),
            Err(LoudnessError::UnsupportedFormat(_))
        ));

        let rateless = DecodedAudio::mono(0, vec![0.0; 4]);
        assert!(matches!(
            encode(&rateless),
            Err(LoudnessError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_portable_text() {
        let audio = DecodedAudio::mono(8000, vec![0.25, -0.25, 0.0]);
        let text = encode_to_portable_text(&audio).unwrap();
        assert!(text.starts_with("UklGR")); // "RIFF"
        let decoded = decode_portable_text(&text).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.frames(), 3);
        assert!((decoded.channels[0][0] - 0.25).abs() < 1e-4);

        assert!(matches!(
            decode_portable_text("not base64 !!"),
            Err(LoudnessError::InvalidPortableText(_))
        ));
    }
}
