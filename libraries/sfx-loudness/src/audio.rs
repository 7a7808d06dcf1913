//! Decoded clip representation shared by every stage of the engine

use crate::error::{LoudnessError, Result};

/// The only PCM depth the container codec reads and writes
pub const SUPPORTED_BITS_PER_SAMPLE: u16 = 16;

/// A whole clip held as planar (per-channel) float samples
///
/// Samples are nominally in `[-1.0, 1.0]`. Every channel must have the same
/// length; [`DecodedAudio::validate`] reports clips that break this rather
/// than padding or truncating them.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// One sample vector per channel
    pub channels: Vec<Vec<f32>>,
    /// PCM depth the clip was decoded from or will be encoded to
    pub bits_per_sample: u16,
}

impl DecodedAudio {
    /// Create a 16-bit clip from planar channel data
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: SUPPORTED_BITS_PER_SAMPLE,
        }
    }

    /// Create a 16-bit mono clip
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel); 0 when there are no channels
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Check the sample rate and that all channels share one length
    ///
    /// A clip with no channels passes; callers that cannot handle that case
    /// (the encoder) check for it themselves.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(LoudnessError::InvalidSampleRate(self.sample_rate));
        }
        validate_channel_lengths(&self.channels)
    }
}

/// Reject planar data whose channels differ in length
pub(crate) fn validate_channel_lengths<T>(channels: &[Vec<T>]) -> Result<()> {
    let Some(first) = channels.first() else {
        return Ok(());
    };
    let frames = first.len();
    if let Some((index, channel)) = channels
        .iter()
        .enumerate()
        .find(|(_, channel)| channel.len() != frames)
    {
        return Err(LoudnessError::UnsupportedFormat(format!(
            "channel {} has {} samples, expected {}",
            index,
            channel.len(),
            frames
        )));
    }
    Ok(())
}
