//! Gated integrated loudness measurement
//!
//! Measures a whole clip in one call:
//! - Integrated loudness (LUFS) - K-weighted, gated mean energy
//! - RMS - plain root-mean-square of the raw samples
//! - Sample peak - the largest absolute raw sample, linear and in dBFS
//!
//! # Gating
//!
//! ```text
//! block mean squares ──► absolute gate (-70 LUFS) ──► relative gate (-10 LU) ──► LUFS
//!                              │ nothing left                 │ nothing left
//!                              ▼                              ▼
//!                            -inf                    keep absolute set
//! ```
//!
//! Clips shorter than one 400 ms block skip the gates entirely and report
//! the loudness of their whole-signal mean square.

use crate::audio::{validate_channel_lengths, DecodedAudio};
use crate::blocks::{block_energies, BlockEnergies};
use crate::error::{LoudnessError, Result};
use crate::wav;
use crate::weighting::{k_weighting, weight_channel};
use std::fmt;
use tracing::debug;

/// Blocks quieter than this never contribute to integrated loudness
pub const ABSOLUTE_GATE_LUFS: f64 = -70.0;

/// Relative gate offset below the absolute-gated loudness, in LU
pub const RELATIVE_GATE_LU: f64 = 10.0;

/// Offset in the mean-square to LUFS conversion
const LUFS_OFFSET: f64 = -0.691;

/// Loudness characteristics of one clip
///
/// A fresh value is produced by every measurement; re-measuring a processed
/// clip yields a new, independent value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessStats {
    /// Root-mean-square of all raw samples across all channels (linear)
    pub rms: f64,

    /// Gated integrated loudness in LUFS
    /// Negative infinity for silence or a signal entirely below the absolute gate
    pub lufs: f64,

    /// Largest absolute raw sample value (linear, 0 for silence)
    pub peak: f64,

    /// `20·log10(peak)`, negative infinity when `peak` is 0
    pub peak_db: f64,
}

impl LoudnessStats {
    /// Statistics of a clip with no signal at all
    pub const SILENT: Self = Self {
        rms: 0.0,
        lufs: f64::NEG_INFINITY,
        peak: 0.0,
        peak_db: f64::NEG_INFINITY,
    };

    /// True when no finite loudness could be measured
    pub fn is_silent(&self) -> bool {
        !self.lufs.is_finite()
    }
}

impl Default for LoudnessStats {
    fn default() -> Self {
        Self::SILENT
    }
}

impl fmt::Display for LoudnessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loudness: {:.1} LUFS, Peak: {:.1} dBFS, RMS: {:.4}",
            self.lufs, self.peak_db, self.rms
        )
    }
}

/// Convert a mean-square energy to LUFS
///
/// Non-positive energies map to negative infinity.
pub fn mean_square_to_lufs(mean_square: f64) -> f64 {
    if mean_square <= 0.0 {
        return f64::NEG_INFINITY;
    }
    LUFS_OFFSET + 10.0 * mean_square.log10()
}

/// Convert a linear amplitude to dBFS, negative infinity for 0
pub fn linear_to_db(linear: f64) -> f64 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f64::NEG_INFINITY
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Blocks at or above the absolute gate
fn absolute_gate(blocks: &[f64]) -> Vec<f64> {
    blocks
        .iter()
        .copied()
        .filter(|&ms| mean_square_to_lufs(ms) >= ABSOLUTE_GATE_LUFS)
        .collect()
}

/// Blocks of the absolute-gated set that also pass the relative gate
fn relative_gate(absolute: &[f64]) -> Vec<f64> {
    let initial_lufs = mean_square_to_lufs(mean(absolute));
    let threshold = initial_lufs - RELATIVE_GATE_LU;
    absolute
        .iter()
        .copied()
        .filter(|&ms| {
            let lufs = mean_square_to_lufs(ms);
            lufs >= ABSOLUTE_GATE_LUFS && lufs >= threshold
        })
        .collect()
}

/// Integrated loudness of a set of block mean squares
///
/// Returns the loudness together with the number of blocks that survived
/// gating.
pub fn gated_loudness(blocks: &[f64]) -> (f64, usize) {
    let absolute = absolute_gate(blocks);
    if absolute.is_empty() {
        return (f64::NEG_INFINITY, 0);
    }

    let relative = relative_gate(&absolute);
    // An empty relative set falls back to the absolute set
    let gated = if relative.is_empty() { absolute } else { relative };

    (mean_square_to_lufs(mean(&gated)), gated.len())
}

/// RMS and peak of the raw samples
fn raw_levels(channels: &[Vec<f32>]) -> (f64, f64) {
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    let mut peak = 0.0_f64;
    for &sample in channels.iter().flatten() {
        let s = f64::from(sample);
        sum += s * s;
        peak = peak.max(s.abs());
        count += 1;
    }
    let rms = if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    };
    (rms, peak)
}

/// Measure planar channel data, e.g. straight from a sound generator
///
/// # Errors
/// - [`LoudnessError::InvalidSampleRate`] for a zero sample rate
/// - [`LoudnessError::UnsupportedFormat`] if channels differ in length
/// - [`LoudnessError::InvalidFilterDesign`] if the weighting filter cannot
///   be derived for the sample rate
pub fn measure_channels(sample_rate: u32, channels: &[Vec<f32>]) -> Result<LoudnessStats> {
    if channels.is_empty() {
        return Ok(LoudnessStats::SILENT);
    }
    if sample_rate == 0 {
        return Err(LoudnessError::InvalidSampleRate(sample_rate));
    }
    validate_channel_lengths(channels)?;

    let (pre, rlb) = k_weighting(sample_rate)?;
    let weighted: Vec<Vec<f64>> = channels
        .iter()
        .map(|ch| weight_channel(ch, &pre, &rlb))
        .collect();

    let (lufs, block_count, gated_count) = match block_energies(&weighted, sample_rate)? {
        BlockEnergies::Gated(blocks) => {
            let (lufs, gated) = gated_loudness(&blocks);
            (lufs, blocks.len(), gated)
        }
        BlockEnergies::WholeSignal(mean_square) => (mean_square_to_lufs(mean_square), 0, 0),
    };

    let (rms, peak) = raw_levels(channels);
    let stats = LoudnessStats {
        rms,
        lufs,
        peak,
        peak_db: linear_to_db(peak),
    };

    debug!(
        sample_rate,
        channels = channels.len(),
        block_count,
        gated_count,
        lufs = stats.lufs,
        peak_db = stats.peak_db,
        "Measured clip loudness"
    );

    Ok(stats)
}

/// Measure a decoded clip
pub fn measure(audio: &DecodedAudio) -> Result<LoudnessStats> {
    measure_channels(audio.sample_rate, &audio.channels)
}

/// Decode a WAVE buffer and measure it
pub fn measure_bytes(bytes: &[u8]) -> Result<LoudnessStats> {
    measure(&wav::decode(bytes)?)
}
