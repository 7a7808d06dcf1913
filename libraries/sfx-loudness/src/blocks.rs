//! Overlapping block energies of a weighted signal

use crate::audio::validate_channel_lengths;
use crate::error::Result;

/// Gating block length in seconds
pub const BLOCK_SECONDS: f64 = 0.4;

/// Hop between consecutive gating blocks in seconds (75% overlap)
pub const STEP_SECONDS: f64 = 0.1;

/// Mean-square energy of a weighted clip
#[derive(Debug, Clone, PartialEq)]
pub enum BlockEnergies {
    /// One mean square per full 400 ms block; these go through the gates
    Gated(Vec<f64>),
    /// The clip is shorter than one block: mean square of the whole signal,
    /// reported without gating
    WholeSignal(f64),
}

/// Block length and hop in samples for `sample_rate`, each at least 1
pub fn block_geometry(sample_rate: u32) -> (usize, usize) {
    let rate = f64::from(sample_rate);
    let block_len = ((rate * BLOCK_SECONDS).round() as usize).max(1);
    let step = ((rate * STEP_SECONDS).round() as usize).max(1);
    (block_len, step)
}

fn sum_of_squares(samples: &[f64]) -> f64 {
    samples.iter().map(|s| s * s).sum()
}

/// Slice weighted channels into overlapping blocks and compute mean squares
///
/// Each block's energy is averaged over every channel and every sample in
/// the block.
///
/// # Errors
/// [`LoudnessError::UnsupportedFormat`](crate::LoudnessError::UnsupportedFormat)
/// if the channels differ in length.
pub fn block_energies(weighted: &[Vec<f64>], sample_rate: u32) -> Result<BlockEnergies> {
    validate_channel_lengths(weighted)?;

    let channel_count = weighted.len();
    let total_len = weighted.first().map_or(0, Vec::len);
    let (block_len, step) = block_geometry(sample_rate);

    if channel_count == 0 || total_len < block_len {
        let samples = total_len * channel_count;
        if samples == 0 {
            return Ok(BlockEnergies::WholeSignal(0.0));
        }
        let sum: f64 = weighted.iter().map(|ch| sum_of_squares(ch)).sum();
        return Ok(BlockEnergies::WholeSignal(sum / samples as f64));
    }

    let denominator = (block_len * channel_count) as f64;
    let energies = (0..=total_len - block_len)
        .step_by(step)
        .map(|start| {
            let sum: f64 = weighted
                .iter()
                .map(|ch| sum_of_squares(&ch[start..start + block_len]))
                .sum();
            sum / denominator
        })
        .collect();

    Ok(BlockEnergies::Gated(energies))
}
