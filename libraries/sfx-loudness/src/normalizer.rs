//! Gain resolution and offline normalization
//!
//! The gain that brings a clip to a target loudness is capped by a peak
//! ceiling: when both cannot be met, the ceiling wins and the clip ends up
//! quieter than the target rather than louder than the ceiling.

use crate::analyzer::{measure, LoudnessStats};
use crate::audio::DecodedAudio;
use crate::error::Result;
use crate::target::NormalizationTarget;
use tracing::debug;

/// Convert a gain in dB to a linear factor
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear gain factor to dB
pub fn gain_to_db(gain: f64) -> f64 {
    20.0 * gain.log10()
}

/// Linear gain that moves `stats` toward `target_lufs` without pushing the
/// sample peak above `peak_ceiling_db`
///
/// Silent or sub-gate clips (non-finite loudness) get unity gain. A clip
/// with no peak has nothing to limit, so only the loudness target applies.
pub fn recommended_gain(stats: &LoudnessStats, target_lufs: f64, peak_ceiling_db: f64) -> f64 {
    if !stats.lufs.is_finite() {
        return 1.0;
    }

    let gain_for_target = db_to_gain(target_lufs - stats.lufs);
    if stats.peak <= 0.0 {
        return gain_for_target;
    }

    let peak_limit_gain = db_to_gain(peak_ceiling_db - stats.peak_db);
    if peak_limit_gain <= gain_for_target {
        debug!(
            gain_for_target,
            peak_limit_gain, "Peak ceiling limits normalization gain"
        );
        peak_limit_gain
    } else {
        gain_for_target
    }
}

/// Scale every sample of every channel by `gain`, leaving the input untouched
pub fn apply_gain(audio: &DecodedAudio, gain: f64) -> DecodedAudio {
    let channels = audio
        .channels
        .iter()
        .map(|ch| {
            ch.iter()
                .map(|&s| (f64::from(s) * gain) as f32)
                .collect()
        })
        .collect();

    DecodedAudio {
        sample_rate: audio.sample_rate,
        channels,
        bits_per_sample: audio.bits_per_sample,
    }
}

/// Result of normalizing one clip
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationOutcome {
    /// The scaled clip
    pub audio: DecodedAudio,
    /// Linear gain that was applied
    pub applied_gain: f64,
    /// Measurement of the input clip
    pub before: LoudnessStats,
    /// Measurement of the scaled clip
    pub after: LoudnessStats,
}

impl NormalizationOutcome {
    /// Applied gain in dB
    pub fn applied_gain_db(&self) -> f64 {
        gain_to_db(self.applied_gain)
    }
}

/// Measure, resolve the gain, scale and re-measure
///
/// A clip whose loudness cannot be measured (silence) is returned as is,
/// with unity gain and identical before/after statistics.
pub fn normalize(
    audio: &DecodedAudio,
    target_lufs: f64,
    peak_ceiling_db: f64,
) -> Result<NormalizationOutcome> {
    let before = measure(audio)?;
    if !before.lufs.is_finite() {
        debug!("Clip loudness is not finite, leaving it unchanged");
        return Ok(NormalizationOutcome {
            audio: audio.clone(),
            applied_gain: 1.0,
            before,
            after: before,
        });
    }

    let applied_gain = recommended_gain(&before, target_lufs, peak_ceiling_db);
    let scaled = apply_gain(audio, applied_gain);
    let after = measure(&scaled)?;

    debug!(
        before_lufs = before.lufs,
        after_lufs = after.lufs,
        gain_db = gain_to_db(applied_gain),
        "Normalized clip"
    );

    Ok(NormalizationOutcome {
        audio: scaled,
        applied_gain,
        before,
        after,
    })
}

/// [`normalize`] with the loudness target and ceiling taken from `target`
pub fn normalize_to(
    audio: &DecodedAudio,
    target: &NormalizationTarget,
) -> Result<NormalizationOutcome> {
    target.validate()?;
    normalize(audio, target.target_lufs, target.peak_ceiling_db)
}
