//! Caller-side normalization settings
//!
//! The engine functions take plain numbers; this type bundles them so a
//! content pipeline can keep them in its config files.
//!
//! ```
//! use sfx_loudness::NormalizationTarget;
//!
//! let target = NormalizationTarget::default();
//! assert_eq!(target.target_lufs, -16.0);
//! assert_eq!(target.tolerance_db, 1.5);
//! assert_eq!(target.peak_ceiling_db, -1.0);
//! ```

use crate::analyzer::LoudnessStats;
use crate::error::{LoudnessError, Result};
use crate::normalizer::recommended_gain;
use crate::{DEFAULT_PEAK_CEILING_DB, DEFAULT_TARGET_LUFS, DEFAULT_TOLERANCE_DB};
use serde::{Deserialize, Serialize};

/// Target loudness, accepted deviation and peak ceiling for a set of clips
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationTarget {
    /// Integrated loudness to normalize to, in LUFS
    pub target_lufs: f64,
    /// Accepted distance from the target, in dB either way
    pub tolerance_db: f64,
    /// Highest allowed sample peak after gain, in dBFS
    pub peak_ceiling_db: f64,
}

impl Default for NormalizationTarget {
    fn default() -> Self {
        Self {
            target_lufs: DEFAULT_TARGET_LUFS,
            tolerance_db: DEFAULT_TOLERANCE_DB,
            peak_ceiling_db: DEFAULT_PEAK_CEILING_DB,
        }
    }
}

impl NormalizationTarget {
    pub fn new(target_lufs: f64, tolerance_db: f64, peak_ceiling_db: f64) -> Self {
        Self {
            target_lufs,
            tolerance_db,
            peak_ceiling_db,
        }
    }

    /// Reject non-finite values and a negative tolerance
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("target_lufs", self.target_lufs),
            ("tolerance_db", self.tolerance_db),
            ("peak_ceiling_db", self.peak_ceiling_db),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(LoudnessError::InvalidTarget(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }
        if self.tolerance_db < 0.0 {
            return Err(LoudnessError::InvalidTarget(format!(
                "tolerance_db must not be negative, got {}",
                self.tolerance_db
            )));
        }
        Ok(())
    }

    /// Whether the measured loudness lies within the tolerance window
    ///
    /// Silent clips are never within tolerance.
    pub fn is_within_tolerance(&self, stats: &LoudnessStats) -> bool {
        stats.lufs.is_finite() && (stats.lufs - self.target_lufs).abs() <= self.tolerance_db
    }

    /// Distance between the ceiling and the measured peak, in dB
    ///
    /// Positive values mean the clip has room to get louder.
    pub fn peak_headroom_db(&self, stats: &LoudnessStats) -> f64 {
        self.peak_ceiling_db - stats.peak_db
    }

    /// [`recommended_gain`] for this target
    pub fn recommended_gain(&self, stats: &LoudnessStats) -> f64 {
        recommended_gain(stats, self.target_lufs, self.peak_ceiling_db)
    }
}
