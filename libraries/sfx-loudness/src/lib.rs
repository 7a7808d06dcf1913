//! Loudness measurement and normalization for sound-effect clips
//!
//! This crate provides:
//! - A 16-bit PCM WAVE codec working on in-memory buffers, plus base64 text
//!   transport for clips embedded in source or config files
//! - K-weighted, gated integrated loudness (LUFS), RMS and sample peak
//! - Gain resolution toward a target loudness under a peak ceiling
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ WAVE bytes  │ ──► │ K-weighting  │ ──► │ 400ms blocks │ ──► │ LoudnessStats │
//! └─────────────┘     └──────────────┘     └──────────────┘     └───────────────┘
//!                                                                       │
//!                                                                       ▼
//!                                                               ┌───────────────┐
//!                                                               │ Gain resolver │
//!                                                               └───────────────┘
//! ```
//!
//! Every operation is a synchronous function over whole, already-loaded
//! clips. Nothing is shared between calls, so batch callers can measure
//! clips on as many threads as they like.
//!
//! # Example
//!
//! ```
//! use sfx_loudness::{measure, normalize, DecodedAudio};
//!
//! # fn example() -> sfx_loudness::Result<()> {
//! let samples: Vec<f32> = (0..48000)
//!     .map(|i| 0.1 * (i as f32 * 2.0 * std::f32::consts::PI * 440.0 / 48000.0).sin())
//!     .collect();
//! let clip = DecodedAudio::mono(48000, samples);
//!
//! let stats = measure(&clip)?;
//! println!("{}", stats);
//!
//! let outcome = normalize(&clip, -16.0, -1.0)?;
//! println!("Applied {:.2} dB", outcome.applied_gain_db());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![deny(unsafe_code)]

mod analyzer;
mod audio;
mod blocks;
mod error;
mod normalizer;
mod target;
pub mod wav;
pub mod weighting;

pub use analyzer::{
    gated_loudness, linear_to_db, mean_square_to_lufs, measure, measure_bytes, measure_channels,
    LoudnessStats, ABSOLUTE_GATE_LUFS, RELATIVE_GATE_LU,
};
pub use audio::{DecodedAudio, SUPPORTED_BITS_PER_SAMPLE};
pub use blocks::{block_energies, block_geometry, BlockEnergies, BLOCK_SECONDS, STEP_SECONDS};
pub use error::{LoudnessError, Result};
pub use normalizer::{
    apply_gain, db_to_gain, gain_to_db, normalize, normalize_to, recommended_gain,
    NormalizationOutcome,
};
pub use target::NormalizationTarget;
pub use wav::{decode, decode_portable_text, encode, encode_to_portable_text};

/// Default target loudness of the sound-effect pipeline (-16 LUFS)
pub const DEFAULT_TARGET_LUFS: f64 = -16.0;

/// Default accepted deviation from the target loudness, in dB either way
pub const DEFAULT_TOLERANCE_DB: f64 = 1.5;

/// Default sample-peak ceiling after normalization (-1 dBFS)
pub const DEFAULT_PEAK_CEILING_DB: f64 = -1.0;
