//! K-weighting filter
//!
//! Loudness is measured on a signal passed through two cascaded biquads:
//! a high-frequency shelving pre-filter (about +4 dB above 2 kHz) followed
//! by the RLB high-pass (rolling off below about 40 Hz).
//!
//! At 48 kHz the coefficients are the published constants. At any other
//! rate they are derived from the analog prototypes with a bilinear
//! transform, so both paths stay available and the 48 kHz measurements keep
//! matching previously stored values exactly.

use crate::error::{LoudnessError, Result};
use std::f64::consts::PI;

/// Rate the precomputed coefficient tables were designed for
pub const PRECOMPUTED_SAMPLE_RATE: u32 = 48_000;

/// Sample rates closer than this to [`PRECOMPUTED_SAMPLE_RATE`] use the tables
const PRECOMPUTED_RATE_TOLERANCE_HZ: f64 = 1.0;

/// Pre-filter (high shelf) at 48 kHz
const PRE_FILTER_48K: BiquadCoefficients = BiquadCoefficients {
    b0: 1.53512485958697,
    b1: -2.69169618940638,
    b2: 1.19839281085285,
    a1: -1.69065929318241,
    a2: 0.73248077421585,
};

/// RLB high-pass at 48 kHz
const RLB_FILTER_48K: BiquadCoefficients = BiquadCoefficients {
    b0: 1.0,
    b1: -2.0,
    b2: 1.0,
    a1: -1.99004745483398,
    a2: 0.99007225036621,
};

// Analog prototype parameters
const SHELF_FREQUENCY_HZ: f64 = 1681.974450955533;
const SHELF_Q: f64 = 0.7071752369554196;
const SHELF_GAIN_DB: f64 = 3.999843853973347;
const SHELF_MID_EXPONENT: f64 = 0.4996667741545416;
const HIGH_PASS_FREQUENCY_HZ: f64 = 38.13547087602444;
const HIGH_PASS_Q: f64 = 0.5003270373238773;

/// Normalized second-order IIR section (`a0 == 1`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Transient registers for one filter pass over one channel
#[derive(Debug, Default, Clone, Copy)]
struct FilterState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadCoefficients {
    /// Run the difference equation over `input` starting from silence
    ///
    /// Each call owns fresh registers, so filtering one channel never leaks
    /// into another channel or a later call.
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let mut state = FilterState::default();
        input
            .iter()
            .map(|&x| {
                let y = self.b0 * x + self.b1 * state.x1 + self.b2 * state.x2
                    - self.a1 * state.y1
                    - self.a2 * state.y2;
                state.x2 = state.x1;
                state.x1 = x;
                state.y2 = state.y1;
                state.y1 = y;
                y
            })
            .collect()
    }
}

/// Bilinear transform of an analog biquad `(b0 s² + b1 s + b2) / (a0 s² + a1 s + a2)`
///
/// Uses `s = k (1 - z⁻¹) / (1 + z⁻¹)` with `k = 2 · sample_rate` (no
/// pre-warping) and normalizes the result by the digital `a0`.
///
/// # Errors
/// [`LoudnessError::InvalidFilterDesign`] if the normalizing term is zero
/// or not finite.
pub fn bilinear(
    analog_b: [f64; 3],
    analog_a: [f64; 3],
    sample_rate: u32,
) -> Result<BiquadCoefficients> {
    let k = 2.0 * f64::from(sample_rate);
    let k2 = k * k;
    let [b0, b1, b2] = analog_b;
    let [a0, a1, a2] = analog_a;

    let norm = a0 * k2 + a1 * k + a2;
    if norm == 0.0 || !norm.is_finite() {
        return Err(LoudnessError::InvalidFilterDesign(sample_rate));
    }

    Ok(BiquadCoefficients {
        b0: (b0 * k2 + b1 * k + b2) / norm,
        b1: (2.0 * b2 - 2.0 * b0 * k2) / norm,
        b2: (b0 * k2 - b1 * k + b2) / norm,
        a1: (2.0 * a2 - 2.0 * a0 * k2) / norm,
        a2: (a0 * k2 - a1 * k + a2) / norm,
    })
}

/// Analog high-shelf prototype of the pre-filter, as (numerator, denominator)
fn shelf_prototype() -> ([f64; 3], [f64; 3]) {
    let w0 = 2.0 * PI * SHELF_FREQUENCY_HZ;
    let vh = 10.0_f64.powf(SHELF_GAIN_DB / 20.0);
    let vb = vh.powf(SHELF_MID_EXPONENT);
    (
        [vh, vb * w0 / SHELF_Q, w0 * w0],
        [1.0, w0 / SHELF_Q, w0 * w0],
    )
}

/// Analog high-pass prototype of the RLB filter, as (numerator, denominator)
fn high_pass_prototype() -> ([f64; 3], [f64; 3]) {
    let w0 = 2.0 * PI * HIGH_PASS_FREQUENCY_HZ;
    ([1.0, 0.0, 0.0], [1.0, w0 / HIGH_PASS_Q, w0 * w0])
}

fn uses_precomputed(sample_rate: u32) -> bool {
    (f64::from(sample_rate) - f64::from(PRECOMPUTED_SAMPLE_RATE)).abs()
        < PRECOMPUTED_RATE_TOLERANCE_HZ
}

/// Coefficients of the (pre-filter, RLB high-pass) cascade for `sample_rate`
pub fn k_weighting(sample_rate: u32) -> Result<(BiquadCoefficients, BiquadCoefficients)> {
    if uses_precomputed(sample_rate) {
        return Ok((PRE_FILTER_48K, RLB_FILTER_48K));
    }

    let (shelf_b, shelf_a) = shelf_prototype();
    let (hp_b, hp_a) = high_pass_prototype();
    Ok((
        bilinear(shelf_b, shelf_a, sample_rate)?,
        bilinear(hp_b, hp_a, sample_rate)?,
    ))
}

/// Weight one channel: pre-filter first, then the high-pass
pub fn weight_channel(
    samples: &[f32],
    pre: &BiquadCoefficients,
    rlb: &BiquadCoefficients,
) -> Vec<f64> {
    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    rlb.filter(&pre.filter(&input))
}
