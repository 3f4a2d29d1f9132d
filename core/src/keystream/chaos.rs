//! keystream/chaos.rs
//! Logistic-map keystream, x(n+1) = r * x(n) * (1 - x(n)).
//!
//! The initial condition is derived from the seed through splitmix64, the
//! map is iterated past a burn-in, and each later iterate contributes one
//! byte taken from the low bits of the scaled state.
//!
//! A window at `offset` replays every earlier iterate, so callers should ask
//! for a whole payload at once; the generator reports no per-call cap.

use crate::constants::keystream_ids;
use crate::keystream::types::{KeystreamError, KeystreamGenerator};

/// Control parameter in the fully chaotic regime, clear of r = 4.
const R: f64 = 3.999_9;
const BURN_IN: usize = 64;
const SCALE: f64 = 1.0e6;

#[derive(Debug, Clone, Default)]
pub struct LogisticKeystream;

impl LogisticKeystream {
    pub fn new() -> Self {
        Self
    }

    /// Initial condition in (0.1, 0.9).
    fn initial_state(seed: u64) -> f64 {
        let mixed = splitmix64(seed);
        let unit = (mixed >> 11) as f64 / (1u64 << 53) as f64;
        0.1 + 0.8 * unit
    }

    #[inline]
    fn step(x: f64) -> f64 {
        R * x * (1.0 - x)
    }

    #[inline]
    fn is_degenerate(x: f64) -> bool {
        !x.is_finite() || x <= 0.0 || x >= 1.0
    }
}

impl KeystreamGenerator for LogisticKeystream {
    fn id(&self) -> u16 {
        keystream_ids::LOGISTIC
    }

    fn name(&self) -> &'static str {
        "logistic"
    }

    fn fill(&self, seed: u64, offset: u64, out: &mut [u8]) -> Result<usize, KeystreamError> {
        let mut x = Self::initial_state(seed);
        for _ in 0..BURN_IN {
            x = Self::step(x);
        }

        // Windows are reproducible by replaying the prefix.
        for skipped in 0..offset {
            x = Self::step(x);
            if Self::is_degenerate(x) {
                return Err(KeystreamError::Degenerate { seed, offset: skipped });
            }
        }

        for (i, byte) in out.iter_mut().enumerate() {
            x = Self::step(x);
            if Self::is_degenerate(x) {
                return Err(KeystreamError::Degenerate { seed, offset: offset + i as u64 });
            }
            *byte = ((x * SCALE) as u64 & 0xFF) as u8;
        }

        Ok(out.len())
    }
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
