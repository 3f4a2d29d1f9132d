use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::keystream_ids;
use crate::keystream::{chaos::LogisticKeystream, xof::Blake3Keystream};

/// Injected master key. Never a compiled-in constant.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MasterKey(u64);

impl MasterKey {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Per-item seed: `master_key XOR index`.
    #[inline]
    pub const fn seed_for(&self, index: u64) -> u64 {
        self.0 ^ index
    }
}

// Keep keys out of logs.
impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum KeystreamError {
    /// The generator's state collapsed (fixed point, zero, NaN).
    #[error("keystream degenerated for seed {seed:#x} at offset {offset}")]
    Degenerate { seed: u64, offset: u64 },

    /// A call produced no bytes although more were requested.
    #[error("keystream exhausted for seed {seed:#x} at offset {offset}")]
    Exhausted { seed: u64, offset: u64 },

    /// Backing generator temporarily unable to serve; safe to retry.
    #[error("keystream generator unavailable: {0}")]
    Unavailable(String),
}

impl KeystreamError {
    /// Transient errors are retried by workers before the error policy applies.
    pub fn is_transient(&self) -> bool {
        matches!(self, KeystreamError::Unavailable(_))
    }
}

/// Deterministic byte generator keyed by a per-item seed.
///
/// `fill` writes up to `out.len()` bytes of the stream for `seed`, starting
/// at byte `offset`, and returns how many it wrote. Identical
/// `(seed, offset)` pairs must always produce identical bytes; a short
/// return is allowed and the caller continues from `offset + n`.
pub trait KeystreamGenerator: Send + Sync + fmt::Debug {
    /// Identifier recorded in container headers.
    fn id(&self) -> u16;

    fn name(&self) -> &'static str;

    fn fill(&self, seed: u64, offset: u64, out: &mut [u8]) -> Result<usize, KeystreamError>;

    /// Most bytes one `fill` call hands back, if the generator has a cap.
    /// Uncapped generators are asked for the whole remaining payload in one
    /// call, which matters for generators whose cost grows with `offset`.
    fn max_fill_len(&self) -> Option<usize> {
        None
    }
}

/// Generator selection as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeystreamKind {
    #[default]
    Blake3,
    Logistic,
}

impl KeystreamKind {
    pub fn id(&self) -> u16 {
        match self {
            KeystreamKind::Blake3 => keystream_ids::BLAKE3,
            KeystreamKind::Logistic => keystream_ids::LOGISTIC,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            keystream_ids::BLAKE3 => Some(KeystreamKind::Blake3),
            keystream_ids::LOGISTIC => Some(KeystreamKind::Logistic),
            _ => None,
        }
    }

    pub fn build(&self, block_len: usize) -> Arc<dyn KeystreamGenerator> {
        match self {
            KeystreamKind::Blake3 => Arc::new(Blake3Keystream::new(block_len)),
            KeystreamKind::Logistic => Arc::new(LogisticKeystream::new()),
        }
    }
}

impl fmt::Display for KeystreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeystreamKind::Blake3 => "blake3",
            KeystreamKind::Logistic => "logistic",
        };
        f.write_str(name)
    }
}
