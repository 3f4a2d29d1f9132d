//! Per-item keystream generation and XOR application.
//!
//! Responsibilities:
//! - Derive per-item seeds from the injected master key
//! - Produce deterministic keystream windows
//! - XOR keystream into payloads in place
//!
//! Non-responsibilities:
//! - Threading
//! - Ordering
//! - Confidentiality guarantees (the transform is reversible obfuscation)

pub mod types;
pub mod xof;
pub mod chaos;
pub mod xor;

pub use types::{
    KeystreamError,
    KeystreamGenerator,
    KeystreamKind,
    MasterKey,
};

pub use xof::Blake3Keystream;
pub use chaos::LogisticKeystream;
pub use xor::{apply_keystream, keystream_bytes, xor_keystream_resume, xor_keystream_with};
