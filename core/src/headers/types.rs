//! headers/types.rs
//! Frame container header.
//!
//! Layout (32 bytes, little-endian):
//! - 0..4   magic "FCP1"
//! - 4..6   version
//! - 6..8   flags (TRANSFORMED, COUNT_FINAL)
//! - 8..12  item_len, bytes per frame record
//! - 12..20 item_count, valid only with COUNT_FINAL
//! - 20..22 keystream id (0 when the payloads are untransformed)
//! - 22..28 reserved, always zero
//! - 28..32 CRC32 over bytes 0..28

use thiserror::Error;

use crate::constants::{flags, keystream_ids, CONTAINER_V1, MAGIC_FCP1};
use crate::keystream::KeystreamKind;

/// Fixed header size in bytes.
pub const HEADER_LEN_V1: usize = 32;

/// Bytes covered by the trailing checksum.
pub const HEADER_CRC_SPAN: usize = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub flags: u16,
    pub item_len: u32,
    pub item_count: u64,
    pub keystream_id: u16,
    pub reserved: [u8; 6],
}

impl ContainerHeader {
    pub const LEN: usize = HEADER_LEN_V1;

    /// Header for a stream whose final count is not known yet.
    pub fn new(item_len: u32, transformed: bool, keystream_id: u16) -> Self {
        let mut h = Self {
            magic: MAGIC_FCP1,
            version: CONTAINER_V1,
            flags: 0,
            item_len,
            item_count: 0,
            keystream_id: if transformed { keystream_id } else { keystream_ids::NONE },
            reserved: [0u8; 6],
        };
        if transformed {
            h.flags |= flags::TRANSFORMED;
        }
        h
    }

    pub fn is_transformed(&self) -> bool {
        self.flags & flags::TRANSFORMED != 0
    }

    pub fn has_final_count(&self) -> bool {
        self.flags & flags::COUNT_FINAL != 0
    }

    /// Record the number of frames actually written.
    pub fn finalize_count(&mut self, item_count: u64) {
        self.item_count = item_count;
        self.flags |= flags::COUNT_FINAL;
    }

    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.magic != MAGIC_FCP1 {
            return Err(HeaderError::InvalidMagic { have: self.magic });
        }
        if self.version != CONTAINER_V1 {
            return Err(HeaderError::UnsupportedVersion { have: self.version });
        }
        let known = flags::TRANSFORMED | flags::COUNT_FINAL;
        if self.flags & !known != 0 {
            return Err(HeaderError::UnknownFlags { raw: self.flags });
        }
        if self.is_transformed() {
            if KeystreamKind::from_id(self.keystream_id).is_none() {
                return Err(HeaderError::UnknownKeystream { raw: self.keystream_id });
            }
        } else if self.keystream_id != keystream_ids::NONE {
            return Err(HeaderError::UnknownKeystream { raw: self.keystream_id });
        }
        if self.reserved != [0u8; 6] {
            return Err(HeaderError::ReservedNonZero);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("buffer too short: have {have}, need {need}")]
    BufferTooShort { have: usize, need: usize },

    #[error("invalid magic: {have:?}")]
    InvalidMagic { have: [u8; 4] },

    #[error("unsupported container version: {have}")]
    UnsupportedVersion { have: u16 },

    #[error("unknown flag bits: {raw:#06x}")]
    UnknownFlags { raw: u16 },

    #[error("unknown keystream id: {raw:#06x}")]
    UnknownKeystream { raw: u16 },

    #[error("reserved header bytes must be zero")]
    ReservedNonZero,

    #[error("header checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("item length {item_len} does not fit the container")]
    ItemLenTooLarge { item_len: usize },

    #[error("header I/O: {0}")]
    Io(#[from] std::io::Error),
}
