//! headers/decode.rs
//!
//! Parses the fixed 32-byte container header. The checksum is verified
//! before any field is trusted, then the header is validated.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::headers::types::{ContainerHeader, HeaderError, HEADER_CRC_SPAN, HEADER_LEN_V1};
use crate::utils::compute_crc32;

pub fn decode_header_le(buf: &[u8]) -> Result<ContainerHeader, HeaderError> {
    if buf.len() < HEADER_LEN_V1 {
        return Err(HeaderError::BufferTooShort { have: buf.len(), need: HEADER_LEN_V1 });
    }

    let mut r = Cursor::new(&buf[..HEADER_LEN_V1]);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    let version = r.read_u16::<LittleEndian>()?;
    let flags = r.read_u16::<LittleEndian>()?;
    let item_len = r.read_u32::<LittleEndian>()?;
    let item_count = r.read_u64::<LittleEndian>()?;
    let keystream_id = r.read_u16::<LittleEndian>()?;
    let mut reserved = [0u8; 6];
    r.read_exact(&mut reserved)?;
    let stored = r.read_u32::<LittleEndian>()?;

    let computed = compute_crc32(&buf[..HEADER_CRC_SPAN]);
    if stored != computed {
        return Err(HeaderError::ChecksumMismatch { stored, computed });
    }

    let header = ContainerHeader {
        magic,
        version,
        flags,
        item_len,
        item_count,
        keystream_id,
        reserved,
    };
    header.validate()?;

    Ok(header)
}
