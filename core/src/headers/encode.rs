//! headers/encode.rs
//!
//! Serializes `ContainerHeader` into its fixed 32-byte form.
//! Field order must match the layout documented in `types.rs`.

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::headers::types::{ContainerHeader, HeaderError, HEADER_CRC_SPAN, HEADER_LEN_V1};
use crate::utils::compute_crc32;

/// Serialize a header, validating it first and appending the CRC32.
pub fn encode_header_le(h: &ContainerHeader) -> Result<[u8; HEADER_LEN_V1], HeaderError> {
    h.validate()?;

    let mut out = [0u8; HEADER_LEN_V1];
    {
        let mut w = Cursor::new(&mut out[..]);
        w.write_all(&h.magic)?;                      // 0..4   magic
        w.write_u16::<LittleEndian>(h.version)?;     // 4..6   version
        w.write_u16::<LittleEndian>(h.flags)?;       // 6..8   flags
        w.write_u32::<LittleEndian>(h.item_len)?;    // 8..12  item length
        w.write_u64::<LittleEndian>(h.item_count)?;  // 12..20 item count
        w.write_u16::<LittleEndian>(h.keystream_id)?; // 20..22 keystream id
        w.write_all(&h.reserved)?;                   // 22..28 reserved
        debug_assert_eq!(w.position() as usize, HEADER_CRC_SPAN);
    }

    let crc = compute_crc32(&out[..HEADER_CRC_SPAN]);
    out[HEADER_CRC_SPAN..].copy_from_slice(&crc.to_le_bytes()); // 28..32 crc32

    Ok(out)
}
