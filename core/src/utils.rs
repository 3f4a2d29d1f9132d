use std::io::Read;

use bytes::BytesMut;

pub fn compute_crc32(data: &[u8]) -> u32 {
    use crc32fast::Hasher;
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Read up to `len` bytes, stopping early only at EOF.
///
/// Returns an empty buffer at a clean EOF and a short buffer when the
/// stream ends mid-record; the caller decides whether that is an error.
pub fn read_exact_or_eof<R: Read>(r: &mut R, len: usize) -> std::io::Result<BytesMut> {
    let mut buf = BytesMut::zeroed(len);
    let mut off = 0;

    while off < len {
        let n = r.read(&mut buf[off..])?;
        if n == 0 {
            break;
        }
        off += n;
    }

    buf.truncate(off);
    Ok(buf)
}

/// Lowercase hex of a digest, for logs and snapshots.
pub fn digest_hex(digest: &blake3::Hash) -> String {
    hex::encode(digest.as_bytes())
}

/// Human-readable byte count ("1.50 MiB").
pub fn format_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", n, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
