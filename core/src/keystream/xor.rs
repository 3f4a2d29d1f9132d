use crate::keystream::types::{KeystreamError, KeystreamGenerator, MasterKey};

/// XOR the keystream for `seed` into `payload`, in place.
///
/// Keeps requesting keystream from the generator until the whole payload
/// is covered, so generators with a per-call block limit are continued
/// from where they stopped. `scratch` is reused across calls by workers.
pub fn xor_keystream_with(
    generator: &dyn KeystreamGenerator,
    seed: u64,
    payload: &mut [u8],
    scratch: &mut Vec<u8>,
) -> Result<(), KeystreamError> {
    let mut done = 0;
    xor_keystream_resume(generator, seed, payload, &mut done, scratch)
}

/// Like [`xor_keystream_with`], but starts at `*done` and advances it as
/// bytes are applied. After an error `*done` marks the first untouched
/// byte, so a retry picks up there instead of XOR-ing the prefix twice.
pub fn xor_keystream_resume(
    generator: &dyn KeystreamGenerator,
    seed: u64,
    payload: &mut [u8],
    done: &mut usize,
    scratch: &mut Vec<u8>,
) -> Result<(), KeystreamError> {
    if *done >= payload.len() {
        return Ok(());
    }

    // One call per cap-sized block; one call in total for uncapped generators.
    let cap = generator.max_fill_len().unwrap_or(usize::MAX).max(1);
    let window = (payload.len() - *done).min(cap);
    if scratch.len() < window {
        scratch.resize(window, 0);
    }

    while *done < payload.len() {
        let offset = *done;
        let want = (payload.len() - offset).min(window);
        let n = generator.fill(seed, offset as u64, &mut scratch[..want])?.min(want);
        if n == 0 {
            return Err(KeystreamError::Exhausted { seed, offset: offset as u64 });
        }

        payload[offset..offset + n]
            .iter_mut()
            .zip(&scratch[..n])
            .for_each(|(p, k)| *p ^= k);
        *done += n;
    }

    Ok(())
}

/// Transform one payload for `index` under `key`. Applying it twice with
/// the same arguments restores the original bytes.
pub fn apply_keystream(
    generator: &dyn KeystreamGenerator,
    key: MasterKey,
    index: u64,
    payload: &mut [u8],
) -> Result<(), KeystreamError> {
    let mut scratch = Vec::new();
    xor_keystream_with(generator, key.seed_for(index), payload, &mut scratch)
}

/// Materialize `len` keystream bytes for `(key, index)`.
pub fn keystream_bytes(
    generator: &dyn KeystreamGenerator,
    key: MasterKey,
    index: u64,
    len: usize,
) -> Result<Vec<u8>, KeystreamError> {
    // XOR into zeros yields the raw keystream.
    let mut out = vec![0u8; len];
    apply_keystream(generator, key, index, &mut out)?;
    Ok(out)
}
