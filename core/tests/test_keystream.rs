#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use framecrypt_core::constants::{keystream_ids, DEFAULT_KEYSTREAM_BLOCK_LEN, MIN_KEYSTREAM_BLOCK_LEN};
    use framecrypt_core::keystream::{
        apply_keystream, keystream_bytes, xor_keystream_resume, xor_keystream_with, Blake3Keystream,
        KeystreamError, KeystreamGenerator, KeystreamKind, LogisticKeystream, MasterKey,
    };

    const KEY: MasterKey = MasterKey::new(0x0123_4567_89AB_CDEF);

    #[test]
    fn seed_is_key_xor_index() {
        let key = MasterKey::new(0xFF00);
        assert_eq!(key.seed_for(0), 0xFF00);
        assert_eq!(key.seed_for(0x00FF), 0xFFFF);
        assert_eq!(key.raw(), 0xFF00);
    }

    #[test]
    fn master_key_debug_is_redacted() {
        let text = format!("{:?}", MasterKey::new(0xDEAD_BEEF));
        assert!(!text.contains("DEAD") && !text.to_lowercase().contains("deadbeef"));
        assert!(!text.contains(&0xDEAD_BEEFu64.to_string()));
    }

    #[test]
    fn blake3_is_deterministic_and_index_dependent() {
        let gen = Blake3Keystream::new(DEFAULT_KEYSTREAM_BLOCK_LEN);
        let a = keystream_bytes(&gen, KEY, 7, 256).unwrap();
        let b = keystream_bytes(&gen, KEY, 7, 256).unwrap();
        let c = keystream_bytes(&gen, KEY, 8, 256).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, keystream_bytes(&gen, MasterKey::new(1), 7, 256).unwrap());
    }

    #[test]
    fn blake3_block_limit_is_continued_transparently() {
        let small = Blake3Keystream::new(MIN_KEYSTREAM_BLOCK_LEN);
        let large = Blake3Keystream::new(DEFAULT_KEYSTREAM_BLOCK_LEN);

        let mut out = vec![0u8; 1000];
        assert_eq!(small.fill(1, 0, &mut out).unwrap(), MIN_KEYSTREAM_BLOCK_LEN);

        let a = keystream_bytes(&small, KEY, 3, 10_000).unwrap();
        let b = keystream_bytes(&large, KEY, 3, 10_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn block_len_is_clamped() {
        assert_eq!(Blake3Keystream::new(1).block_len(), MIN_KEYSTREAM_BLOCK_LEN);
    }

    #[test]
    fn windows_match_the_full_stream() {
        let gens: Vec<Box<dyn KeystreamGenerator>> = vec![
            Box::new(Blake3Keystream::new(DEFAULT_KEYSTREAM_BLOCK_LEN)),
            Box::new(LogisticKeystream::new()),
        ];
        for gen in gens {
            let mut full = vec![0u8; 512];
            assert_eq!(gen.fill(99, 0, &mut full).unwrap(), 512);

            let mut window = vec![0u8; 100];
            let n = gen.fill(99, 200, &mut window).unwrap();
            assert_eq!(&window[..n], &full[200..200 + n], "{}", gen.name());
        }
    }

    #[test]
    fn logistic_is_deterministic_and_not_constant() {
        let gen = LogisticKeystream::new();
        let a = keystream_bytes(&gen, KEY, 1, 4096).unwrap();
        let b = keystream_bytes(&gen, KEY, 1, 4096).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, keystream_bytes(&gen, KEY, 2, 4096).unwrap());

        let distinct: std::collections::HashSet<u8> = a.iter().copied().collect();
        assert!(distinct.len() > 200, "only {} distinct bytes", distinct.len());
    }

    #[test]
    fn empty_payload_is_untouched() {
        let gen = Blake3Keystream::new(DEFAULT_KEYSTREAM_BLOCK_LEN);
        let mut empty: Vec<u8> = Vec::new();
        apply_keystream(&gen, KEY, 0, &mut empty).unwrap();
        assert!(empty.is_empty());
    }

    /// Returns zero bytes at a fixed offset.
    #[derive(Debug)]
    struct DriesUp;

    impl KeystreamGenerator for DriesUp {
        fn id(&self) -> u16 {
            0x7777
        }
        fn name(&self) -> &'static str {
            "dries-up"
        }
        fn fill(&self, _seed: u64, offset: u64, out: &mut [u8]) -> Result<usize, KeystreamError> {
            if offset >= 10 {
                return Ok(0);
            }
            let n = out.len().min(10 - offset as usize);
            out[..n].fill(0xAA);
            Ok(n)
        }
    }

    #[test]
    fn zero_length_fill_is_reported_as_exhausted() {
        let mut payload = vec![0u8; 20];
        let mut scratch = Vec::new();
        let err = xor_keystream_with(&DriesUp, 5, &mut payload, &mut scratch).unwrap_err();
        assert_eq!(err, KeystreamError::Exhausted { seed: 5, offset: 10 });
    }

    /// Fails once at offset 64, then works.
    #[derive(Debug)]
    struct HiccupAt64 {
        inner: Blake3Keystream,
        tripped: std::sync::atomic::AtomicBool,
    }

    impl KeystreamGenerator for HiccupAt64 {
        fn id(&self) -> u16 {
            self.inner.id()
        }
        fn name(&self) -> &'static str {
            "hiccup"
        }
        fn fill(&self, seed: u64, offset: u64, out: &mut [u8]) -> Result<usize, KeystreamError> {
            use std::sync::atomic::Ordering;
            if offset == 64 && !self.tripped.swap(true, Ordering::SeqCst) {
                return Err(KeystreamError::Unavailable("hiccup".into()));
            }
            self.inner.fill(seed, offset, out)
        }
    }

    #[test]
    fn resume_continues_after_a_transient_error() {
        let gen = HiccupAt64 {
            inner: Blake3Keystream::new(MIN_KEYSTREAM_BLOCK_LEN),
            tripped: Default::default(),
        };
        let original = vec![0x5Au8; 300];
        let mut payload = original.clone();
        let mut scratch = Vec::new();
        let mut done = 0;

        let err = xor_keystream_resume(&gen, 11, &mut payload, &mut done, &mut scratch).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(done, 64);

        xor_keystream_resume(&gen, 11, &mut payload, &mut done, &mut scratch).unwrap();
        assert_eq!(done, 300);

        let mut want = original;
        xor_keystream_with(&gen.inner, 11, &mut want, &mut Vec::new()).unwrap();
        assert_eq!(payload, want);
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(KeystreamError::Unavailable("x".into()).is_transient());
        assert!(!KeystreamError::Degenerate { seed: 0, offset: 0 }.is_transient());
        assert!(!KeystreamError::Exhausted { seed: 0, offset: 0 }.is_transient());
    }

    #[test]
    fn kind_ids_round_trip_and_build() {
        for kind in [KeystreamKind::Blake3, KeystreamKind::Logistic] {
            assert_eq!(KeystreamKind::from_id(kind.id()), Some(kind));
            let gen = kind.build(DEFAULT_KEYSTREAM_BLOCK_LEN);
            assert_eq!(gen.id(), kind.id());
            assert_eq!(gen.name(), kind.to_string());
        }
        assert_eq!(KeystreamKind::from_id(keystream_ids::NONE), None);
        assert_eq!(KeystreamKind::default(), KeystreamKind::Blake3);
    }

    #[test]
    fn kind_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&KeystreamKind::Logistic).unwrap(), "\"logistic\"");
        let k: KeystreamKind = serde_json::from_str("\"blake3\"").unwrap();
        assert_eq!(k, KeystreamKind::Blake3);
    }

    /// Counts `fill` calls and forwards the inner generator's cap.
    #[derive(Debug)]
    struct CountingFills<G> {
        inner: G,
        calls: AtomicUsize,
    }

    impl<G> CountingFills<G> {
        fn new(inner: G) -> Self {
            Self { inner, calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<G: KeystreamGenerator> KeystreamGenerator for CountingFills<G> {
        fn id(&self) -> u16 {
            self.inner.id()
        }
        fn name(&self) -> &'static str {
            "counting"
        }
        fn fill(&self, seed: u64, offset: u64, out: &mut [u8]) -> Result<usize, KeystreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fill(seed, offset, out)
        }
        fn max_fill_len(&self) -> Option<usize> {
            self.inner.max_fill_len()
        }
    }

    #[test]
    fn uncapped_generator_is_filled_in_one_call() {
        // Larger than any fixed scratch window; a logistic window at a late
        // offset replays everything before it.
        let gen = CountingFills::new(LogisticKeystream::new());
        assert_eq!(gen.max_fill_len(), None);

        let mut payload = vec![0u8; 300_000];
        apply_keystream(&gen, KEY, 3, &mut payload).unwrap();
        assert_eq!(gen.calls(), 1);
        assert_eq!(payload, keystream_bytes(&LogisticKeystream::new(), KEY, 3, 300_000).unwrap());
    }

    #[test]
    fn capped_generator_is_filled_block_by_block() {
        let gen = CountingFills::new(Blake3Keystream::new(1024));
        assert_eq!(gen.max_fill_len(), Some(1024));

        let mut payload = vec![0u8; 10 * 1024 + 1];
        apply_keystream(&gen, KEY, 0, &mut payload).unwrap();
        assert_eq!(gen.calls(), 11);
    }

    proptest! {
        #[test]
        fn prop_blake3_xor_is_an_involution(
            payload in proptest::collection::vec(any::<u8>(), 0..3000),
            key in any::<u64>(),
            index in any::<u64>(),
        ) {
            // Small blocks force several generator calls per payload.
            let gen = Blake3Keystream::new(MIN_KEYSTREAM_BLOCK_LEN);
            let key = MasterKey::new(key);
            let mut buf = payload.clone();
            apply_keystream(&gen, key, index, &mut buf).unwrap();
            if payload.len() >= 32 {
                prop_assert_ne!(&buf, &payload);
            }
            apply_keystream(&gen, key, index, &mut buf).unwrap();
            prop_assert_eq!(buf, payload);
        }

        #[test]
        fn prop_logistic_xor_is_an_involution(
            payload in proptest::collection::vec(any::<u8>(), 0..512),
            key in any::<u64>(),
            index in 0u64..10_000,
        ) {
            let gen = LogisticKeystream::new();
            let key = MasterKey::new(key);
            let mut buf = payload.clone();
            apply_keystream(&gen, key, index, &mut buf).unwrap();
            apply_keystream(&gen, key, index, &mut buf).unwrap();
            prop_assert_eq!(buf, payload);
        }
    }
}
