// Container header suite:
// * encode/decode agreement on every field
// * checksum catches corruption anywhere in the covered span
// * each validation rule rejects exactly one bad field

#[cfg(test)]
mod tests {
    use framecrypt_core::constants::{flags, keystream_ids, CONTAINER_V1, MAGIC_FCP1};
    use framecrypt_core::headers::{
        decode_header_le, encode_header_le, ContainerHeader, HeaderError, HEADER_CRC_SPAN,
        HEADER_LEN_V1,
    };

    fn sample() -> ContainerHeader {
        let mut h = ContainerHeader::new(1280 * 720 * 3, true, keystream_ids::BLAKE3);
        h.finalize_count(150);
        h
    }

    #[test]
    fn header_is_32_bytes() {
        assert_eq!(ContainerHeader::LEN, 32);
        assert_eq!(HEADER_LEN_V1, 32);
        assert_eq!(encode_header_le(&sample()).unwrap().len(), 32);
    }

    #[test]
    fn encode_decode_preserves_fields() {
        let h = sample();
        let bytes = encode_header_le(&h).unwrap();
        let back = decode_header_le(&bytes).unwrap();
        assert_eq!(back, h);
        assert!(back.is_transformed());
        assert!(back.has_final_count());
        assert_eq!(back.item_count, 150);
    }

    #[test]
    fn layout_is_little_endian_at_fixed_offsets() {
        let bytes = encode_header_le(&sample()).unwrap();
        assert_eq!(&bytes[0..4], b"FCP1");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), CONTAINER_V1);
        assert_eq!(
            u16::from_le_bytes([bytes[6], bytes[7]]),
            flags::TRANSFORMED | flags::COUNT_FINAL
        );
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 1280 * 720 * 3);
        assert_eq!(u64::from_le_bytes(bytes[12..20].try_into().unwrap()), 150);
        assert_eq!(u16::from_le_bytes([bytes[20], bytes[21]]), keystream_ids::BLAKE3);
        assert!(bytes[22..28].iter().all(|b| *b == 0));

        let crc = crc32fast::hash(&bytes[..HEADER_CRC_SPAN]);
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), crc);
    }

    #[test]
    fn untransformed_header_drops_keystream_id() {
        let h = ContainerHeader::new(16, false, keystream_ids::LOGISTIC);
        assert_eq!(h.keystream_id, keystream_ids::NONE);
        assert!(!h.is_transformed());
        assert!(!h.has_final_count());
        h.validate().unwrap();
    }

    #[test]
    fn every_flipped_bit_is_detected() {
        let bytes = encode_header_le(&sample()).unwrap();
        for pos in 0..HEADER_LEN_V1 {
            for bit in 0..8 {
                let mut corrupt = bytes;
                corrupt[pos] ^= 1 << bit;
                assert!(
                    decode_header_le(&corrupt).is_err(),
                    "flip at byte {pos} bit {bit} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn checksum_mismatch_is_reported_as_such() {
        let mut bytes = encode_header_le(&sample()).unwrap();
        bytes[12] ^= 0xFF;
        assert!(matches!(
            decode_header_le(&bytes),
            Err(HeaderError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let bytes = encode_header_le(&sample()).unwrap();
        assert!(matches!(
            decode_header_le(&bytes[..31]),
            Err(HeaderError::BufferTooShort { have: 31, need: 32 })
        ));
    }

    #[test]
    fn invalid_magic() {
        let mut h = sample();
        h.magic = *b"BAD!";
        assert!(matches!(h.validate(), Err(HeaderError::InvalidMagic { .. })));
        assert!(encode_header_le(&h).is_err());
    }

    #[test]
    fn unsupported_version() {
        let mut h = sample();
        h.version = 2;
        assert!(matches!(h.validate(), Err(HeaderError::UnsupportedVersion { have: 2 })));
    }

    #[test]
    fn unknown_flag_bits() {
        let mut h = sample();
        h.flags |= 0x8000;
        assert!(matches!(h.validate(), Err(HeaderError::UnknownFlags { .. })));
    }

    #[test]
    fn transformed_needs_a_known_keystream() {
        let mut h = sample();
        h.keystream_id = 0x0042;
        assert!(matches!(h.validate(), Err(HeaderError::UnknownKeystream { raw: 0x0042 })));

        h.keystream_id = keystream_ids::NONE;
        assert!(matches!(h.validate(), Err(HeaderError::UnknownKeystream { raw: 0 })));
    }

    #[test]
    fn raw_payload_must_not_name_a_keystream() {
        let mut h = ContainerHeader::new(16, false, keystream_ids::NONE);
        h.keystream_id = keystream_ids::BLAKE3;
        assert!(matches!(h.validate(), Err(HeaderError::UnknownKeystream { .. })));
    }

    #[test]
    fn reserved_bytes_must_be_zero() {
        let mut h = sample();
        h.reserved[3] = 1;
        assert!(matches!(h.validate(), Err(HeaderError::ReservedNonZero)));
    }

    #[test]
    fn magic_constant_matches() {
        assert_eq!(&MAGIC_FCP1, b"FCP1");
    }
}
