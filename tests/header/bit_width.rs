//! Tests for bit width derivation and header sizing

use streamux::{bits_for, HeaderCodec, StreamuxError, MAX_HEADER_BITS};

#[test]
fn test_bits_for_powers_of_two() {
    for shift in 0..31u32 {
        let value = 1u32 << shift;
        assert_eq!(bits_for(value), shift as u8 + 1, "value {}", value);
        assert_eq!(bits_for(value - 1), shift as u8, "value {}", value - 1);
    }
}

#[test]
fn test_bits_for_max_chunk_lengths() {
    // A max chunk length of 10 fits a 4-bit length field.
    assert_eq!(bits_for(10), 4);
    assert_eq!(bits_for(1024), 11);
    assert_eq!(bits_for(65535), 16);
}

#[test]
fn test_derived_widths_build_a_codec() {
    let length_bits = bits_for(16 * 1024);
    let id_bits = bits_for(255);
    let codec = HeaderCodec::new(length_bits, id_bits).unwrap();
    assert_eq!(codec.max_payload_length(), (1 << 15) - 1);
    assert_eq!(codec.max_id(), 255);
    assert_eq!(codec.header_length(), 4);
}

#[test]
fn test_header_length_for_every_total() {
    for total in 4..=MAX_HEADER_BITS {
        let id_bits = 1;
        let length_bits = total - 2 - id_bits;
        let codec = HeaderCodec::new(length_bits, id_bits).unwrap();
        assert_eq!(codec.header_length(), (total as usize + 7) / 8, "total bits {}", total);
    }
}

#[test]
fn test_one_bit_past_the_limit_is_rejected() {
    let err = HeaderCodec::new(MAX_HEADER_BITS - 2, 1).unwrap_err();
    assert!(matches!(err, StreamuxError::InvalidConfig(_)));
    assert!(HeaderCodec::new(MAX_HEADER_BITS - 3, 1).is_ok());
}
