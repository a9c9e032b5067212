//! EBML element-ID and data-size VINT codec used by the MKV block scanner
//! and the MKV `SrsWriter`.
//!
//! Width is `1 + leading_zero_count(first_byte)`, capped at 8 bytes. Element
//! IDs keep their marker bit (it is part of the canonical ID); data sizes
//! have it masked out.

use std::io;

use crate::error::{RescError, RescResult};
use crate::read::read_u8;

fn vint_width(first_byte: u8) -> RescResult<u32> {
    if first_byte == 0 {
        return Err(RescError::Malformed("VINT wider than 8 bytes".into()));
    }
    Ok(1 + first_byte.leading_zeros())
}

fn read_raw_vint<R: io::Read>(reader: &mut R) -> RescResult<(u64, u32)> {
    let first = read_u8(reader)?;
    let width = vint_width(first)?;

    let mut raw = first as u64;
    for _ in 1..width {
        raw = (raw << 8) | read_u8(reader)? as u64;
    }

    Ok((raw, width))
}

/// Decode an EBML element ID, preserving its marker bit.
pub fn read_element_id<R: io::Read>(reader: &mut R) -> RescResult<(u64, u32)> {
    read_raw_vint(reader)
}

/// Decode an EBML data-size VINT, masking out its marker bit.
pub fn read_data_size<R: io::Read>(reader: &mut R) -> RescResult<(u64, u32)> {
    let (raw, width) = read_raw_vint(reader)?;
    let marker = 1u64 << (7 * width);
    Ok((raw & (marker - 1), width))
}

/// Encode an element ID using its minimal canonical width (1-4 bytes),
/// marker bit included verbatim since it is already part of `id`.
pub fn encode_id(id: u64) -> Vec<u8> {
    let be = id.to_be_bytes();
    let first_nonzero = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
    be[first_nonzero..].to_vec()
}

/// Encode a data-size VINT using the smallest width (1-8 bytes) that holds
/// `n` plus a marker bit at the top of the value's bit field.
pub fn encode_size(n: u64) -> Vec<u8> {
    let mut width: u32 = 1;
    while width < 8 && n >= (1u64 << (7 * width)) {
        width += 1;
    }

    let raw = n | (1u64 << (7 * width));
    let be = raw.to_be_bytes();
    be[8 - width as usize..].to_vec()
}

/// `EncodeId(id) || EncodeSize(len(data)) || data`, per §4.5.
pub fn build_element(id: u64, data: &[u8]) -> Vec<u8> {
    let mut out = encode_id(id);
    out.extend(encode_size(data.len() as u64));
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[rstest::rstest]
    #[case(0x1A45DFA3)]
    #[case(0x18538067)]
    #[case(0x1F43B675)]
    #[case(0xA3)]
    #[case(0xAE)]
    #[case(0x4282)]
    fn test_id_round_trip(#[case] id: u64) {
        let encoded = encode_id(id);
        let (decoded, _) = read_element_id(&mut Cursor::new(encoded)).unwrap();
        assert_eq!(decoded, id);
    }

    #[rstest::rstest]
    #[case(0)]
    #[case(126)]
    #[case(127)]
    #[case(128)]
    #[case(16383)]
    #[case(16384)]
    #[case(1 << 20)]
    #[case((1u64 << 56) - 1)]
    fn test_size_round_trip(#[case] n: u64) {
        let encoded = encode_size(n);
        let (decoded, _) = read_data_size(&mut Cursor::new(encoded)).unwrap();
        assert_eq!(decoded, n);
    }

    #[test]
    fn test_id_preserves_marker_bit() {
        // 0xA3 (SimpleBlock) is one byte with the marker bit set; make sure
        // the decoded value is not masked down to the 7 payload bits.
        let (id, width) = read_element_id(&mut Cursor::new(vec![0xA3])).unwrap();
        assert_eq!(id, 0xA3);
        assert_eq!(width, 1);
    }
}
