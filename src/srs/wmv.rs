//! WMV (ASF) profiler: walks `guid(16) | size(u64 LE) | payload` objects.
//! The Data Object's packets are treated as one logical track `1`, per the
//! simplification spec §4.4.4 explicitly allows.
//!
//! The whole-file CRC32 is computed separately by the caller over the raw
//! buffer; this walk only classifies bytes into the one track.

use std::io::{self, Read};

use crate::error::{RescError, RescResult};
use crate::read::{read_u16, read_u64, read_vec};
use crate::srs::track::TrackBuilder;

const DATA_OBJECT_GUID_PREFIX: [u8; 4] = [0x36, 0x26, 0xB2, 0x75];
const OBJECT_HEADER_LEN: u64 = 24;
const DATA_OBJECT_PREFIX_LEN: u64 = 26;

pub fn profile(data: &[u8]) -> RescResult<Vec<(u32, TrackBuilder)>> {
    let mut reader = io::Cursor::new(data);
    let mut builder = TrackBuilder::default();
    let end = data.len() as u64;

    loop {
        let pos = reader.position();
        if pos >= end {
            break;
        }
        if pos + OBJECT_HEADER_LEN > end {
            return Err(RescError::Malformed("ASF object header past end".into()));
        }

        let guid = read_vec(&mut reader, 16)?;
        let size = read_u64(&mut reader)?;

        let object_end = pos
            .checked_add(size)
            .filter(|&e| e <= end)
            .ok_or_else(|| RescError::Malformed("ASF object size exceeds region".into()))?;

        if guid[0..4] == DATA_OBJECT_GUID_PREFIX[..] {
            profile_data_object(&mut reader, object_end, &mut builder)?;
        }

        reader.set_position(object_end);
    }

    let mut tracks = Vec::new();
    if builder.data_length > 0 {
        tracks.push((1u32, builder));
    }
    Ok(tracks)
}

/// Data Object body: `fileId(16) | totalPackets(u64 LE) | reserved(u16) |
/// packets[]`. Every packet byte is classified as track `1` payload; the
/// header fields before the packet array remain container bytes.
fn profile_data_object(
    reader: &mut io::Cursor<&[u8]>,
    object_end: u64,
    builder: &mut TrackBuilder,
) -> RescResult<()> {
    if reader.position() + DATA_OBJECT_PREFIX_LEN > object_end {
        return Err(RescError::Malformed("ASF data object header truncated".into()));
    }

    let _file_id = read_vec(reader, 16)?;
    let _total_packets = read_u64(reader)?;
    let _reserved = read_u16(reader)?;

    let mut left = object_end - reader.position();
    let mut buf = [0u8; 64 * 1024];
    while left > 0 {
        let want = left.min(buf.len() as u64) as usize;
        reader.read_exact(&mut buf[..want])?;
        builder.feed(&buf[..want]);
        left -= want as u64;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(guid: &[u8; 16], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(guid);
        out.extend_from_slice(&(24 + body.len() as u64).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    const HEADER_OBJECT_GUID: [u8; 16] = [
        0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE,
        0x6C,
    ];
    const DATA_OBJECT_GUID: [u8; 16] = [
        0x36, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE,
        0x6C,
    ];

    #[test]
    fn test_data_object_becomes_track_one() {
        let header_body = vec![0u8; 40];
        let header = object(&HEADER_OBJECT_GUID, &header_body);

        let mut data_body = vec![0u8; 16]; // file id
        data_body.extend_from_slice(&2u64.to_le_bytes()); // total packets
        data_body.extend_from_slice(&0u16.to_le_bytes()); // reserved
        data_body.extend_from_slice(&[9u8; 300]); // packets

        let data_object = object(&DATA_OBJECT_GUID, &data_body);

        let mut input = header;
        input.extend(data_object);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].0, 1);
        assert_eq!(tracks[0].1.data_length, 300);
        assert_eq!(tracks[0].1.signature.len(), 256);
    }

    #[test]
    fn test_non_data_objects_produce_no_track() {
        let header = object(&HEADER_OBJECT_GUID, &[1u8; 40]);
        let tracks = profile(&header).unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_object_size_past_end_is_malformed() {
        let mut input = HEADER_OBJECT_GUID.to_vec();
        input.extend_from_slice(&10_000u64.to_le_bytes());
        input.extend_from_slice(&[0u8; 8]);

        assert!(profile(&input).is_err());
    }
}
