//! MKV (EBML) profiler: walks top-level `id(VINT) | size(VINT) | body`
//! elements, recursing into the Matroska container IDs named in §4.4.2, and
//! classifies `SimpleBlock`/`Block` frame data by the track number encoded
//! in its own leading VINT.
//!
//! The whole-file CRC32 is computed separately by the caller over the raw
//! buffer; this walk only classifies bytes into tracks.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use crate::ebml::{read_data_size, read_element_id};
use crate::error::{RescError, RescResult};
use crate::read::{read_u8, read_vec};
use crate::srs::track::TrackBuilder;

const SEGMENT: u64 = 0x18538067;
const CLUSTER: u64 = 0x1F43B675;
const TRACKS: u64 = 0x1654AE6B;
const TRACK_ENTRY: u64 = 0xAE;
const CONTENT_ENCODINGS: u64 = 0x6D80;
const CONTENT_ENCODING: u64 = 0x6240;
const CONTENT_COMPRESSION: u64 = 0x5034;
const BLOCK_GROUP: u64 = 0xA0;
const ATTACHMENTS: u64 = 0x1941A469;
const ATTACHED_FILE: u64 = 0x61A7;

const SIMPLE_BLOCK: u64 = 0xA3;
const BLOCK: u64 = 0xA1;

fn is_container(id: u64) -> bool {
    matches!(
        id,
        SEGMENT
            | CLUSTER
            | TRACKS
            | TRACK_ENTRY
            | CONTENT_ENCODINGS
            | CONTENT_ENCODING
            | CONTENT_COMPRESSION
            | BLOCK_GROUP
            | ATTACHMENTS
            | ATTACHED_FILE
    )
}

pub fn profile(data: &[u8]) -> RescResult<Vec<(u32, TrackBuilder)>> {
    let mut reader = io::Cursor::new(data);
    let mut tracks: BTreeMap<u32, TrackBuilder> = BTreeMap::new();

    walk_elements(&mut reader, data.len() as u64, &mut tracks)?;

    Ok(tracks.into_iter().collect())
}

fn walk_elements<R: Read + Seek>(
    reader: &mut R,
    end: u64,
    tracks: &mut BTreeMap<u32, TrackBuilder>,
) -> RescResult<()> {
    loop {
        let pos = reader.stream_position()?;
        if pos >= end {
            break;
        }

        let (id, _) = read_element_id(reader)?;
        let (size, _) = read_data_size(reader)?;

        let body_start = reader.stream_position()?;
        let body_end = body_start
            .checked_add(size)
            .filter(|&e| e <= end)
            .ok_or_else(|| RescError::Malformed("EBML element size exceeds region".into()))?;

        if id == SIMPLE_BLOCK || id == BLOCK {
            read_block(reader, body_end, tracks)?;
        } else if is_container(id) {
            walk_elements(reader, body_end, tracks)?;
        }

        reader.seek(SeekFrom::Start(body_end))?;
    }

    Ok(())
}

/// `SimpleBlock`/`Block` body: `trackNumber(VINT) | timecode(i16 BE) |
/// flags(u8) | frame data...`. The VINT+2+1 header bytes count as container
/// bytes; the remainder is the named track's payload.
fn read_block<R: Read + Seek>(
    reader: &mut R,
    body_end: u64,
    tracks: &mut BTreeMap<u32, TrackBuilder>,
) -> RescResult<()> {
    let (track_number, _) = read_data_size(reader)?;
    let _timecode = read_vec(reader, 2)?;
    let _flags = read_u8(reader)?;

    let frame_len = body_end.saturating_sub(reader.stream_position()?);
    let frame = read_vec(reader, frame_len as usize)?;

    tracks
        .entry(track_number as u32)
        .or_default()
        .feed(&frame);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::{build_element, encode_size};

    fn simple_block(track: u64, data: &[u8]) -> Vec<u8> {
        let mut body = encode_size(track);
        body.extend_from_slice(&0i16.to_be_bytes());
        body.push(0x80);
        body.extend_from_slice(data);
        build_element(SIMPLE_BLOCK, &body)
    }

    #[test]
    fn test_two_simple_block_tracks() {
        let cluster_body = {
            let mut b = simple_block(1, &[1u8; 512]);
            b.extend(simple_block(2, &[2u8; 256]));
            b
        };
        let cluster = build_element(CLUSTER, &cluster_body);
        let segment = build_element(SEGMENT, &cluster);

        let ebml_header = build_element(0x1A45DFA3, b"matroska-ish");
        let mut input = ebml_header;
        input.extend(segment);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].0, 1);
        assert_eq!(tracks[0].1.data_length, 512);
        assert_eq!(tracks[1].0, 2);
        assert_eq!(tracks[1].1.data_length, 256);
    }

    #[test]
    fn test_nested_block_group_is_still_walked() {
        let block = simple_block(3, &[9u8; 64]);
        let block_group = build_element(BLOCK_GROUP, &block);
        let cluster = build_element(CLUSTER, &block_group);
        let segment = build_element(SEGMENT, &cluster);

        let tracks = profile(&segment).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].0, 3);
        assert_eq!(tracks[0].1.data_length, 64);
    }

    #[test]
    fn test_element_size_past_end_is_malformed() {
        // `0xAE` (1-byte id) followed by a 1-byte size VINT `0xFF` (decodes
        // to 127) but only 3 bytes of body actually follow.
        let bogus = vec![0xAE, 0xFF, 0, 0, 0];
        assert!(profile(&bogus).is_err());
    }
}
