//! AVI (RIFF) profiler: walks `fourcc | size(u32 LE) | payload` chunks,
//! recursing into `RIFF`/`LIST` container chunks, and classifies `movi`
//! stream chunks (`ddLL`, e.g. `00dc`, `01wb`) as per-track payload.
//!
//! The whole-file CRC32 in `ProfileResult` is computed once over the raw
//! buffer by the caller (`srs::profiler::profile`); this walk only needs to
//! classify bytes, not re-accumulate a checksum of its own.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{RescError, RescResult};
use crate::read::{read_u32, read_vec};
use crate::srs::track::TrackBuilder;

/// Parses a `ddLL` stream-chunk fourcc (two ASCII digits, two letters) into
/// its track number, e.g. `00dc` -> 0, `01wb` -> 1.
fn stream_track_number(fourcc: &[u8; 4]) -> Option<u32> {
    let d0 = (fourcc[0] as char).to_digit(10)?;
    let d1 = (fourcc[1] as char).to_digit(10)?;
    if !fourcc[2].is_ascii_alphabetic() || !fourcc[3].is_ascii_alphabetic() {
        return None;
    }
    Some(d0 * 10 + d1)
}

pub fn profile(data: &[u8]) -> RescResult<Vec<(u32, TrackBuilder)>> {
    let mut reader = io::Cursor::new(data);
    let mut tracks: BTreeMap<u32, TrackBuilder> = BTreeMap::new();

    walk_chunks(&mut reader, data.len() as u64, &mut tracks)?;

    Ok(tracks.into_iter().collect())
}

const CONTAINER_FOURCC: [&[u8; 4]; 2] = [b"RIFF", b"LIST"];

fn walk_chunks<R: Read + Seek>(
    reader: &mut R,
    end: u64,
    tracks: &mut BTreeMap<u32, TrackBuilder>,
) -> RescResult<()> {
    loop {
        let pos = reader.stream_position()?;
        if pos >= end {
            break;
        }
        if pos + 8 > end {
            return Err(RescError::Malformed("RIFF chunk header past end".into()));
        }

        let fourcc: [u8; 4] = read_vec(reader, 4)?.try_into().unwrap();
        let size = read_u32(reader)?;

        let body_start = reader.stream_position()?;
        let body_end = body_start
            .checked_add(size as u64)
            .filter(|&e| e <= end)
            .ok_or_else(|| RescError::Malformed("RIFF chunk size exceeds region".into()))?;

        if CONTAINER_FOURCC.contains(&&fourcc) {
            let _sub_type: [u8; 4] = read_vec(reader, 4)?.try_into().unwrap();
            walk_chunks(reader, body_end, tracks)?;
        } else if let Some(track_number) = stream_track_number(&fourcc) {
            let payload = read_vec(reader, size as usize)?;
            tracks.entry(track_number).or_default().feed(&payload);
        }

        reader.seek(SeekFrom::Start(body_end))?;
        if size % 2 == 1 && body_end < end {
            reader.seek(SeekFrom::Start(body_end + 1))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(fourcc);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn list(sub_type: &[u8; 4], children: &[u8]) -> Vec<u8> {
        let mut body = sub_type.to_vec();
        body.extend_from_slice(children);
        chunk(b"LIST", &body)
    }

    fn riff(sub_type: &[u8; 4], children: &[u8]) -> Vec<u8> {
        let mut body = sub_type.to_vec();
        body.extend_from_slice(children);
        chunk(b"RIFF", &body)
    }

    #[test]
    fn test_two_stream_tracks() {
        let avih = chunk(b"avih", &[0u8; 56]);
        let hdrl = list(b"hdrl", &avih);

        let video = chunk(b"00dc", &[1u8; 512]);
        let audio = chunk(b"01wb", &[2u8; 256]);
        let mut movi_children = video.clone();
        movi_children.extend_from_slice(&audio);
        let movi = list(b"movi", &movi_children);

        let mut body = hdrl;
        body.extend_from_slice(&movi);
        let input = riff(b"AVI ", &body);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].0, 0);
        assert_eq!(tracks[0].1.data_length, 512);
        assert_eq!(tracks[0].1.signature.len(), 256);
        assert_eq!(tracks[1].0, 1);
        assert_eq!(tracks[1].1.data_length, 256);
        assert_eq!(tracks[1].1.signature.len(), 256);
    }

    #[test]
    fn test_non_stream_chunks_are_not_tracked() {
        let avih = chunk(b"avih", &[0u8; 56]);
        let hdrl = list(b"hdrl", &avih);
        let movi = list(b"movi", &chunk(b"00dc", &[1u8; 4]));

        let mut body = hdrl;
        body.extend_from_slice(&movi);
        let input = riff(b"AVI ", &body);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_odd_sized_chunk_padding_does_not_confuse_the_walk() {
        let odd = chunk(b"JUNK", &[0u8; 3]);
        let movi = list(b"movi", &chunk(b"00dc", &[1u8; 4]));

        let mut body = odd;
        body.extend_from_slice(&movi);
        let input = riff(b"AVI ", &body);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].1.data_length, 4);
    }
}
