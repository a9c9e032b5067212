//! MP4 (ISO-BMFF) profiler: walks `size32(u32 BE) | type(4) | [size64]`
//! atoms, recursing into the container atoms named in §4.4.3 and treating
//! `mdat`'s entire payload as the A/V track named by the nearest preceding
//! `tkhd`, defaulting to track `1` when none was seen.
//!
//! The whole-file CRC32 is computed separately by the caller over the raw
//! buffer; this walk only classifies bytes into tracks.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{RescError, RescResult};
use crate::read::{read_u32_be, read_u64_be, read_vec};
use crate::srs::track::TrackBuilder;

const CONTAINER_ATOMS: [&[u8; 4]; 7] = [b"moov", b"trak", b"mdia", b"minf", b"stbl", b"edts", b"udta"];
const META_LIKE_ATOMS: [&[u8; 4]; 2] = [b"meta", b"ilst"];

pub fn profile(data: &[u8]) -> RescResult<Vec<(u32, TrackBuilder)>> {
    let mut reader = io::Cursor::new(data);
    let mut tracks: BTreeMap<u32, TrackBuilder> = BTreeMap::new();
    let mut current_track_id: Option<u32> = None;

    walk_atoms(&mut reader, data.len() as u64, &mut tracks, &mut current_track_id)?;

    Ok(tracks.into_iter().collect())
}

fn walk_atoms<R: Read + Seek>(
    reader: &mut R,
    end: u64,
    tracks: &mut BTreeMap<u32, TrackBuilder>,
    current_track_id: &mut Option<u32>,
) -> RescResult<()> {
    loop {
        let pos = reader.stream_position()?;
        if pos >= end {
            break;
        }
        if pos + 8 > end {
            return Err(RescError::Malformed("MP4 atom header past end".into()));
        }

        let size32 = read_u32_be(reader)?;
        let atom_type: [u8; 4] = read_vec(reader, 4)?.try_into().unwrap();

        let (header_len, body_len) = if size32 == 1 {
            let size64 = read_u64_be(reader)?;
            (
                16u64,
                size64
                    .checked_sub(16)
                    .ok_or_else(|| RescError::Malformed("MP4 64-bit atom size too small".into()))?,
            )
        } else if size32 == 0 {
            (8u64, end - pos - 8)
        } else {
            (8u64, size32 as u64 - 8)
        };

        let body_start = pos + header_len;
        let body_end = body_start
            .checked_add(body_len)
            .filter(|&e| e <= end)
            .ok_or_else(|| RescError::Malformed("MP4 atom size exceeds region".into()))?;

        if &atom_type == b"tkhd" {
            let body = read_vec(reader, body_len as usize)?;
            if let Some(id) = parse_tkhd_track_id(&body) {
                *current_track_id = Some(id);
            }
        } else if &atom_type == b"mdat" {
            let track_id = current_track_id.unwrap_or(1);
            let mut remaining = body_len;
            let mut buf = [0u8; 64 * 1024];
            let builder = tracks.entry(track_id).or_default();
            while remaining > 0 {
                let want = remaining.min(buf.len() as u64) as usize;
                reader.read_exact(&mut buf[..want])?;
                builder.feed(&buf[..want]);
                remaining -= want as u64;
            }
        } else if CONTAINER_ATOMS.contains(&&atom_type) || META_LIKE_ATOMS.contains(&&atom_type) {
            walk_atoms(reader, body_end, tracks, current_track_id)?;
        }

        reader.seek(SeekFrom::Start(body_end))?;
    }

    Ok(())
}

/// `tkhd`: version at offset 0; `trackId` at body offset 12 (v0, after the
/// 4-byte version/flags word and two 4-byte timestamps) or offset 20 (v1,
/// 8-byte timestamps), 4 bytes big-endian.
fn parse_tkhd_track_id(body: &[u8]) -> Option<u32> {
    let version = *body.first()?;
    let offset = if version == 1 { 20 } else { 12 };
    let bytes: [u8; 4] = body.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(8 + body.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_single_mdat_track() {
        let ftyp = atom(b"ftyp", b"isom\0\0\0\0isomiso2avc1mp41");
        let moov = atom(b"moov", &[0u8; 32]);
        let mdat = atom(b"mdat", &[5u8; 1024]);

        let mut input = ftyp;
        input.extend(moov);
        input.extend(mdat);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].0, 1);
        assert_eq!(tracks[0].1.data_length, 1024);
        assert_eq!(tracks[0].1.signature.len(), 256);
    }

    #[test]
    fn test_tkhd_assigns_track_id() {
        let mut tkhd_body = vec![0u8; 12];
        tkhd_body.extend_from_slice(&7u32.to_be_bytes());
        let tkhd = atom(b"tkhd", &tkhd_body);
        let trak = atom(b"trak", &tkhd);
        let moov = atom(b"moov", &trak);
        let mdat = atom(b"mdat", &[1u8; 16]);

        let mut input = moov;
        input.extend(mdat);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].0, 7);
    }

    #[test]
    fn test_zero_size_atom_extends_to_end_of_region() {
        let mut input = atom(b"ftyp", b"isom");
        // `mdat` with size32 == 0: runs to end of file.
        input.extend_from_slice(&0u32.to_be_bytes());
        input.extend_from_slice(b"mdat");
        input.extend_from_slice(&[2u8; 100]);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].1.data_length, 100);
    }

    #[test]
    fn test_atom_size_past_end_is_malformed() {
        let mut input = Vec::new();
        input.extend_from_slice(&1000u32.to_be_bytes());
        input.extend_from_slice(b"mdat");
        input.extend_from_slice(&[0u8; 10]);

        assert!(profile(&input).is_err());
    }
}
