//! MP3 profiler: locates the optional `ID3` v2 header (size syncsafe at
//! offsets 6-9) and optional trailing `TAG` (128-byte ID3v1) tail, and
//! classifies everything between as track `1` audio payload.

use crate::error::RescResult;
use crate::srs::track::TrackBuilder;

const ID3V2_HEADER_LEN: usize = 10;
const ID3V1_TAG_LEN: usize = 128;

/// Syncsafe 28-bit size: four bytes, top bit of each byte always clear.
fn syncsafe_size(bytes: [u8; 4]) -> usize {
    bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | (b & 0x7F) as usize)
}

pub fn profile(data: &[u8]) -> RescResult<Vec<(u32, TrackBuilder)>> {
    let audio_start = if data.len() >= ID3V2_HEADER_LEN && &data[0..3] == b"ID3" {
        let size = syncsafe_size(data[6..10].try_into().unwrap());
        (ID3V2_HEADER_LEN + size).min(data.len())
    } else {
        0
    };

    let has_id3v1 = data.len() >= audio_start + ID3V1_TAG_LEN
        && &data[data.len() - ID3V1_TAG_LEN..data.len() - ID3V1_TAG_LEN + 3] == b"TAG";
    let audio_end = if has_id3v1 {
        data.len() - ID3V1_TAG_LEN
    } else {
        data.len()
    };

    let mut builder = TrackBuilder::default();
    if audio_end > audio_start {
        builder.feed(&data[audio_start..audio_end]);
    }

    let mut tracks = Vec::new();
    if builder.data_length > 0 {
        tracks.push((1u32, builder));
    }
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id3v2_header(body_size: usize) -> Vec<u8> {
        let mut out = b"ID3".to_vec();
        out.push(3); // version
        out.push(0); // revision
        out.push(0); // flags
        let mut n = body_size;
        let mut syncsafe = [0u8; 4];
        for i in (0..4).rev() {
            syncsafe[i] = (n & 0x7F) as u8;
            n >>= 7;
        }
        out.extend_from_slice(&syncsafe);
        out
    }

    #[test]
    fn test_id3v2_header_then_audio() {
        let mut input = id3v2_header(10);
        input.extend_from_slice(&[0u8; 10]);
        input.extend_from_slice(&[0xFF, 0xFB]);
        input.extend_from_slice(&[1u8; 510]);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].0, 1);
        assert_eq!(tracks[0].1.data_length, 512);
    }

    #[test]
    fn test_id3v1_tail_is_excluded() {
        let mut input = vec![0xFFu8, 0xFB];
        input.extend_from_slice(&[1u8; 98]);
        let mut tag = vec![b'T', b'A', b'G'];
        tag.extend_from_slice(&[0u8; 125]);
        input.extend_from_slice(&tag);

        let tracks = profile(&input).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].1.data_length, 100);
    }

    #[test]
    fn test_no_id3_at_all() {
        let input = vec![0xFFu8, 0xFB, 1, 2, 3];
        let tracks = profile(&input).unwrap();
        assert_eq!(tracks[0].1.data_length, 5);
    }
}
