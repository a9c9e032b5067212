//! Raw stream profiler (VOB/M2TS/MPEG-TS/EVO/MPG): the whole file is track
//! `1`; there is no container structure to classify separately.

use crate::error::RescResult;
use crate::srs::track::TrackBuilder;

pub fn profile(data: &[u8]) -> RescResult<Vec<(u32, TrackBuilder)>> {
    let mut builder = TrackBuilder::default();
    builder.feed(data);

    let mut tracks = Vec::new();
    if builder.data_length > 0 {
        tracks.push((1u32, builder));
    }
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_file_is_one_track() {
        let data = vec![7u8; 1000];
        let tracks = profile(&data).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].0, 1);
        assert_eq!(tracks[0].1.data_length, 1000);
        assert_eq!(tracks[0].1.signature.len(), 256);
    }

    #[test]
    fn test_empty_file_has_no_track() {
        let tracks = profile(&[]).unwrap();
        assert!(tracks.is_empty());
    }
}
