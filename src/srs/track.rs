//! `SrsFileData` (SRSF) and `SrsTrackData` (SRST) records, little-endian
//! throughout, per §3.

use std::io;

use crate::error::RescResult;
use crate::read::{read_string, read_u16, read_u32, read_u64, read_vec};
use crate::write::{write_u16_le, write_u32_le, write_u64_le};

pub const FLAG_SIMPLE_BLOCK_SIZE_FIX: u16 = 0x0001;
pub const FLAG_ATTACHMENTS_REMOVED: u16 = 0x0002;
const DEFAULT_FILE_FLAGS: u16 = FLAG_SIMPLE_BLOCK_SIZE_FIX | FLAG_ATTACHMENTS_REMOVED;

const FLAG_BIG_DATA_LENGTH: u16 = 0x0004;
const FLAG_BIG_TRACK_NUMBER: u16 = 0x0008;

const BIG_DATA_LENGTH_THRESHOLD: u64 = 1 << 31;
const BIG_TRACK_NUMBER_THRESHOLD: u32 = 1 << 16;

#[derive(Debug, Clone)]
pub struct SrsFileData {
    pub flags: u16,
    pub app_name: String,
    pub file_name: String,
    pub sample_size: u64,
    pub crc32: u32,
}

impl SrsFileData {
    pub fn new(app_name: String, file_name: String, sample_size: u64, crc32: u32) -> Self {
        Self {
            flags: DEFAULT_FILE_FLAGS,
            app_name,
            file_name,
            sample_size,
            crc32,
        }
    }

    pub fn write<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        write_u16_le(w, self.flags)?;
        write_u16_le(w, self.app_name.len() as u16)?;
        w.write_all(self.app_name.as_bytes())?;
        write_u16_le(w, self.file_name.len() as u16)?;
        w.write_all(self.file_name.as_bytes())?;
        write_u64_le(w, self.sample_size)?;
        write_u32_le(w, self.crc32)
    }

    pub fn read<R: io::Read>(r: &mut R) -> RescResult<Self> {
        let flags = read_u16(r)?;
        let app_name_len = read_u16(r)? as usize;
        let app_name = read_string(r, app_name_len)?;
        let file_name_len = read_u16(r)? as usize;
        let file_name = read_string(r, file_name_len)?;
        let sample_size = read_u64(r)?;
        let crc32 = read_u32(r)?;
        Ok(Self {
            flags,
            app_name,
            file_name,
            sample_size,
            crc32,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SrsTrackData {
    pub track_number: u32,
    pub data_length: u64,
    pub match_offset: u64,
    pub signature: Vec<u8>,
}

impl SrsTrackData {
    pub fn new(track_number: u32, data_length: u64, match_offset: u64, signature: Vec<u8>) -> Self {
        Self {
            track_number,
            data_length,
            match_offset,
            signature: signature.into_iter().take(256).collect(),
        }
    }

    fn flags(&self) -> u16 {
        let mut flags = 0u16;
        if self.data_length >= BIG_DATA_LENGTH_THRESHOLD {
            flags |= FLAG_BIG_DATA_LENGTH;
        }
        if self.track_number >= BIG_TRACK_NUMBER_THRESHOLD {
            flags |= FLAG_BIG_TRACK_NUMBER;
        }
        flags
    }

    pub fn write<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        let flags = self.flags();
        write_u16_le(w, flags)?;

        if flags & FLAG_BIG_TRACK_NUMBER != 0 {
            write_u32_le(w, self.track_number)?;
        } else {
            write_u16_le(w, self.track_number as u16)?;
        }

        if flags & FLAG_BIG_DATA_LENGTH != 0 {
            write_u64_le(w, self.data_length)?;
        } else {
            write_u32_le(w, self.data_length as u32)?;
        }

        write_u64_le(w, self.match_offset)?;
        write_u16_le(w, self.signature.len() as u16)?;
        w.write_all(&self.signature)
    }

    pub fn read<R: io::Read>(r: &mut R) -> RescResult<Self> {
        let flags = read_u16(r)?;

        let track_number = if flags & FLAG_BIG_TRACK_NUMBER != 0 {
            read_u32(r)?
        } else {
            read_u16(r)? as u32
        };

        let data_length = if flags & FLAG_BIG_DATA_LENGTH != 0 {
            read_u64(r)?
        } else {
            read_u32(r)? as u64
        };

        let match_offset = read_u64(r)?;
        let sig_len = read_u16(r)? as usize;
        let signature = read_vec(r, sig_len)?;

        Ok(Self {
            track_number,
            data_length,
            match_offset,
            signature,
        })
    }
}

/// Shared helper used by every per-format profiler: accumulates a track's
/// total payload length and the first ≤256 bytes of its signature.
#[derive(Debug, Clone, Default)]
pub struct TrackBuilder {
    pub data_length: u64,
    pub signature: Vec<u8>,
}

impl TrackBuilder {
    pub fn feed(&mut self, chunk: &[u8]) {
        self.data_length += chunk.len() as u64;
        if self.signature.len() < 256 {
            let take = (256 - self.signature.len()).min(chunk.len());
            self.signature.extend_from_slice(&chunk[..take]);
        }
    }

    pub fn into_track_data(self, track_number: u32) -> SrsTrackData {
        SrsTrackData::new(track_number, self.data_length, 0, self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_file_data_round_trip() {
        let data = SrsFileData::new("resc".into(), "sample.avi".into(), 12345, 0xDEADBEEF);
        let mut buf = Vec::new();
        data.write(&mut buf).unwrap();

        let parsed = SrsFileData::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(parsed.app_name, "resc");
        assert_eq!(parsed.file_name, "sample.avi");
        assert_eq!(parsed.sample_size, 12345);
        assert_eq!(parsed.crc32, 0xDEADBEEF);
        assert_eq!(parsed.flags, DEFAULT_FILE_FLAGS);
    }

    #[test]
    fn test_track_data_small_round_trip() {
        let data = SrsTrackData::new(1, 512, 0, vec![0xAB; 256]);
        let mut buf = Vec::new();
        data.write(&mut buf).unwrap();

        let parsed = SrsTrackData::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(parsed.track_number, 1);
        assert_eq!(parsed.data_length, 512);
        assert_eq!(parsed.signature.len(), 256);
    }

    #[test]
    fn test_track_data_big_fields_set_flags() {
        let data = SrsTrackData::new(70000, 1 << 32, 0, vec![]);
        let mut buf = Vec::new();
        data.write(&mut buf).unwrap();

        let parsed = SrsTrackData::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(parsed.track_number, 70000);
        assert_eq!(parsed.data_length, 1 << 32);
    }

    #[test]
    fn test_track_builder_caps_signature_at_256() {
        let mut builder = TrackBuilder::default();
        builder.feed(&vec![1u8; 200]);
        builder.feed(&vec![2u8; 200]);
        assert_eq!(builder.data_length, 400);
        assert_eq!(builder.signature.len(), 256);
    }
}
