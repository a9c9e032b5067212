//! Container detection and the shared `SrsProfiler` result shape. Each
//! format's actual byte-walk lives in its own module (`avi`, `mkv`, ...).

use crate::crc::Crc32;
use crate::error::{RescError, RescResult};
use crate::srs::track::TrackBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    Avi,
    Mkv,
    Mp4,
    Wmv,
    Flac,
    Mp3,
    Stream,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub number: u32,
    pub data_length: u64,
    pub signature: Vec<u8>,
}

impl From<(u32, TrackBuilder)> for Track {
    fn from((number, builder): (u32, TrackBuilder)) -> Self {
        Track {
            number,
            data_length: builder.data_length,
            signature: builder.signature,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileResult {
    pub container_type: ContainerType,
    pub tracks: Vec<Track>,
    pub crc32: u32,
    pub sample_size: u64,
}

/// Detect a container by file extension first (authoritative for the
/// formats whose magic bytes are ambiguous or absent, e.g. raw streams),
/// falling back to magic-byte sniffing.
pub fn detect_container_type(file_name: &str, data: &[u8]) -> RescResult<ContainerType> {
    let ext = file_name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();

    match ext.as_str() {
        "avi" => return Ok(ContainerType::Avi),
        "mkv" | "webm" => return Ok(ContainerType::Mkv),
        "mp4" | "m4v" | "mov" => return Ok(ContainerType::Mp4),
        "wmv" | "asf" => return Ok(ContainerType::Wmv),
        "flac" => return Ok(ContainerType::Flac),
        "mp3" => return Ok(ContainerType::Mp3),
        "vob" | "m2ts" | "mts" | "ts" | "evo" | "mpg" | "mpeg" => {
            return Ok(ContainerType::Stream)
        }
        _ => {}
    }

    sniff_container_type(data)
}

fn sniff_container_type(data: &[u8]) -> RescResult<ContainerType> {
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"AVI " {
        return Ok(ContainerType::Avi);
    }
    if data.len() >= 4 && data[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return Ok(ContainerType::Mkv);
    }
    if data.len() >= 8 && &data[4..8] == b"ftyp" {
        return Ok(ContainerType::Mp4);
    }
    if data.len() >= 16
        && data[0..16]
            == [
                0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00,
                0x62, 0xCE, 0x6C,
            ]
    {
        return Ok(ContainerType::Wmv);
    }
    if data.len() >= 4 && &data[0..4] == b"fLaC" {
        return Ok(ContainerType::Flac);
    }
    if (data.len() >= 3 && &data[0..3] == b"ID3")
        || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0)
    {
        return Ok(ContainerType::Mp3);
    }

    Err(RescError::Unsupported(
        "no known container magic matched".into(),
    ))
}

/// Run the per-format profiler over a fully-loaded sample file.
pub fn profile(file_name: &str, data: &[u8]) -> RescResult<ProfileResult> {
    let container_type = detect_container_type(file_name, data)?;
    log::debug!("profiling {file_name} as {container_type:?}, {} bytes", data.len());

    let tracks = match container_type {
        ContainerType::Avi => crate::srs::avi::profile(data)?,
        ContainerType::Mkv => crate::srs::mkv::profile(data)?,
        ContainerType::Mp4 => crate::srs::mp4::profile(data)?,
        ContainerType::Wmv => crate::srs::wmv::profile(data)?,
        ContainerType::Flac => crate::srs::flac::profile(data)?,
        ContainerType::Mp3 => crate::srs::mp3::profile(data)?,
        ContainerType::Stream => crate::srs::stream::profile(data)?,
    };

    let crc32 = Crc32::of_reader(data)?;

    let mut tracks: Vec<Track> = tracks.into_iter().map(Track::from).collect();
    tracks.sort_by_key(|t| t.number);

    Ok(ProfileResult {
        container_type,
        tracks,
        crc32,
        sample_size: data.len() as u64,
    })
}
