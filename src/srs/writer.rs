//! `SrsWriter`: emits an SRS file isomorphic to the profiled container, with
//! A/V payload chunks dropped and an `SrsFileData`/`SrsTrackData` set
//! injected at the format's canonical site, per §4.5.

use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::ebml::build_element;
use crate::error::{RescError, RescResult};
use crate::progress::{CancellationToken, NeverCancel, NullReporter, ProgressInfo, Reporter};
use crate::read::{read_u32, read_u32_be, read_u64, read_u64_be, read_vec};
use crate::srs::profiler::{self, ContainerType};
use crate::srs::track::{SrsFileData, SrsTrackData};
use crate::write::write_u24_be;

#[derive(Debug, Clone)]
pub struct SrsOptions {
    pub app_name: String,
}

impl Default for SrsOptions {
    fn default() -> Self {
        Self {
            app_name: "rescene-core".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SrsCreateResult {
    pub success: bool,
    pub output_path: PathBuf,
    pub container_type: ContainerType,
    pub track_count: usize,
    pub sample_crc32: u32,
    pub sample_size: u64,
    pub srs_file_size: u64,
    pub warnings: Vec<String>,
}

pub fn create_srs(
    output_path: &Path,
    sample_path: &Path,
    options: &SrsOptions,
) -> RescResult<SrsCreateResult> {
    create_srs_with(
        output_path,
        sample_path,
        options,
        &NeverCancel,
        &mut NullReporter,
    )
}

pub fn create_srs_with(
    output_path: &Path,
    sample_path: &Path,
    options: &SrsOptions,
    cancel: &dyn CancellationToken,
    reporter: &mut dyn Reporter,
) -> RescResult<SrsCreateResult> {
    if !sample_path.is_file() {
        return Err(RescError::NotFound(sample_path.display().to_string()));
    }

    match run_create(output_path, sample_path, options, cancel, reporter) {
        Ok(result) => Ok(result),
        Err(e) => {
            let _ = fs::remove_file(output_path);
            Err(e)
        }
    }
}

fn run_create(
    output_path: &Path,
    sample_path: &Path,
    options: &SrsOptions,
    cancel: &dyn CancellationToken,
    reporter: &mut dyn Reporter,
) -> RescResult<SrsCreateResult> {
    let data = fs::read(sample_path)?;
    crate::progress::check_cancelled(cancel)?;

    let file_name = sample_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| sample_path.display().to_string());

    reporter.report_progress(ProgressInfo {
        current: 0,
        total: 2,
        message: format!("profiling {file_name}"),
    });

    let profile = profiler::profile(&file_name, &data)?;
    crate::progress::check_cancelled(cancel)?;

    let file_data = SrsFileData::new(
        options.app_name.clone(),
        file_name.clone(),
        profile.sample_size,
        profile.crc32,
    );

    let tracks: Vec<SrsTrackData> = profile
        .tracks
        .iter()
        .map(|t| SrsTrackData::new(t.number, t.data_length, 0, t.signature.clone()))
        .collect();

    reporter.report_progress(ProgressInfo {
        current: 1,
        total: 2,
        message: format!("writing SRS for {file_name}"),
    });

    let out_bytes = match profile.container_type {
        ContainerType::Avi => avi::rebuild(&data, &file_data, &tracks)?,
        ContainerType::Mkv => mkv::rebuild(&data, &file_data, &tracks)?,
        ContainerType::Mp4 => mp4::rebuild(&data, &file_data, &tracks)?,
        ContainerType::Wmv => wmv::rebuild(&data, &file_data, &tracks)?,
        ContainerType::Flac => flac::rebuild(&data, &file_data, &tracks)?,
        ContainerType::Mp3 => mp3::rebuild(&data, &file_data, &tracks)?,
        ContainerType::Stream => stream::rebuild(&file_data, &tracks)?,
    };

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut out = BufWriter::new(File::create(output_path)?);
    out.write_all(&out_bytes)?;
    out.flush()?;
    let srs_file_size = out.get_ref().metadata()?.len();

    Ok(SrsCreateResult {
        success: true,
        output_path: output_path.to_path_buf(),
        container_type: profile.container_type,
        track_count: profile.tracks.len(),
        sample_crc32: profile.crc32,
        sample_size: profile.sample_size,
        srs_file_size,
        warnings: Vec::new(),
    })
}

fn srsf_bytes(file_data: &SrsFileData) -> Vec<u8> {
    let mut buf = Vec::new();
    file_data.write(&mut buf).expect("write to Vec never fails");
    buf
}

fn srst_bytes(track: &SrsTrackData) -> Vec<u8> {
    let mut buf = Vec::new();
    track.write(&mut buf).expect("write to Vec never fails");
    buf
}

/// AVI: SRSF/SRST wrapped as ordinary RIFF chunks (`fourcc | size | body`,
/// even-padded), injected as the first children of `LIST movi`.
mod avi {
    use super::*;

    const CONTAINER_FOURCC: [&[u8; 4]; 2] = [b"RIFF", b"LIST"];

    fn stream_track_number(fourcc: &[u8; 4]) -> Option<u32> {
        let d0 = (fourcc[0] as char).to_digit(10)?;
        let d1 = (fourcc[1] as char).to_digit(10)?;
        if !fourcc[2].is_ascii_alphabetic() || !fourcc[3].is_ascii_alphabetic() {
            return None;
        }
        Some(d0 * 10 + d1)
    }

    fn write_riff_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(fourcc);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
    }

    fn injection(file_data: &SrsFileData, tracks: &[SrsTrackData]) -> Vec<u8> {
        let mut out = Vec::new();
        write_riff_chunk(&mut out, b"SRSF", &srsf_bytes(file_data));
        for track in tracks {
            write_riff_chunk(&mut out, b"SRST", &srst_bytes(track));
        }
        out
    }

    pub fn rebuild(
        data: &[u8],
        file_data: &SrsFileData,
        tracks: &[SrsTrackData],
    ) -> RescResult<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let mut injected = Some(injection(file_data, tracks));
        let mut out = Vec::new();
        walk(&mut reader, data.len() as u64, &mut injected, &mut out)?;
        Ok(out)
    }

    fn walk<R: Read + Seek>(
        reader: &mut R,
        end: u64,
        injected: &mut Option<Vec<u8>>,
        out: &mut Vec<u8>,
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
                let sub_type: [u8; 4] = read_vec(reader, 4)?.try_into().unwrap();
                let mut child_buf = Vec::new();
                if &sub_type == b"movi" {
                    if let Some(inj) = injected.take() {
                        child_buf.extend_from_slice(&inj);
                    }
                }
                walk(reader, body_end, injected, &mut child_buf)?;

                let mut body = sub_type.to_vec();
                body.extend_from_slice(&child_buf);
                write_riff_chunk(out, &fourcc, &body);
            } else if stream_track_number(&fourcc).is_some() {
                // A/V payload: dropped entirely.
            } else {
                out.extend_from_slice(&fourcc);
                out.extend_from_slice(&size.to_le_bytes());
                out.extend_from_slice(&data_slice(reader, body_start, body_end)?);
                if size % 2 == 1 && body_end < end {
                    out.extend_from_slice(&data_slice(reader, body_end, body_end + 1)?);
                    reader.seek(SeekFrom::Start(body_end + 1))?;
                    continue;
                }
            }

            reader.seek(SeekFrom::Start(body_end))?;
        }
        Ok(())
    }

    fn data_slice<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let saved = reader.stream_position()?;
        reader.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; (end - start) as usize];
        reader.read_exact(&mut buf)?;
        reader.seek(SeekFrom::Start(saved))?;
        Ok(buf)
    }
}

/// MKV: SRSF/SRST wrapped in a `ReSample (0x1F697576)` container element
/// holding one `RESAMPLE_FILE (0x6A75)` and one `RESAMPLE_TRACK (0x6B75)`
/// per track, injected as the first child of `Segment`.
mod mkv {
    use super::*;
    use crate::ebml::{read_data_size, read_element_id};

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
    const RESAMPLE: u64 = 0x1F697576;
    const RESAMPLE_FILE: u64 = 0x6A75;
    const RESAMPLE_TRACK: u64 = 0x6B75;

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

    fn injection_element(file_data: &SrsFileData, tracks: &[SrsTrackData]) -> Vec<u8> {
        let mut body = build_element(RESAMPLE_FILE, &srsf_bytes(file_data));
        for track in tracks {
            body.extend(build_element(RESAMPLE_TRACK, &srst_bytes(track)));
        }
        build_element(RESAMPLE, &body)
    }

    pub fn rebuild(
        data: &[u8],
        file_data: &SrsFileData,
        tracks: &[SrsTrackData],
    ) -> RescResult<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let mut injected = Some(injection_element(file_data, tracks));
        let mut out = Vec::new();
        walk(&mut reader, data.len() as u64, &mut injected, &mut out)?;
        Ok(out)
    }

    fn walk<R: Read + Seek>(
        reader: &mut R,
        end: u64,
        injected: &mut Option<Vec<u8>>,
        out: &mut Vec<u8>,
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
                // A/V frame data: dropped entirely.
            } else if is_container(id) {
                let mut child_buf = Vec::new();
                if id == SEGMENT {
                    if let Some(inj) = injected.take() {
                        child_buf.extend_from_slice(&inj);
                    }
                }
                walk(reader, body_end, injected, &mut child_buf)?;
                out.extend(build_element(id, &child_buf));
            } else {
                let body = read_vec(reader, size as usize)?;
                out.extend(build_element(id, &body));
            }

            reader.seek(SeekFrom::Start(body_end))?;
        }
        Ok(())
    }
}

/// MP4: SRSF/SRST as plain atoms (`size32(BE) | type(4) | body`) placed
/// immediately before the first `mdat`, whose own header survives verbatim
/// with its payload dropped.
mod mp4 {
    use super::*;

    const CONTAINER_ATOMS: [&[u8; 4]; 7] =
        [b"moov", b"trak", b"mdia", b"minf", b"stbl", b"edts", b"udta"];
    const META_LIKE_ATOMS: [&[u8; 4]; 2] = [b"meta", b"ilst"];

    fn write_atom(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(&(8 + body.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
    }

    fn injection(file_data: &SrsFileData, tracks: &[SrsTrackData]) -> Vec<u8> {
        let mut out = Vec::new();
        write_atom(&mut out, b"SRSF", &srsf_bytes(file_data));
        for track in tracks {
            write_atom(&mut out, b"SRST", &srst_bytes(track));
        }
        out
    }

    pub fn rebuild(
        data: &[u8],
        file_data: &SrsFileData,
        tracks: &[SrsTrackData],
    ) -> RescResult<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let mut injected = Some(injection(file_data, tracks));
        let mut out = Vec::new();
        walk(&mut reader, data.len() as u64, &mut injected, &mut out)?;
        Ok(out)
    }

    fn walk<R: Read + Seek>(
        reader: &mut R,
        end: u64,
        injected: &mut Option<Vec<u8>>,
        out: &mut Vec<u8>,
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
                (16u64, size64.checked_sub(16).ok_or_else(|| {
                    RescError::Malformed("MP4 64-bit atom size too small".into())
                })?)
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

            if &atom_type == b"mdat" {
                if let Some(inj) = injected.take() {
                    out.extend_from_slice(&inj);
                }
                // Header copied verbatim (including the 64-bit size prefix
                // if present); payload dropped.
                let header_bytes = original_header(reader, pos, header_len)?;
                out.extend_from_slice(&header_bytes);
            } else if CONTAINER_ATOMS.contains(&&atom_type) || META_LIKE_ATOMS.contains(&&atom_type)
            {
                let mut child_buf = Vec::new();
                walk(reader, body_end, injected, &mut child_buf)?;
                write_atom(out, &atom_type, &child_buf);
            } else {
                let body = read_vec(reader, body_len as usize)?;
                write_atom(out, &atom_type, &body);
            }

            reader.seek(SeekFrom::Start(body_end))?;
        }
        Ok(())
    }

    fn original_header<R: Read + Seek>(
        reader: &mut R,
        start: u64,
        header_len: u64,
    ) -> io::Result<Vec<u8>> {
        let saved = reader.stream_position()?;
        reader.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; header_len as usize];
        reader.read_exact(&mut buf)?;
        reader.seek(SeekFrom::Start(saved))?;
        Ok(buf)
    }
}

/// WMV: SRSF/SRST as ASF objects with synthetic text GUIDs, placed after
/// the Data Object header (whose packets are stripped entirely and whose
/// size field is rewritten to the header-only length).
mod wmv {
    use super::*;

    const DATA_OBJECT_GUID_PREFIX: [u8; 4] = [0x36, 0x26, 0xB2, 0x75];
    const OBJECT_HEADER_LEN: u64 = 24;
    const DATA_OBJECT_PREFIX_LEN: u64 = 26;
    const SRSF_GUID: &[u8; 16] = b"SRSFSRSFSRSFSRSF";
    const SRST_GUID: &[u8; 16] = b"SRSTSRSTSRSTSRST";

    fn write_object(out: &mut Vec<u8>, guid: &[u8; 16], body: &[u8]) {
        out.extend_from_slice(guid);
        out.extend_from_slice(&(OBJECT_HEADER_LEN + body.len() as u64).to_le_bytes());
        out.extend_from_slice(body);
    }

    pub fn rebuild(
        data: &[u8],
        file_data: &SrsFileData,
        tracks: &[SrsTrackData],
    ) -> RescResult<Vec<u8>> {
        let mut reader = Cursor::new(data);
        let end = data.len() as u64;
        let mut out = Vec::new();

        loop {
            let pos = reader.position();
            if pos >= end {
                break;
            }
            if pos + OBJECT_HEADER_LEN > end {
                return Err(RescError::Malformed("ASF object header past end".into()));
            }

            let guid: [u8; 16] = read_vec(&mut reader, 16)?.try_into().unwrap();
            let size = read_u64(&mut reader)?;
            let object_end = pos
                .checked_add(size)
                .filter(|&e| e <= end)
                .ok_or_else(|| RescError::Malformed("ASF object size exceeds region".into()))?;

            if guid[0..4] == DATA_OBJECT_GUID_PREFIX[..] {
                if object_end - reader.position() < DATA_OBJECT_PREFIX_LEN {
                    return Err(RescError::Malformed(
                        "ASF data object header truncated".into(),
                    ));
                }
                let prefix = read_vec(&mut reader, DATA_OBJECT_PREFIX_LEN as usize)?;

                let mut data_body = Vec::new();
                data_body.extend_from_slice(&prefix);
                write_object(&mut out, &guid, &data_body);

                write_object(&mut out, SRSF_GUID, &srsf_bytes(file_data));
                for track in tracks {
                    write_object(&mut out, SRST_GUID, &srst_bytes(track));
                }
            } else {
                let remaining = object_end - reader.position();
                let body = read_vec(&mut reader, remaining as usize)?;
                write_object(&mut out, &guid, &body);
            }

            reader.set_position(object_end);
        }

        Ok(out)
    }
}

/// FLAC: SRSF/SRST as metadata blocks with type codes `0x73`/`0x74`
/// (never marking the `isLast` bit), inserted between the `fLaC` marker and
/// the original first metadata block; original metadata follows verbatim;
/// frame data is dropped.
mod flac {
    use super::*;

    const MARKER: &[u8; 4] = b"fLaC";
    const SRSF_BLOCK_TYPE: u8 = 0x73;
    const SRST_BLOCK_TYPE: u8 = 0x74;

    fn write_metadata_block(out: &mut Vec<u8>, block_type: u8, is_last: bool, body: &[u8]) {
        out.push(if is_last { block_type | 0x80 } else { block_type });
        write_u24_be(out, body.len() as u32).expect("write to Vec never fails");
        out.extend_from_slice(body);
    }

    pub fn rebuild(
        data: &[u8],
        file_data: &SrsFileData,
        tracks: &[SrsTrackData],
    ) -> RescResult<Vec<u8>> {
        if data.len() < 4 || &data[0..4] != MARKER {
            return Err(RescError::Malformed("missing fLaC marker".into()));
        }

        let mut reader = Cursor::new(data);
        let _marker = read_vec(&mut reader, 4)?;

        let mut out = MARKER.to_vec();
        write_metadata_block(&mut out, SRSF_BLOCK_TYPE, false, &srsf_bytes(file_data));
        for track in tracks {
            write_metadata_block(&mut out, SRST_BLOCK_TYPE, false, &srst_bytes(track));
        }

        loop {
            let type_byte = crate::read::read_u8(&mut reader)?;
            let is_last = type_byte & 0x80 != 0;
            let block_type = type_byte & 0x7F;

            let size_bytes = read_vec(&mut reader, 3)?;
            let size = u32::from_be_bytes([0, size_bytes[0], size_bytes[1], size_bytes[2]]);
            let body = read_vec(&mut reader, size as usize)?;

            write_metadata_block(&mut out, block_type, is_last, &body);

            if is_last {
                break;
            }
        }

        Ok(out)
    }
}

/// MP3: ID3v2 header copied verbatim; `SRSF`/`SRST` wrapped with a 4-byte
/// ASCII tag and 4-byte LE size; ID3v1 tail copied verbatim if present.
mod mp3 {
    use super::*;

    const ID3V2_HEADER_LEN: usize = 10;
    const ID3V1_TAG_LEN: usize = 128;

    fn syncsafe_size(bytes: [u8; 4]) -> usize {
        bytes
            .iter()
            .fold(0usize, |acc, &b| (acc << 7) | (b & 0x7F) as usize)
    }

    fn write_tagged(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(tag);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
    }

    pub fn rebuild(
        data: &[u8],
        file_data: &SrsFileData,
        tracks: &[SrsTrackData],
    ) -> RescResult<Vec<u8>> {
        let audio_start = if data.len() >= ID3V2_HEADER_LEN && &data[0..3] == b"ID3" {
            let size = syncsafe_size(data[6..10].try_into().unwrap());
            (ID3V2_HEADER_LEN + size).min(data.len())
        } else {
            0
        };

        let has_id3v1 = data.len() >= audio_start + ID3V1_TAG_LEN
            && &data[data.len() - ID3V1_TAG_LEN..data.len() - ID3V1_TAG_LEN + 3] == b"TAG";

        let mut out = data[0..audio_start].to_vec();
        write_tagged(&mut out, b"SRSF", &srsf_bytes(file_data));
        for track in tracks {
            write_tagged(&mut out, b"SRST", &srst_bytes(track));
        }
        if has_id3v1 {
            out.extend_from_slice(&data[data.len() - ID3V1_TAG_LEN..]);
        }

        Ok(out)
    }
}

/// Raw stream: `STRM` tag, an LE `0x00000008` marker, the SRSF record, then
/// one SRST per track. No original bytes are preserved.
mod stream {
    use super::*;

    pub fn rebuild(file_data: &SrsFileData, tracks: &[SrsTrackData]) -> RescResult<Vec<u8>> {
        let mut out = b"STRM".to_vec();
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&srsf_bytes(file_data));
        for track in tracks {
            out.extend_from_slice(&srst_bytes(track));
        }
        Ok(out)
    }
}
