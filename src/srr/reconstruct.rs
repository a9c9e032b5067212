//! `SrrReconstructor`: replays an SRR byte stream and splices external
//! source files back in where `FileHeader` payloads were stripped.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::crc::Crc32;
use crate::error::{RescError, RescResult};
use crate::progress::{CancellationToken, NeverCancel, NullReporter, ProgressInfo, Reporter};
use crate::rar_scan::{rar4_type, LONG_BLOCK};
use crate::read::{read_u16, read_u32, read_vec};

use super::blocks::{self, tag};

const SPLIT_BEFORE: u16 = 0x0001;
const SPLIT_AFTER: u16 = 0x0002;
const LARGE: u16 = 0x0100;

/// Chunk size used when splicing a source file's bytes into the output,
/// and the cadence at which cancellation is checked during the copy.
const SPLICE_CHUNK: usize = 80 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashType {
    Crc32,
    Sha1,
}

/// Explicit state machine for the current-source-file tracking across
/// `SPLIT_BEFORE`/`SPLIT_AFTER` transitions, per the redesign note in §9.
#[derive(Debug, PartialEq, Eq)]
enum State {
    NoVolume,
    VolumeOpen,
    SplicingFile { archived_name: String },
}

#[derive(Debug, Clone)]
pub struct ReconstructResult {
    pub all_matched: bool,
    pub completed_volumes: Vec<PathBuf>,
}

pub fn reconstruct(
    srr_path: &Path,
    input_directory: &Path,
    output_directory: &Path,
    hashes: &HashSet<String>,
    hash_type: HashType,
) -> RescResult<ReconstructResult> {
    reconstruct_with(
        srr_path,
        input_directory,
        output_directory,
        hashes,
        hash_type,
        &NeverCancel,
        &mut NullReporter,
    )
}

pub fn reconstruct_with(
    srr_path: &Path,
    input_directory: &Path,
    output_directory: &Path,
    hashes: &HashSet<String>,
    hash_type: HashType,
    cancel: &dyn CancellationToken,
    reporter: &mut dyn Reporter,
) -> RescResult<ReconstructResult> {
    fs::create_dir_all(output_directory)?;

    let mut srr = BufReader::new(File::open(srr_path)?);

    let mut state = State::NoVolume;
    let mut out: Option<BufWriter<File>> = None;
    let mut out_path: Option<PathBuf> = None;
    let mut source: Option<BufReader<File>> = None;

    let mut all_matched = true;
    let mut completed_volumes = Vec::new();

    loop {
        crate::progress::check_cancelled(cancel)?;

        let header = match blocks::read_base_header(&mut srr) {
            Ok(h) => h,
            Err(RescError::UnexpectedEof) => break,
            Err(e) => return Err(e),
        };

        let mut content = read_vec(&mut srr, header.header_size.saturating_sub(7) as usize)?;

        match header.tag {
            tag::SRR_HEADER | tag::SRR_OSO_HASH => {
                // No trailing payload beyond the header itself.
            }
            tag::SRR_STORED_FILE => {
                let add_size = u32::from_le_bytes(content[0..4].try_into().unwrap());
                let _ = read_vec(&mut srr, add_size as usize)?;
            }
            tag::SRR_RAR_PADDING => {
                let add_size = u32::from_le_bytes(content[0..4].try_into().unwrap());
                if let Some(w) = out.as_mut() {
                    copy_zero_bytes(w, add_size as u64)?;
                }
            }
            tag::SRR_RAR_FILE => {
                if let (Some(mut w), Some(path)) = (out.take(), out_path.take()) {
                    w.flush()?;
                    drop(w);
                    completed_volumes.push(path.clone());
                    if !verify_volume_hash(&path, hashes, hash_type)? {
                        all_matched = false;
                        let message = format!("hash mismatch for {}", path.display());
                        log::warn!("{message}");
                        reporter.log(crate::progress::Level::Warn, &message);
                    }
                }

                let mut cursor = io::Cursor::new(&content[..]);
                let name_len = read_u16(&mut cursor)? as usize;
                let name = String::from_utf8_lossy(&content[2..2 + name_len]).into_owned();

                let new_path = output_directory.join(&name);
                out = Some(BufWriter::new(File::create(&new_path)?));
                out_path = Some(new_path);
                state = State::VolumeOpen;

                reporter.report_progress(ProgressInfo {
                    current: completed_volumes.len() as u64,
                    total: 0,
                    message: format!("reconstructing {name}"),
                });
            }
            rar4_type::FILE if out.is_some() => {
                let base = base_header_bytes(&header, &content);
                let w = out.as_mut().expect("checked above");
                w.write_all(&base)?;
                w.write_all(&content)?;

                splice_file_header(
                    &content,
                    header.flags,
                    &mut state,
                    &mut source,
                    input_directory,
                    w,
                    cancel,
                )?;
            }
            rar4_type::SERVICE if out.is_some() => {
                let base = base_header_bytes(&header, &content);
                let w = out.as_mut().expect("checked above");
                w.write_all(&base)?;
                w.write_all(&content)?;

                if header.flags & LONG_BLOCK != 0 && content.len() >= 4 {
                    let add_size = u32::from_le_bytes(content[0..4].try_into().unwrap());
                    let body = read_vec(&mut srr, add_size as usize)?;
                    w.write_all(&body)?;
                }
            }
            _ if out.is_some() => {
                let base = base_header_bytes(&header, &content);
                let w = out.as_mut().expect("checked above");
                w.write_all(&base)?;
                w.write_all(&content)?;

                if header.flags & LONG_BLOCK != 0 && content.len() >= 4 {
                    let add_size = u32::from_le_bytes(content[0..4].try_into().unwrap());
                    let body = read_vec(&mut srr, add_size as usize)?;
                    w.write_all(&body)?;
                }
            }
            _ => {
                // No output stream open yet and this isn't an SRR block:
                // nothing sensible to do with it but skip past its header.
            }
        }
    }

    if let (Some(mut w), Some(path)) = (out.take(), out_path.take()) {
        w.flush()?;
        drop(w);
        completed_volumes.push(path.clone());
        if !verify_volume_hash(&path, hashes, hash_type)? {
            all_matched = false;
            log::warn!("hash mismatch for {}", path.display());
        }
    }

    let _ = state;

    Ok(ReconstructResult {
        all_matched,
        completed_volumes,
    })
}

/// Reproduce the original 7-byte base header verbatim for a copied RAR
/// block (its `crc` field is a real checksum, not an SRR sentinel, and must
/// survive byte for byte).
fn base_header_bytes(header: &blocks::BaseHeader, content: &[u8]) -> [u8; 7] {
    let header_size = 7 + content.len() as u16;
    let mut out = [0u8; 7];
    out[0..2].copy_from_slice(&header.crc.to_le_bytes());
    out[2] = header.tag;
    out[3..5].copy_from_slice(&header.flags.to_le_bytes());
    out[5..7].copy_from_slice(&header_size.to_le_bytes());
    out
}

#[allow(clippy::too_many_arguments)]
fn splice_file_header(
    content: &[u8],
    flags: u16,
    state: &mut State,
    source: &mut Option<BufReader<File>>,
    input_directory: &Path,
    out: &mut BufWriter<File>,
    cancel: &dyn CancellationToken,
) -> RescResult<()> {
    // `content` starts right after the 7-byte base header, i.e. at the
    // FileHeader's offset 7 in the original layout.
    let packed_low = u32::from_le_bytes(content[0..4].try_into().unwrap()) as u64;
    let name_size = u16::from_le_bytes(content[19..21].try_into().unwrap()) as usize;

    let is_large = flags & LARGE != 0;
    let packed_size = if is_large && content.len() >= 29 {
        let high = u32::from_le_bytes(content[25..29].try_into().unwrap()) as u64;
        packed_low | (high << 32)
    } else {
        packed_low
    };

    let name_offset = if is_large && content.len() >= 33 + name_size {
        33
    } else {
        25
    };
    let raw_name = content
        .get(name_offset..name_offset + name_size)
        .unwrap_or(&[]);
    let nul_trimmed = raw_name.split(|&b| b == 0).next().unwrap_or(&[]);
    let archived_name = String::from_utf8_lossy(nul_trimmed).replace('\\', std::path::MAIN_SEPARATOR_STR);

    let needs_new_source = match state {
        State::SplicingFile { archived_name: cur } => cur != &archived_name,
        _ => true,
    };

    if flags & SPLIT_BEFORE == 0 && needs_new_source {
        *source = None;
        let path = locate_source_file(input_directory, &archived_name)?;
        *source = Some(BufReader::new(File::open(path)?));
        *state = State::SplicingFile {
            archived_name: archived_name.clone(),
        };
    }

    if packed_size > 0 {
        let src = source
            .as_mut()
            .ok_or_else(|| RescError::NotFound(archived_name.clone()))?;
        copy_exact(src, out, packed_size, cancel)?;
    }

    if flags & SPLIT_AFTER == 0 {
        *source = None;
        *state = State::VolumeOpen;
    }

    Ok(())
}

fn copy_exact<R: Read, W: Write>(
    src: &mut R,
    dst: &mut W,
    mut remaining: u64,
    cancel: &dyn CancellationToken,
) -> RescResult<()> {
    let mut buf = [0u8; SPLICE_CHUNK];
    while remaining > 0 {
        crate::progress::check_cancelled(cancel)?;
        let want = remaining.min(buf.len() as u64) as usize;
        src.read_exact(&mut buf[..want])?;
        dst.write_all(&buf[..want])?;
        remaining -= want as u64;
    }
    Ok(())
}

fn copy_zero_bytes<W: Write>(dst: &mut W, mut remaining: u64) -> io::Result<()> {
    let zeros = [0u8; 4096];
    while remaining > 0 {
        let want = remaining.min(zeros.len() as u64) as usize;
        dst.write_all(&zeros[..want])?;
        remaining -= want as u64;
    }
    Ok(())
}

/// Source file lookup, in order: relative path under `input_directory`,
/// then flattened basename, then a case-insensitive recursive search.
fn locate_source_file(input_directory: &Path, archived_name: &str) -> RescResult<PathBuf> {
    let direct = input_directory.join(archived_name);
    if direct.is_file() {
        return Ok(direct);
    }

    let basename = Path::new(archived_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archived_name.to_string());

    let flattened = input_directory.join(&basename);
    if flattened.is_file() {
        return Ok(flattened);
    }

    let search_root = Path::new(archived_name)
        .parent()
        .map(|p| input_directory.join(p))
        .filter(|p| p.is_dir())
        .unwrap_or_else(|| input_directory.to_path_buf());

    if let Some(found) = find_case_insensitive(&search_root, &basename) {
        return Ok(found);
    }

    Err(RescError::NotFound(archived_name.to_string()))
}

fn find_case_insensitive(root: &Path, basename: &str) -> Option<PathBuf> {
    let target = basename.to_ascii_lowercase();
    let entries = fs::read_dir(root).ok()?;
    let mut subdirs = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.to_ascii_lowercase() == target {
                return Some(path);
            }
        }
    }

    for dir in subdirs {
        if let Some(found) = find_case_insensitive(&dir, basename) {
            return Some(found);
        }
    }

    None
}

fn verify_volume_hash(
    path: &Path,
    hashes: &HashSet<String>,
    hash_type: HashType,
) -> RescResult<bool> {
    if hashes.is_empty() {
        return Ok(true);
    }

    let mut file = BufReader::new(File::open(path)?);
    let digest = match hash_type {
        HashType::Crc32 => format!("{:08x}", Crc32::of_reader(&mut file)?),
        HashType::Sha1 => {
            let mut hasher = Sha1::new();
            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            hasher
                .finalize()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
        }
    };

    Ok(hashes
        .iter()
        .any(|h| h.eq_ignore_ascii_case(&digest)))
}
