//! Minimal SFV (Simple File Verification) parsing: `filename crc32` pairs,
//! one per line, `;`-prefixed comments ignored. Used by
//! [`create_srr_from_sfv`] to discover a volume set without the caller
//! having to enumerate it by hand.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RescError, RescResult};
use crate::progress::{CancellationToken, NeverCancel, NullReporter, Reporter};
use crate::srr::volume_order::sort_rar_volumes;
use crate::srr::writer::{create_srr_with, SrrCreateResult, SrrOptions};

/// One `filename | crc32` entry from an SFV listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfvEntry {
    pub file_name: String,
    pub crc32: u32,
}

/// Parse an SFV file's text: every non-blank, non-`;`-comment line is
/// `filename whitespace crc32hex`, the CRC in the last whitespace-delimited
/// field and the filename everything before it (so names containing spaces
/// still parse).
pub fn parse_sfv(text: &str) -> RescResult<Vec<SfvEntry>> {
    let mut entries = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        let split_at = line
            .rfind(char::is_whitespace)
            .ok_or_else(|| RescError::Malformed(format!("malformed SFV line: {line}")))?;
        let (name_part, crc_part) = line.split_at(split_at);
        let crc_part = crc_part.trim();
        let crc32 = u32::from_str_radix(crc_part, 16)
            .map_err(|_| RescError::Malformed(format!("malformed SFV crc32: {crc_part}")))?;

        entries.push(SfvEntry {
            file_name: name_part.trim().to_string(),
            crc32,
        });
    }

    Ok(entries)
}

/// Build an SRR from the volume set named by an SFV listing: reads and
/// parses `sfv_path`, resolves each entry relative to the SFV's own
/// directory, keeps only `.r??`/`.part??.rar`/numeric-extension/`.rar`
/// names recognized by [`sort_rar_volumes`], sorts them into volume order,
/// then delegates to [`create_srr`](crate::srr::create_srr).
///
/// `extra_files` are embedded as SRR stored files alongside the volumes,
/// keyed by their file name.
pub fn create_srr_from_sfv(
    output_path: &Path,
    sfv_path: &Path,
    extra_files: &[PathBuf],
    options: &SrrOptions,
) -> RescResult<SrrCreateResult> {
    create_srr_from_sfv_with(
        output_path,
        sfv_path,
        extra_files,
        options,
        &NeverCancel,
        &mut NullReporter,
    )
}

pub fn create_srr_from_sfv_with(
    output_path: &Path,
    sfv_path: &Path,
    extra_files: &[PathBuf],
    options: &SrrOptions,
    cancel: &dyn CancellationToken,
    reporter: &mut dyn Reporter,
) -> RescResult<SrrCreateResult> {
    if !sfv_path.is_file() {
        return Err(RescError::NotFound(sfv_path.display().to_string()));
    }

    let text = fs::read_to_string(sfv_path)?;
    let entries = parse_sfv(&text)?;

    let base_dir = sfv_path.parent().unwrap_or_else(|| Path::new("."));
    let mut volumes: Vec<PathBuf> = entries
        .iter()
        .map(|entry| base_dir.join(&entry.file_name))
        .collect();
    sort_rar_volumes(&mut volumes);

    let stored_files: Vec<(String, PathBuf)> = extra_files
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            (name, path.clone())
        })
        .collect();

    create_srr_with(
        output_path,
        &volumes,
        &stored_files,
        options,
        cancel,
        reporter,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sfv_skips_comments_and_blank_lines() {
        let text = "; this is a comment\n\nmovie.part1.rar a1b2c3d4\nmovie.part2.rar 0000BEEF\n";
        let entries = parse_sfv(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name, "movie.part1.rar");
        assert_eq!(entries[0].crc32, 0xa1b2c3d4);
        assert_eq!(entries[1].crc32, 0x0000beef);
    }

    #[test]
    fn test_parse_sfv_handles_spaces_in_filename() {
        let text = "My Movie File.rar deadbeef\n";
        let entries = parse_sfv(text).unwrap();
        assert_eq!(entries[0].file_name, "My Movie File.rar");
        assert_eq!(entries[0].crc32, 0xdeadbeef);
    }

    #[test]
    fn test_parse_sfv_rejects_line_without_crc() {
        let text = "onlyonefield\n";
        assert!(parse_sfv(text).is_err());
    }

    #[test]
    fn test_parse_sfv_rejects_non_hex_crc() {
        let text = "file.rar nothex\n";
        assert!(parse_sfv(text).is_err());
    }
}
