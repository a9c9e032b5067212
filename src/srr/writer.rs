//! `SrrWriter::create`: frames a RAR volume set plus embedded auxiliary
//! files into an SRR file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{RescError, RescResult};
use crate::progress::{CancellationToken, Level, NeverCancel, NullReporter, ProgressInfo, Reporter};
use crate::rar_scan::{self, detect_format, rar4_type, RarBlockScanner, RarFormat};

use super::blocks;

/// CMT (archive comment) service sub-type: the only RAR4 `Service`/RAR5
/// `Service` payload the writer keeps.
const CMT_SUBTYPE: &[u8; 3] = b"CMT";

#[derive(Debug, Clone)]
pub struct SrrOptions {
    /// Defaults to a single canonical literal identifying the writer.
    pub app_name: String,
    /// Store the caller-given path instead of just the basename for
    /// embedded stored files.
    pub store_paths: bool,
    /// Whether non-Store compression methods should be treated as a
    /// (logged) warning instead of left unremarked.
    pub allow_compressed: bool,
    pub compute_oso_hashes: bool,
}

impl Default for SrrOptions {
    fn default() -> Self {
        Self {
            app_name: "rescene-core".to_string(),
            store_paths: false,
            allow_compressed: true,
            compute_oso_hashes: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SrrCreateResult {
    pub success: bool,
    pub output_path: PathBuf,
    pub volume_count: usize,
    pub stored_file_count: usize,
    pub srr_file_size: u64,
    pub warnings: Vec<String>,
}

pub fn create_srr(
    output_path: &Path,
    volumes: &[PathBuf],
    stored_files: &[(String, PathBuf)],
    options: &SrrOptions,
) -> RescResult<SrrCreateResult> {
    create_srr_with(
        output_path,
        volumes,
        stored_files,
        options,
        &NeverCancel,
        &mut NullReporter,
    )
}

pub fn create_srr_with(
    output_path: &Path,
    volumes: &[PathBuf],
    stored_files: &[(String, PathBuf)],
    options: &SrrOptions,
    cancel: &dyn CancellationToken,
    reporter: &mut dyn Reporter,
) -> RescResult<SrrCreateResult> {
    for (_, path) in stored_files {
        if !path.exists() {
            return Err(RescError::NotFound(path.display().to_string()));
        }
    }
    for path in volumes {
        if !path.exists() {
            return Err(RescError::NotFound(path.display().to_string()));
        }
    }

    match run_create(output_path, volumes, stored_files, options, cancel, reporter) {
        Ok(result) => Ok(result),
        Err(e) => {
            let _ = fs::remove_file(output_path);
            Err(e)
        }
    }
}

fn run_create(
    output_path: &Path,
    volumes: &[PathBuf],
    stored_files: &[(String, PathBuf)],
    options: &SrrOptions,
    cancel: &dyn CancellationToken,
    reporter: &mut dyn Reporter,
) -> RescResult<SrrCreateResult> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut out = BufWriter::new(File::create(output_path)?);
    let app_name = if options.app_name.is_empty() {
        None
    } else {
        Some(options.app_name.as_str())
    };
    blocks::write_srr_header(&mut out, app_name)?;

    let mut stored_file_count = 0usize;
    for (name, path) in stored_files {
        crate::progress::check_cancelled(cancel)?;

        let display_name = if options.store_paths {
            name.clone()
        } else {
            Path::new(name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone())
        };

        let bytes = fs::read(path)?;
        blocks::write_srr_stored_file_header(&mut out, &display_name, bytes.len() as u32)?;
        out.write_all(&bytes)?;
        stored_file_count += 1;
    }

    let mut warnings = Vec::new();

    for (index, volume_path) in volumes.iter().enumerate() {
        crate::progress::check_cancelled(cancel)?;
        reporter.report_progress(ProgressInfo {
            current: index as u64,
            total: volumes.len() as u64,
            message: format!(
                "copying headers from {}",
                volume_path.display()
            ),
        });

        let volume_name = volume_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| volume_path.display().to_string());
        blocks::write_srr_rar_file(&mut out, &volume_name)?;

        copy_volume_blocks(volume_path, &mut out, options, cancel, &mut warnings)?;
    }

    out.flush()?;
    let srr_file_size = out.get_ref().metadata()?.len();

    Ok(SrrCreateResult {
        success: true,
        output_path: output_path.to_path_buf(),
        volume_count: volumes.len(),
        stored_file_count,
        srr_file_size,
        warnings,
    })
}

fn copy_volume_blocks<W: Write>(
    volume_path: &Path,
    out: &mut W,
    options: &SrrOptions,
    cancel: &dyn CancellationToken,
    warnings: &mut Vec<String>,
) -> RescResult<()> {
    let mut file = File::open(volume_path)?;
    let (format, marker) = detect_format(&mut file)?;
    out.write_all(&marker)?;

    let first_block_offset = marker.len() as u64;
    let mut scanner = RarBlockScanner::new(file, format, first_block_offset)?;

    loop {
        crate::progress::check_cancelled(cancel)?;

        let Some(block) = scanner.next() else {
            break;
        };
        let mut block = block?;

        log::debug!(
            "block at offset {}: type 0x{:02x}, payload {} bytes",
            block.offset,
            block.block_type,
            block.payload_size
        );

        let keep_payload = should_keep_payload(&block, format, options, warnings);

        // `FileHeader`'s `addSize` is the reconstructor's only record of how
        // many bytes to splice back in from the matching source file, so it
        // must survive verbatim even though the payload itself is dropped.
        // A dropped `Service` payload has no source to re-splice from, so
        // its header's `addSize` is zeroed to keep the SRR stream
        // self-delimiting (nothing follows it on disk).
        if !keep_payload
            && format == RarFormat::Rar4
            && block.block_type as u8 == rar4_type::SERVICE
        {
            if let Some(add_size_field) = block.header_bytes.get_mut(7..11) {
                add_size_field.copy_from_slice(&0u32.to_le_bytes());
            }
        }

        out.write_all(&block.header_bytes)?;

        if keep_payload {
            scanner.copy_payload(&block, out)?;
        } else {
            scanner.skip_payload(&block)?;
        }
    }

    Ok(())
}

fn should_keep_payload(
    block: &rar_scan::ScannedRarBlock,
    format: RarFormat,
    options: &SrrOptions,
    warnings: &mut Vec<String>,
) -> bool {
    match format {
        RarFormat::Rar4 => match block.block_type as u8 {
            rar4_type::FILE => {
                if !options.allow_compressed {
                    if let Some(method) = block.rar4_method() {
                        if method != 0x30 {
                            let message = format!(
                                "compressed file at offset {}: method 0x{method:02x}",
                                block.offset
                            );
                            log::warn!("{message}");
                            warnings.push(message);
                        }
                    }
                }
                false
            }
            rar4_type::SERVICE => block
                .rar4_service_subtype()
                .map(|subtype| subtype.eq_ignore_ascii_case(CMT_SUBTYPE))
                .unwrap_or(false),
            _ => false,
        },
        // The lean RAR5 scanner does not currently decode `Service`
        // sub-kinds; conservatively drop all RAR5 payloads (see DESIGN.md).
        RarFormat::Rar5 => false,
    }
}
