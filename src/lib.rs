//! `rescene-core`: produces and consumes SRR (Scene Release Reconstruction)
//! and SRS (Sample ReScene) containers that preserve a scene release's
//! archive metadata and media sample structure without its payload bytes.

pub mod comment;
pub mod crc;
pub mod ebml;
pub mod error;
pub mod progress;
pub mod rar_scan;
mod read;
pub mod sfv;
mod signature;
pub mod srr;
pub mod srs;
pub mod write;

pub use error::{RescError, RescResult};
pub use signature::Signature;

pub use sfv::{create_srr_from_sfv, create_srr_from_sfv_with, parse_sfv, SfvEntry};
pub use srr::{
    compare_rar_volume_names, create_srr, create_srr_with, reconstruct, reconstruct_with,
    sort_rar_volumes, HashType, ReconstructResult, SrrCreateResult, SrrOptions,
};
pub use srs::{create_srs, create_srs_with, ContainerType, ProfileResult, SrsCreateResult, SrsOptions};

/// Detect an SRS container type by reading `file_path` and sniffing/
/// extension-matching its contents, per §6's `detect_srs_container`.
pub fn detect_srs_container(file_path: &std::path::Path) -> RescResult<ContainerType> {
    let data = std::fs::read(file_path)?;
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.display().to_string());
    srs::detect_container_type(&file_name, &data)
}
