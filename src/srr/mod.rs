//! SRR (Scene Release Reconstruction): a RAR-shaped envelope carrying every
//! RAR header block of a release's volumes, verbatim, without the
//! compressed payloads.

pub mod blocks;
pub mod reconstruct;
pub mod volume_order;
pub mod writer;

pub use reconstruct::{reconstruct, reconstruct_with, HashType, ReconstructResult};
pub use volume_order::{compare_rar_volume_names, sort_rar_volumes};
pub use writer::{create_srr, create_srr_with, SrrCreateResult, SrrOptions};
