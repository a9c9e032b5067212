//! SRS (Sample ReScene): a container-isomorphic mirror of a media sample,
//! A/V payload bytes replaced by compact per-track descriptors.

pub mod avi;
pub mod flac;
pub mod mkv;
pub mod mp3;
pub mod mp4;
pub mod profiler;
pub mod stream;
pub mod track;
pub mod wmv;
pub mod writer;

pub use profiler::{detect_container_type, profile, ContainerType, ProfileResult, Track};
pub use writer::{create_srs, create_srs_with, SrsCreateResult, SrsOptions};
