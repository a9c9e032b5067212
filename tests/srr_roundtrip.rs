//! End-to-end check of spec §8's core property: reconstructing an SRR
//! against its original payload source yields a volume byte-identical to
//! the one `create_srr` was given.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use rescene_core::srr::{HashType, SrrOptions};
use rescene_core::{create_srr, reconstruct};

/// Builds a single-volume RAR4 archive: marker, one `Store`-method
/// `FileHeader` for `sample.txt` carrying 37 bytes of payload, then
/// `EndArchive`. Returns the full volume bytes alongside the 37 payload
/// bytes alone (what a reconstruction source directory holds).
fn build_rar4_volume() -> (Vec<u8>, Vec<u8>) {
    let payload: Vec<u8> = (0u8..37).collect();
    let name = b"sample.txt";

    let mut volume = Vec::new();
    volume.extend_from_slice(&[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00]); // RAR4 marker

    // FileHeader: crc16(2) | type(1) | flags(2) | headerSize(2) |
    // packedSize(4) | unpackedSize(4) | hostOS(1) | fileCrc(4) | dosTime(4) |
    // unpVer(1) | method(1) | nameSize(2) | attrs(4) | name.
    let header_size: u16 = 7 + 4 + 4 + 1 + 4 + 4 + 1 + 1 + 2 + 4 + name.len() as u16;
    volume.extend_from_slice(&0xCAFEu16.to_le_bytes()); // crc16, unvalidated
    volume.push(0x74); // FileHeader
    volume.extend_from_slice(&0u16.to_le_bytes()); // flags: no SPLIT_*, no LARGE
    volume.extend_from_slice(&header_size.to_le_bytes());
    volume.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // packedSize
    volume.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // unpackedSize
    volume.push(2); // hostOS
    volume.extend_from_slice(&0xAABBCCDDu32.to_le_bytes()); // fileCrc
    volume.extend_from_slice(&0u32.to_le_bytes()); // dosTime
    volume.push(29); // unpVer
    volume.push(0x30); // method: Store
    volume.extend_from_slice(&(name.len() as u16).to_le_bytes()); // nameSize
    volume.extend_from_slice(&0u32.to_le_bytes()); // attrs
    volume.extend_from_slice(name);
    volume.extend_from_slice(&payload);

    // EndArchive: no addSize.
    volume.extend_from_slice(&0x7B7Bu16.to_le_bytes());
    volume.push(0x7B);
    volume.extend_from_slice(&0u16.to_le_bytes());
    volume.extend_from_slice(&7u16.to_le_bytes());

    (volume, payload)
}

struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new(label: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "rescene-core-test-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

#[test]
fn srr_round_trip_reproduces_the_original_volume_byte_for_byte() {
    let scratch = ScratchDir::new("srr-roundtrip");
    let root = &scratch.0;

    let (volume_bytes, payload) = build_rar4_volume();

    let input_dir = root.join("input");
    fs::create_dir_all(&input_dir).unwrap();
    let volume_path = input_dir.join("volume.rar");
    fs::write(&volume_path, &volume_bytes).unwrap();
    fs::write(input_dir.join("sample.txt"), &payload).unwrap();

    let srr_path = root.join("volume.srr");
    let result = create_srr(&srr_path, &[volume_path.clone()], &[], &SrrOptions::default())
        .expect("create_srr should succeed");
    assert!(result.success);
    assert_eq!(result.volume_count, 1);

    // SRR size bound: headers only, plus framing, never the payload again.
    assert!(result.srr_file_size <= volume_bytes.len() as u64 + 200);

    let output_dir = root.join("output");
    let recon = reconstruct(
        &srr_path,
        &input_dir,
        &output_dir,
        &HashSet::new(),
        HashType::Crc32,
    )
    .expect("reconstruct should succeed");

    assert!(recon.all_matched);
    assert_eq!(recon.completed_volumes.len(), 1);

    let reconstructed = fs::read(output_dir.join("volume.rar")).unwrap();
    assert_eq!(
        reconstructed, volume_bytes,
        "reconstructed volume must be byte-identical to the original"
    );
}

#[test]
fn srr_round_trip_fails_cleanly_when_source_file_is_missing() {
    let scratch = ScratchDir::new("srr-roundtrip-missing-source");
    let root = &scratch.0;

    let (volume_bytes, _payload) = build_rar4_volume();

    let input_dir = root.join("input");
    fs::create_dir_all(&input_dir).unwrap();
    let volume_path = input_dir.join("volume.rar");
    fs::write(&volume_path, &volume_bytes).unwrap();
    // Deliberately omit sample.txt from the input directory.

    let srr_path = root.join("volume.srr");
    create_srr(&srr_path, &[volume_path], &[], &SrrOptions::default()).unwrap();

    let empty_input = root.join("empty_input");
    fs::create_dir_all(&empty_input).unwrap();
    let output_dir = root.join("output");

    let err = reconstruct(
        &srr_path,
        &empty_input,
        &output_dir,
        &HashSet::new(),
        HashType::Crc32,
    )
    .expect_err("reconstruct should fail when the source file cannot be located");

    match err {
        rescene_core::RescError::NotFound(name) => assert_eq!(name, "sample.txt"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}
