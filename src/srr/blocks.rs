//! SRR's own block type space: RAR4-shaped 7-byte base headers whose CRC
//! field is a static sentinel (the type byte duplicated into both bytes)
//! rather than a real checksum, so a RAR-unaware reader can skip them.

use std::io;

use crate::error::RescResult;
use crate::read::{read_u16, read_u32, read_vec};
use crate::write::{write_u16_le, write_u32_le};

pub mod tag {
    pub const SRR_HEADER: u8 = 0x69;
    pub const SRR_STORED_FILE: u8 = 0x6A;
    pub const SRR_OSO_HASH: u8 = 0x6B;
    pub const SRR_RAR_PADDING: u8 = 0x6C;
    pub const SRR_RAR_FILE: u8 = 0x71;
}

pub const LONG_BLOCK: u16 = 0x8000;

fn sentinel_crc(tag: u8) -> u16 {
    u16::from_le_bytes([tag, tag])
}

fn write_base_header<W: io::Write>(
    w: &mut W,
    tag: u8,
    flags: u16,
    header_size: u16,
) -> io::Result<()> {
    write_u16_le(w, sentinel_crc(tag))?;
    w.write_all(&[tag])?;
    write_u16_le(w, flags)?;
    write_u16_le(w, header_size)
}

/// `SrrHeader`: tag `0x69`, flag bit 0 set iff `app_name` is present.
pub fn write_srr_header<W: io::Write>(w: &mut W, app_name: Option<&str>) -> io::Result<()> {
    let extra_len = app_name.map_or(0, |s| 2 + s.len());
    let header_size = 7 + extra_len as u16;
    let flags = if app_name.is_some() { 0x0001 } else { 0 };

    write_base_header(w, tag::SRR_HEADER, flags, header_size)?;
    if let Some(name) = app_name {
        write_u16_le(w, name.len() as u16)?;
        w.write_all(name.as_bytes())?;
    }
    Ok(())
}

/// `SrrStoredFile`: tag `0x6A`, `LONG_BLOCK` set; header carries `addSize`
/// (the payload length) and the stored file's name; the file bytes
/// themselves follow as the block's payload.
pub fn write_srr_stored_file_header<W: io::Write>(
    w: &mut W,
    name: &str,
    add_size: u32,
) -> io::Result<()> {
    let header_size = 7 + 4 + 2 + name.len() as u16;
    write_base_header(w, tag::SRR_STORED_FILE, LONG_BLOCK, header_size)?;
    write_u32_le(w, add_size)?;
    write_u16_le(w, name.len() as u16)?;
    w.write_all(name.as_bytes())
}

/// `SrrOsoHash`: tag `0x6B`; `fileSize(u64) | hash(8 bytes) | nameLen(u16) | name`.
pub fn write_srr_oso_hash<W: io::Write>(
    w: &mut W,
    file_size: u64,
    hash: [u8; 8],
    name: &str,
) -> io::Result<()> {
    let header_size = 7 + 8 + 8 + 2 + name.len() as u16;
    write_base_header(w, tag::SRR_OSO_HASH, 0, header_size)?;
    w.write_all(&file_size.to_le_bytes())?;
    w.write_all(&hash)?;
    write_u16_le(w, name.len() as u16)?;
    w.write_all(name.as_bytes())
}

/// `SrrRarFile`: tag `0x71`, no trailing payload; carries the volume's
/// basename. Must precede that volume's copied RAR blocks.
pub fn write_srr_rar_file<W: io::Write>(w: &mut W, name: &str) -> io::Result<()> {
    let header_size = 7 + 2 + name.len() as u16;
    write_base_header(w, tag::SRR_RAR_FILE, 0, header_size)?;
    write_u16_le(w, name.len() as u16)?;
    w.write_all(name.as_bytes())
}

/// `SrrRarPadding`: tag `0x6C`, `LONG_BLOCK` set; carries a filename and
/// `addSize` bytes of literal padding to be rewritten verbatim.
pub fn write_srr_rar_padding_header<W: io::Write>(
    w: &mut W,
    name: &str,
    add_size: u32,
) -> io::Result<()> {
    let header_size = 7 + 4 + 2 + name.len() as u16;
    write_base_header(w, tag::SRR_RAR_PADDING, LONG_BLOCK, header_size)?;
    write_u32_le(w, add_size)?;
    write_u16_le(w, name.len() as u16)?;
    w.write_all(name.as_bytes())
}

/// Base header fields read back during reconstruction.
#[derive(Debug, Clone, Copy)]
pub struct BaseHeader {
    /// The crc field as it actually appears on disk: a real RAR header
    /// checksum for copied RAR blocks, or the `tag`-duplicated sentinel for
    /// SRR's own block types.
    pub crc: u16,
    pub tag: u8,
    pub flags: u16,
    pub header_size: u16,
}

pub fn read_base_header<R: io::Read>(r: &mut R) -> RescResult<BaseHeader> {
    let crc = read_u16(r)?;
    let mut tag_buf = [0u8; 1];
    r.read_exact(&mut tag_buf)?;
    let flags = read_u16(r)?;
    let header_size = read_u16(r)?;
    Ok(BaseHeader {
        crc,
        tag: tag_buf[0],
        flags,
        header_size,
    })
}

/// Read a length-prefixed (u16) UTF-8 name, lossily.
pub fn read_name<R: io::Read>(r: &mut R) -> RescResult<String> {
    let len = read_u16(r)?;
    let bytes = read_vec(r, len as usize)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn read_u32_field<R: io::Read>(r: &mut R) -> RescResult<u32> {
    Ok(read_u32(r)?)
}
