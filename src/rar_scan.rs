//! Streaming scan of RAR4 and RAR5 volumes that yields each block's raw
//! header bytes and payload size without consuming the payload itself.
//! Grounded on the RAR header walkers in `other_examples` (manual base
//! header reads, branch on type byte, skip to the next block) rather than
//! on a deep field-by-field parser, since `SrrWriter` only ever needs to
//! copy bytes, not interpret every field.

use std::io;

use crate::error::{RescError, RescResult};
use crate::read::{read_u16, read_u32, read_u8, read_vec, read_vint, read_vint_raw};
use crate::signature::Signature;

/// RAR4 block type bytes used by the scanner and `SrrWriter`.
pub mod rar4_type {
    pub const MARKER: u8 = 0x72;
    pub const MAIN: u8 = 0x73;
    pub const FILE: u8 = 0x74;
    pub const COMMENT_OLD: u8 = 0x75;
    pub const AV_OLD: u8 = 0x76;
    pub const SUB: u8 = 0x77;
    pub const PROTECT_OLD: u8 = 0x78;
    pub const SIGN_OLD: u8 = 0x79;
    pub const SERVICE: u8 = 0x7A;
    pub const END_ARCHIVE: u8 = 0x7B;
}

/// RAR4 header flags the scanner inspects directly.
pub const LONG_BLOCK: u16 = 0x8000;

/// A single RAR block as seen by the scanner: enough to copy it verbatim
/// and to decide whether/how much payload to copy or skip.
#[derive(Debug, Clone)]
pub struct ScannedRarBlock {
    pub offset: u64,
    /// RAR4 type byte, or the RAR5 block-type VINT widened to `u64`.
    pub block_type: u64,
    pub flags: u64,
    /// The full header, copied byte for byte, crc field included.
    pub header_bytes: Vec<u8>,
    /// Number of trailing payload bytes the scanner left unconsumed.
    pub payload_size: u64,
}

impl ScannedRarBlock {
    pub fn is_end_archive(&self, format: RarFormat) -> bool {
        match format {
            RarFormat::Rar4 => self.block_type == rar4_type::END_ARCHIVE as u64,
            RarFormat::Rar5 => self.block_type == 5,
        }
    }

    /// RAR4 `Service` sub-type string at its canonical offset (32), or
    /// `None` if the header is too short / this isn't a Service block.
    pub fn rar4_service_subtype(&self) -> Option<&[u8]> {
        self.header_bytes.get(32..35)
    }

    /// RAR4 `FileHeader` compression method byte at its canonical offset.
    pub fn rar4_method(&self) -> Option<u8> {
        self.header_bytes.get(25).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RarFormat {
    Rar4,
    Rar5,
}

/// Detect which RAR generation a stream begins with and how many marker
/// bytes to skip before the first block.
pub fn detect_format<R: io::Read>(reader: &mut R) -> RescResult<(RarFormat, Vec<u8>)> {
    let mut marker = read_vec(reader, 8)?;

    if marker.as_slice() == Signature::RAR50.as_slice() {
        return Ok((RarFormat::Rar5, marker));
    }

    if &marker[..7] == Signature::RAR15.as_slice() {
        marker.truncate(7);
        return Ok((RarFormat::Rar4, marker));
    }

    Err(RescError::Malformed("missing RAR marker block".into()))
}

/// Scans blocks after the marker. Ends the iteration (without error) on a
/// truncated read or a malformed `headerSize`, per the scanner's
/// allow-partial contract; callers surface that as a warning, not a fatal.
pub struct RarBlockScanner<R: io::Read + io::Seek> {
    reader: R,
    format: RarFormat,
    next_offset: u64,
    file_size: u64,
    ended: bool,
}

impl<R: io::Read + io::Seek> RarBlockScanner<R> {
    pub fn new(mut reader: R, format: RarFormat, first_block_offset: u64) -> io::Result<Self> {
        let file_size = reader.seek(io::SeekFrom::End(0))?;
        Ok(Self {
            reader,
            format,
            next_offset: first_block_offset,
            file_size,
            ended: false,
        })
    }

    pub fn format(&self) -> RarFormat {
        self.format
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    fn read_rar4_block(&mut self) -> RescResult<ScannedRarBlock> {
        let offset = self.next_offset;
        self.reader.seek(io::SeekFrom::Start(offset))?;

        let crc16 = read_u16(&mut self.reader)?;
        let block_type = read_u8(&mut self.reader)?;
        let flags = read_u16(&mut self.reader)?;
        let header_size = read_u16(&mut self.reader)?;

        if header_size < 7 {
            return Err(RescError::Malformed(format!(
                "header reported size {header_size} < 7"
            )));
        }

        let mut header_bytes = vec![0u8; header_size as usize];
        header_bytes[0..2].copy_from_slice(&crc16.to_le_bytes());
        header_bytes[2] = block_type;
        header_bytes[3..5].copy_from_slice(&flags.to_le_bytes());
        header_bytes[5..7].copy_from_slice(&header_size.to_le_bytes());
        self.reader.read_exact(&mut header_bytes[7..])?;

        let has_add_size = flags & LONG_BLOCK != 0
            || block_type == rar4_type::FILE
            || block_type == rar4_type::SERVICE;

        let payload_size = if has_add_size && header_bytes.len() >= 11 {
            u32::from_le_bytes(header_bytes[7..11].try_into().unwrap()) as u64
        } else {
            0
        };

        if offset + header_size as u64 > self.file_size {
            return Err(RescError::Malformed(
                "header size extends past end of file".into(),
            ));
        }

        self.next_offset = offset + header_size as u64 + payload_size;

        Ok(ScannedRarBlock {
            offset,
            block_type: block_type as u64,
            flags: flags as u64,
            header_bytes,
            payload_size,
        })
    }

    fn read_rar5_block(&mut self) -> RescResult<ScannedRarBlock> {
        let offset = self.next_offset;
        self.reader.seek(io::SeekFrom::Start(offset))?;

        let crc32 = read_u32(&mut self.reader)?;
        let (header_size, header_size_raw) = read_vint_raw(&mut self.reader)?;

        let mut content = read_vec(&mut self.reader, header_size as usize)?;
        let mut cursor = io::Cursor::new(&content[..]);

        let (block_type, _) = read_vint(&mut cursor)?;
        let (flags, _) = read_vint(&mut cursor)?;

        let has_extra_area = flags & 0x0001 != 0;
        let has_data_area = flags & 0x0002 != 0;

        if has_extra_area {
            let _ = read_vint(&mut cursor)?;
        }

        let mut data_size = 0u64;
        if has_data_area {
            (data_size, _) = read_vint(&mut cursor)?;
        }

        let mut header_bytes =
            Vec::with_capacity(4 + header_size_raw.len() + content.len());
        header_bytes.extend(crc32.to_le_bytes());
        header_bytes.extend(header_size_raw);
        header_bytes.append(&mut content);

        if offset + header_bytes.len() as u64 + data_size > self.file_size {
            return Err(RescError::Malformed(
                "data size extends past end of file".into(),
            ));
        }

        self.next_offset = offset + header_bytes.len() as u64 + data_size;

        Ok(ScannedRarBlock {
            offset,
            block_type,
            flags,
            header_bytes,
            payload_size: data_size,
        })
    }

    fn read_block(&mut self) -> RescResult<ScannedRarBlock> {
        match self.format {
            RarFormat::Rar4 => self.read_rar4_block(),
            RarFormat::Rar5 => self.read_rar5_block(),
        }
    }

    /// Skip the payload of the last-returned block, positioning the
    /// scanner to read the next header on the following call to `next`.
    pub fn skip_payload(&mut self, block: &ScannedRarBlock) -> io::Result<()> {
        self.reader.seek(io::SeekFrom::Start(
            block.offset + block.header_bytes.len() as u64 + block.payload_size,
        ))?;
        Ok(())
    }

    /// Copy the payload of the last-returned block into `out`.
    pub fn copy_payload<W: io::Write>(
        &mut self,
        block: &ScannedRarBlock,
        out: &mut W,
    ) -> io::Result<()> {
        self.reader.seek(io::SeekFrom::Start(
            block.offset + block.header_bytes.len() as u64,
        ))?;
        let mut limited = (&mut self.reader).take(block.payload_size);
        io::copy(&mut limited, out)?;
        Ok(())
    }
}

impl<R: io::Read + io::Seek> Iterator for RarBlockScanner<R> {
    type Item = RescResult<ScannedRarBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ended || self.next_offset >= self.file_size {
            return None;
        }

        match self.read_block() {
            Ok(block) => {
                if block.is_end_archive(self.format) {
                    self.ended = true;
                }
                Some(Ok(block))
            }
            Err(RescError::UnexpectedEof) => {
                log::warn!(
                    "truncated {:?} volume at offset {}: expected more data",
                    self.format,
                    self.next_offset
                );
                self.ended = true;
                None
            }
            Err(RescError::Malformed(ref message)) => {
                log::warn!(
                    "malformed block at offset {} in {:?} volume, treating as end of volume: {message}",
                    self.next_offset,
                    self.format
                );
                self.ended = true;
                None
            }
            Err(e) => {
                self.ended = true;
                Some(Err(e))
            }
        }
    }
}
