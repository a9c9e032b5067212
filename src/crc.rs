//! Streaming CRC32-IEEE accumulator shared by the SRS profilers and the
//! reconstructor's per-volume hash verification.

/// CRC32-IEEE (polynomial `0xEDB88320`, seed `0xFFFFFFFF`, final XOR
/// `0xFFFFFFFF`), fed incrementally as bytes are read. The result compares
/// equal regardless of how it is later packed into bytes; callers that need
/// an on-disk representation use [`Crc32::to_be_bytes`].
#[derive(Debug, Clone)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }

    /// Big-endian packed bytes, matching the "prints as" convention in §4.1.
    pub fn to_be_bytes(value: u32) -> [u8; 4] {
        value.to_be_bytes()
    }

    /// Whole-file CRC32, read to completion.
    pub fn of_reader<R: std::io::Read>(mut reader: R) -> std::io::Result<u32> {
        let mut crc = Self::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            crc.update(&buf[..n]);
        }
        Ok(crc.finalize())
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_of_known_string() {
        let mut crc = Crc32::new();
        crc.update(b"123456789");
        assert_eq!(crc.finalize(), 0xCBF4_3926);
    }

    #[test]
    fn test_crc32_incremental_matches_bulk() {
        let mut incremental = Crc32::new();
        incremental.update(b"hello, ");
        incremental.update(b"world");

        let mut bulk = Crc32::new();
        bulk.update(b"hello, world");

        assert_eq!(incremental.finalize(), bulk.finalize());
    }
}
