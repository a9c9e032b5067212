//! RAR archive-comment decompression (PPMd/LZSS) is out of scope: the SRR
//! writer and reconstructor only ever copy CMT service-block payloads
//! verbatim. This trait exists so a host that *does* want to decode a
//! comment for display can plug one in without the core depending on a
//! decompressor.

/// A host-supplied capability for decoding a RAR comment service-block
/// payload into readable text. The core never calls this itself.
pub trait CommentDecompressor {
    fn decompress(&self, compressed: &[u8]) -> Option<String>;
}

/// A decompressor that always declines, usable as a null sentinel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommentDecompressor;

impl CommentDecompressor for NoCommentDecompressor {
    fn decompress(&self, _compressed: &[u8]) -> Option<String> {
        None
    }
}
