//! FlateDecode (zlib) with a bounded output size.

use crate::error::{PdfError, Result};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Inflate zlib data, producing at most `limit` bytes.
///
/// Strict mode turns a corrupt stream into [`PdfError::CorruptStream`].
/// Lenient mode keeps whatever decoded before the damage, which is what
/// viewers do with slightly broken content streams.
pub fn flatedecode(data: &[u8], limit: usize, strict: bool) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data).take(limit as u64 + 1);
    let mut out = Vec::with_capacity((data.len() * 3).min(limit));
    if let Err(err) = decoder.read_to_end(&mut out) {
        if strict {
            return Err(PdfError::CorruptStream(format!("FlateDecode: {err}")));
        }
        tracing::debug!(error = %err, "flate stream damaged, keeping partial output");
        out = decompress_corrupted(data, limit);
    }
    if out.len() > limit {
        return Err(PdfError::CorruptStream(format!(
            "FlateDecode output exceeds {limit} bytes"
        )));
    }
    Ok(out)
}

/// Best-effort zlib decompression: feed one byte at a time and return the
/// output produced before the decoder fails (often a bad checksum at the end).
fn decompress_corrupted(data: &[u8], limit: usize) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() && out.len() <= limit {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        let consumed = (decoder.total_in() - before_in) as usize;
        i += consumed.max(1);
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}
