//! LZW stream decoder using the weezl crate.

use crate::error::{PdfError, Result};
use weezl::{BitOrder, LzwStatus, decode::Decoder};

/// Decode LZW-encoded data with the given `EarlyChange` setting, producing
/// at most `limit` bytes.
///
/// EarlyChange=1, the PDF default, widens codes one entry early the way TIFF
/// does; EarlyChange=0 widens them exactly when the table fills.
/// In strict mode a corrupt code sequence is an error; otherwise the output
/// decoded up to the bad code is returned. A missing end code is tolerated.
pub fn lzwdecode_with_earlychange(
    data: &[u8],
    early_change: i64,
    limit: usize,
    strict: bool,
) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut output = Vec::with_capacity((data.len() * 2).min(limit));
    let mut buf = [0u8; 4096];
    let mut input = data;
    loop {
        let result = decoder.decode_bytes(input, &mut buf);
        input = &input[result.consumed_in..];
        output.extend_from_slice(&buf[..result.consumed_out]);
        if output.len() > limit {
            return Err(PdfError::CorruptStream(format!(
                "LZWDecode output exceeds {limit} bytes"
            )));
        }
        match result.status {
            Ok(LzwStatus::Done | LzwStatus::NoProgress) => break,
            Ok(LzwStatus::Ok) if result.consumed_in == 0 && result.consumed_out == 0 => break,
            Ok(LzwStatus::Ok) => {}
            Err(err) if strict => return Err(PdfError::CorruptStream(format!("LZW: {err}"))),
            Err(err) => {
                tracing::debug!(error = %err, "LZW stream damaged, keeping partial output");
                break;
            }
        }
    }
    Ok(output)
}
