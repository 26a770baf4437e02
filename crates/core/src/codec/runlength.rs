//! RunLength stream decoder.

use crate::error::Result;

/// Decode RunLength-encoded data.
///
/// Format:
/// - Length byte 0-127: Copy next (length + 1) bytes literally
/// - Length byte 128: End of data (EOD marker)
/// - Length byte 129-255: Repeat next byte (257 - length) times
///
/// Truncated input stops decoding without error.
pub fn rldecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;

        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                let end = (i + count).min(data.len());
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            129..=255 => {
                let Some(&byte) = data.get(i) else { break };
                i += 1;
                result.extend(std::iter::repeat_n(byte, 257 - length as usize));
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_repeat_runs() {
        let encoded = [2, b'a', b'b', b'c', 254, b'x', 128, 0, b'z'];
        assert_eq!(rldecode(&encoded).unwrap(), b"abcxxx");
    }

    #[test]
    fn truncated_literal_keeps_prefix() {
        assert_eq!(rldecode(&[4, b'a', b'b']).unwrap(), b"ab");
    }
}
