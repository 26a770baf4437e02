//! ASCII85 and ASCIIHex stream decoders.

use crate::error::{PdfError, Result};

/// Decode ASCII85-encoded data (PDF variant).
/// Handles: z-encoding, <~ ~> markers, whitespace, missing EOD.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    // everything after the EOD marker is junk
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut result = Vec::with_capacity(data.len() / 5 * 4 + 4);
    let mut group = [0u8; 5];
    let mut len = 0;

    for (pos, &byte) in data.iter().enumerate() {
        match byte {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x00' | b'\x0c' => {}
            b'z' if len == 0 => result.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[len] = byte - b'!';
                len += 1;
                if len == 5 {
                    result.extend_from_slice(&group_value(&group, pos)?.to_be_bytes());
                    len = 0;
                }
            }
            _ => {
                return Err(PdfError::CorruptStream(format!(
                    "invalid ASCII85 byte 0x{byte:02x} at {pos}"
                )));
            }
        }
    }

    if len == 1 {
        return Err(PdfError::CorruptStream(
            "ASCII85 data ends with a single-character group".into(),
        ));
    }
    if len > 1 {
        // pad the partial group with 'u' and keep len - 1 bytes
        group[len..].fill(b'u' - b'!');
        let bytes = group_value(&group, data.len())?.to_be_bytes();
        result.extend_from_slice(&bytes[..len - 1]);
    }

    Ok(result)
}

fn group_value(group: &[u8; 5], pos: usize) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value)
        .map_err(|_| PdfError::CorruptStream(format!("ASCII85 group overflow before {pos}")))
}

/// Decode ASCIIHex-encoded data.
///
/// Whitespace is ignored, decoding stops at `>`, and an odd final digit is
/// padded with zero.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for (pos, &byte) in data.iter().enumerate() {
        if byte == b'>' {
            break;
        }
        match hex_nibble(byte) {
            Some(nibble) => match pending.take() {
                Some(high) => result.push((high << 4) | nibble),
                None => pending = Some(nibble),
            },
            None if matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x00' | b'\x0c') => {}
            None => {
                return Err(PdfError::CorruptStream(format!(
                    "invalid ASCIIHex byte 0x{byte:02x} at {pos}"
                )));
            }
        }
    }

    if let Some(high) = pending {
        result.push(high << 4);
    }

    Ok(result)
}

const fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asciihex_decode_expected() {
        let decoded = asciihexdecode(b"48656c6c6f 20776f726c64>").unwrap();
        assert_eq!(decoded, b"Hello world");
    }

    #[test]
    fn asciihex_odd_digit_padded() {
        assert_eq!(asciihexdecode(b"ABC>").unwrap(), vec![0xAB, 0xC0]);
    }

    #[test]
    fn asciihex_rejects_garbage() {
        assert!(matches!(
            asciihexdecode(b"4G>"),
            Err(PdfError::CorruptStream(_))
        ));
    }

    #[test]
    fn ascii85_decode_expected() {
        let decoded = ascii85decode(b"<~87cURD]i,\"Ebo7~>").unwrap();
        assert_eq!(decoded, b"Hello World");
    }

    #[test]
    fn ascii85_z_and_partial_group() {
        // "z" is four zero bytes; "A," encodes the single byte 0x64 ('d')
        let decoded = ascii85decode(b"zA,~>").unwrap();
        assert_eq!(decoded, vec![0, 0, 0, 0, b'd']);
    }

    #[test]
    fn ascii85_overflow_is_corrupt() {
        assert!(matches!(
            ascii85decode(b"uuuuu~>"),
            Err(PdfError::CorruptStream(_))
        ));
    }
}
