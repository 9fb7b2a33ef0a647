//! Text encoders for the result stream.

use crate::config::OutputEncoding;

/// Byte order mark written once at the start of a UTF-16 stream
pub const UTF16LE_BOM: [u8; 2] = [0xff, 0xfe];

/// Append `text` followed by a line break in the requested encoding.
///
/// UTF-16 output uses `\r\n`, the convention of the consoles and editors
/// that expect it.
pub fn encode_line(text: &str, encoding: OutputEncoding, buf: &mut Vec<u8>) {
    match encoding {
        OutputEncoding::Utf8 => {
            buf.extend_from_slice(text.as_bytes());
            buf.push(b'\n');
        }
        OutputEncoding::Utf16 => {
            for unit in text.encode_utf16().chain("\r\n".encode_utf16()) {
                buf.extend_from_slice(&unit.to_le_bytes());
            }
        }
    }
}

/// Stream prefix for `encoding`, empty for UTF-8
pub fn preamble(encoding: OutputEncoding) -> &'static [u8] {
    match encoding {
        OutputEncoding::Utf8 => &[],
        OutputEncoding::Utf16 => &UTF16LE_BOM,
    }
}

/// Decode UTF-16LE bytes, without BOM handling
pub fn decode_utf16le(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}
