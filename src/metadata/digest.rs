//! File digests used by the hash criteria and the `{md5}`-style output fields.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    pub const ALL: [HashKind; 6] = [
        HashKind::Md5,
        HashKind::Sha1,
        HashKind::Sha224,
        HashKind::Sha256,
        HashKind::Sha384,
        HashKind::Sha512,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Some(HashKind::Md5),
            "sha1" => Some(HashKind::Sha1),
            "sha224" => Some(HashKind::Sha224),
            "sha256" => Some(HashKind::Sha256),
            "sha384" => Some(HashKind::Sha384),
            "sha512" => Some(HashKind::Sha512),
            _ => None,
        }
    }

    /// Digest length in bytes
    pub fn digest_len(self) -> usize {
        match self {
            HashKind::Md5 => 16,
            HashKind::Sha1 => 20,
            HashKind::Sha224 => 28,
            HashKind::Sha256 => 32,
            HashKind::Sha384 => 48,
            HashKind::Sha512 => 64,
        }
    }

    /// Slot index into per-file caches
    pub(crate) fn index(self) -> usize {
        match self {
            HashKind::Md5 => 0,
            HashKind::Sha1 => 1,
            HashKind::Sha224 => 2,
            HashKind::Sha256 => 3,
            HashKind::Sha384 => 4,
            HashKind::Sha512 => 5,
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashKind::Md5 => "MD5",
            HashKind::Sha1 => "SHA1",
            HashKind::Sha224 => "SHA224",
            HashKind::Sha256 => "SHA256",
            HashKind::Sha384 => "SHA384",
            HashKind::Sha512 => "SHA512",
        };
        f.write_str(name)
    }
}

/// Hash a byte slice with the requested algorithm
pub fn digest_bytes(kind: HashKind, bytes: &[u8]) -> Vec<u8> {
    match kind {
        HashKind::Md5 => Md5::digest(bytes).to_vec(),
        HashKind::Sha1 => Sha1::digest(bytes).to_vec(),
        HashKind::Sha224 => Sha224::digest(bytes).to_vec(),
        HashKind::Sha256 => Sha256::digest(bytes).to_vec(),
        HashKind::Sha384 => Sha384::digest(bytes).to_vec(),
        HashKind::Sha512 => Sha512::digest(bytes).to_vec(),
    }
}

/// Lowercase hex rendering of a digest
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Parse a hex string (digits only, no sign or whitespace) into bytes
pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    if bytes.len() % 2 != 0 || !bytes.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    bytes
        .chunks(2)
        .map(|pair| Some((hex_value(pair[0])? << 4) | hex_value(pair[1])?))
        .collect()
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|v| v as u8)
}
