//! Minimal reader for the PE/COFF headers of Windows images.
//!
//! Only the handful of fields the criteria need are decoded. Anything that
//! does not look like a well-formed image yields `None`.

const IMAGE_FILE_DLL: u16 = 0x2000;
const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;
const CLR_DIRECTORY_INDEX: usize = 14;

/// Header fields of a PE image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeInfo {
    pub machine: u16,
    /// COFF `TimeDateStamp`, seconds since the Unix epoch
    pub timestamp: u32,
    pub characteristics: u16,
    pub is_64_bit: bool,
    /// Checksum stored in the optional header
    pub checksum: u32,
    /// Offset of the checksum field, needed to recompute it
    pub checksum_offset: usize,
    pub has_clr_header: bool,
}

impl PeInfo {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.get(0..2)? != b"MZ" {
            return None;
        }
        let pe_offset = read_u32(data, 0x3c)? as usize;
        if data.get(pe_offset..pe_offset + 4)? != b"PE\0\0" {
            return None;
        }

        let coff = pe_offset + 4;
        let machine = read_u16(data, coff)?;
        let timestamp = read_u32(data, coff + 4)?;
        let optional_size = read_u16(data, coff + 16)? as usize;
        let characteristics = read_u16(data, coff + 18)?;

        let optional = coff + 20;
        if optional_size < 2 {
            return None;
        }
        let is_64_bit = match read_u16(data, optional)? {
            PE32_MAGIC => false,
            PE32_PLUS_MAGIC => true,
            _ => return None,
        };

        let checksum_offset = optional + 64;
        let checksum = read_u32(data, checksum_offset)?;

        let (count_offset, dirs_offset) = if is_64_bit {
            (optional + 108, optional + 112)
        } else {
            (optional + 92, optional + 96)
        };
        let directory_count = read_u32(data, count_offset).unwrap_or(0) as usize;
        let has_clr_header = directory_count > CLR_DIRECTORY_INDEX
            && read_u32(data, dirs_offset + CLR_DIRECTORY_INDEX * 8)
                .map(|rva| rva != 0)
                .unwrap_or(false);

        Some(Self {
            machine,
            timestamp,
            characteristics,
            is_64_bit,
            checksum,
            checksum_offset,
            has_clr_header,
        })
    }

    pub fn is_dll(&self) -> bool {
        self.characteristics & IMAGE_FILE_DLL != 0
    }

    /// True when the stored checksum matches the recomputed image checksum
    pub fn checksum_matches(&self, data: &[u8]) -> bool {
        self.checksum == compute_checksum(data, self.checksum_offset)
    }
}

/// The image checksum algorithm used by the Windows loader: a 16-bit
/// one's-complement style sum of the file with the checksum field skipped,
/// plus the file length.
pub fn compute_checksum(data: &[u8], checksum_offset: usize) -> u32 {
    let mut sum: u64 = 0;
    let mut offset = 0;
    while offset < data.len() {
        if offset == checksum_offset || offset == checksum_offset + 2 {
            offset += 2;
            continue;
        }
        let lo = data[offset] as u64;
        let hi = data.get(offset + 1).copied().unwrap_or(0) as u64;
        sum += lo | (hi << 8);
        sum = (sum & 0xffff) + (sum >> 16);
        offset += 2;
    }
    sum = (sum & 0xffff) + (sum >> 16);
    (sum as u32).wrapping_add(data.len() as u32)
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Builds a tiny synthetic image for tests elsewhere in the crate.
#[cfg(test)]
pub(crate) fn synthetic_image(is_64_bit: bool, dll: bool, timestamp: u32, clr: bool) -> Vec<u8> {
    let pe_offset = 0x80usize;
    let mut data = vec![0u8; 0x200];
    data[0..2].copy_from_slice(b"MZ");
    data[0x3c..0x40].copy_from_slice(&(pe_offset as u32).to_le_bytes());
    data[pe_offset..pe_offset + 4].copy_from_slice(b"PE\0\0");

    let coff = pe_offset + 4;
    let machine: u16 = if is_64_bit { 0x8664 } else { 0x14c };
    data[coff..coff + 2].copy_from_slice(&machine.to_le_bytes());
    data[coff + 4..coff + 8].copy_from_slice(&timestamp.to_le_bytes());
    let optional_size: u16 = if is_64_bit { 240 } else { 224 };
    data[coff + 16..coff + 18].copy_from_slice(&optional_size.to_le_bytes());
    let characteristics: u16 = 0x0002 | if dll { IMAGE_FILE_DLL } else { 0 };
    data[coff + 18..coff + 20].copy_from_slice(&characteristics.to_le_bytes());

    let optional = coff + 20;
    let magic = if is_64_bit { PE32_PLUS_MAGIC } else { PE32_MAGIC };
    data[optional..optional + 2].copy_from_slice(&magic.to_le_bytes());
    let (count_offset, dirs_offset) = if is_64_bit {
        (optional + 108, optional + 112)
    } else {
        (optional + 92, optional + 96)
    };
    data[count_offset..count_offset + 4].copy_from_slice(&16u32.to_le_bytes());
    if clr {
        let clr_entry = dirs_offset + CLR_DIRECTORY_INDEX * 8;
        data[clr_entry..clr_entry + 4].copy_from_slice(&0x2000u32.to_le_bytes());
    }

    let checksum_offset = optional + 64;
    let checksum = compute_checksum(&data, checksum_offset);
    data[checksum_offset..checksum_offset + 4].copy_from_slice(&checksum.to_le_bytes());
    data
}
