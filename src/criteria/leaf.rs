//! Leaf predicates: the concrete tests a criteria tree is built from.

use super::pattern::{PathPattern, PathRegex, SkipDirectory};
use super::{CostClass, DirectoryDecision};
use crate::metadata::digest::to_hex;
use crate::metadata::{FileAttributes, FileMetadataView, HashKind};
use chrono::{DateTime, Utc};
use std::fmt;

/// Single-letter type tests selected with `-t`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTest {
    Archive,
    Compressed,
    Directory,
    Encrypted,
    File,
    Hidden,
    NotContentIndexed,
    ReparsePoint,
    Offline,
    Sparse,
    ReadOnly,
    System,
    Temporary,
    PeImage,
    Dll,
    Pe32,
    Pe64,
    DotNet,
    ChecksumValid,
    Signed,
    SfcProtected,
}

impl AttributeTest {
    pub fn from_letter(letter: char) -> Option<Self> {
        let test = match letter.to_ascii_uppercase() {
            'A' => AttributeTest::Archive,
            'C' => AttributeTest::Compressed,
            'D' => AttributeTest::Directory,
            'E' => AttributeTest::Encrypted,
            'F' => AttributeTest::File,
            'H' => AttributeTest::Hidden,
            'I' => AttributeTest::NotContentIndexed,
            'J' => AttributeTest::ReparsePoint,
            'O' => AttributeTest::Offline,
            'P' => AttributeTest::Sparse,
            'R' => AttributeTest::ReadOnly,
            'S' => AttributeTest::System,
            'T' => AttributeTest::Temporary,
            'X' => AttributeTest::PeImage,
            'L' => AttributeTest::Dll,
            '2' => AttributeTest::Pe32,
            '6' => AttributeTest::Pe64,
            'N' => AttributeTest::DotNet,
            'K' => AttributeTest::ChecksumValid,
            'Z' => AttributeTest::Signed,
            'W' => AttributeTest::SfcProtected,
            _ => return None,
        };
        Some(test)
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeTest::Archive => "IsArchive",
            AttributeTest::Compressed => "IsCompressed",
            AttributeTest::Directory => "IsDirectory",
            AttributeTest::Encrypted => "IsEncrypted",
            AttributeTest::File => "IsFile",
            AttributeTest::Hidden => "IsHidden",
            AttributeTest::NotContentIndexed => "IsNotContentIndexed",
            AttributeTest::ReparsePoint => "IsReparsePoint",
            AttributeTest::Offline => "IsOffline",
            AttributeTest::Sparse => "IsSparse",
            AttributeTest::ReadOnly => "IsReadOnly",
            AttributeTest::System => "IsSystem",
            AttributeTest::Temporary => "IsTemporary",
            AttributeTest::PeImage => "IsPeImage",
            AttributeTest::Dll => "IsDll",
            AttributeTest::Pe32 => "IsPe32",
            AttributeTest::Pe64 => "IsPe64",
            AttributeTest::DotNet => "IsDotNet",
            AttributeTest::ChecksumValid => "HasValidChecksum",
            AttributeTest::Signed => "IsSigned",
            AttributeTest::SfcProtected => "IsSfcProtected",
        }
    }

    pub fn cost_class(self) -> CostClass {
        match self {
            AttributeTest::PeImage
            | AttributeTest::Dll
            | AttributeTest::Pe32
            | AttributeTest::Pe64
            | AttributeTest::DotNet
            | AttributeTest::ChecksumValid => CostClass::PeHeaderData,
            AttributeTest::Signed | AttributeTest::SfcProtected => CostClass::SignatureCheck,
            _ => CostClass::FastAttribute,
        }
    }

    fn attribute_bit(self) -> Option<u32> {
        let bit = match self {
            AttributeTest::Archive => FileAttributes::ARCHIVE,
            AttributeTest::Compressed => FileAttributes::COMPRESSED,
            AttributeTest::Directory => FileAttributes::DIRECTORY,
            AttributeTest::Encrypted => FileAttributes::ENCRYPTED,
            AttributeTest::Hidden => FileAttributes::HIDDEN,
            AttributeTest::NotContentIndexed => FileAttributes::NOT_CONTENT_INDEXED,
            AttributeTest::ReparsePoint => FileAttributes::REPARSE_POINT,
            AttributeTest::Offline => FileAttributes::OFFLINE,
            AttributeTest::Sparse => FileAttributes::SPARSE_FILE,
            AttributeTest::ReadOnly => FileAttributes::READONLY,
            AttributeTest::System => FileAttributes::SYSTEM,
            AttributeTest::Temporary => FileAttributes::TEMPORARY,
            _ => return None,
        };
        Some(bit)
    }

    pub fn evaluate(self, file: &dyn FileMetadataView) -> bool {
        if let Some(bit) = self.attribute_bit() {
            return file.attributes().contains(bit);
        }
        match self {
            AttributeTest::File => !file.attributes().is_directory(),
            AttributeTest::PeImage => file.pe_info().is_some(),
            AttributeTest::Dll => file.pe_info().map(|pe| pe.is_dll()).unwrap_or(false),
            AttributeTest::Pe32 => file.pe_info().map(|pe| !pe.is_64_bit).unwrap_or(false),
            AttributeTest::Pe64 => file.pe_info().map(|pe| pe.is_64_bit).unwrap_or(false),
            AttributeTest::DotNet => file.pe_info().map(|pe| pe.has_clr_header).unwrap_or(false),
            AttributeTest::ChecksumValid => file.pe_checksum_valid(),
            AttributeTest::Signed => file.signature_valid(),
            AttributeTest::SfcProtected => file.sfc_protected(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeComparison {
    Less,
    Greater,
    Equal,
}

/// Which timestamp a date criterion looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Created,
    Modified,
    Accessed,
    /// PE header `TimeDateStamp`
    Header,
}

impl DateField {
    fn label(self) -> &'static str {
        match self {
            DateField::Created => "Created",
            DateField::Modified => "Modified",
            DateField::Accessed => "Accessed",
            DateField::Header => "HeaderTime",
        }
    }

    fn read(self, file: &dyn FileMetadataView) -> Option<DateTime<Utc>> {
        match self {
            DateField::Created => file.created(),
            DateField::Modified => file.modified(),
            DateField::Accessed => file.accessed(),
            DateField::Header => file
                .pe_info()
                .and_then(|pe| DateTime::from_timestamp(pe.timestamp as i64, 0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateComparison {
    Before,
    After,
}

/// A leaf predicate over one file
#[derive(Debug, Clone)]
pub enum Leaf {
    Attribute(AttributeTest),
    Size {
        comparison: SizeComparison,
        bytes: u64,
    },
    Date {
        field: DateField,
        comparison: DateComparison,
        at: DateTime<Utc>,
    },
    Pattern(PathPattern),
    Regex(PathRegex),
    Skip(SkipDirectory),
    Content {
        needle: Vec<u8>,
        /// Written as hex on the command line
        hex: bool,
    },
    Hash {
        kind: HashKind,
        digests: Vec<Vec<u8>>,
    },
}

impl Leaf {
    pub fn evaluate(&self, file: &dyn FileMetadataView) -> bool {
        match self {
            Leaf::Attribute(test) => test.evaluate(file),
            Leaf::Size { comparison, bytes } => {
                let size = file.size();
                match comparison {
                    SizeComparison::Less => size < *bytes,
                    SizeComparison::Greater => size > *bytes,
                    SizeComparison::Equal => size == *bytes,
                }
            }
            Leaf::Date {
                field,
                comparison,
                at,
            } => match field.read(file) {
                Some(value) => match comparison {
                    DateComparison::Before => value < *at,
                    DateComparison::After => value > *at,
                },
                None => false,
            },
            Leaf::Pattern(pattern) => pattern.matches(file.path()),
            Leaf::Regex(regex) => regex.matches(file.path()),
            Leaf::Skip(skip) => !skip.covers(file.path()),
            Leaf::Content { needle, .. } => file
                .contents()
                .map(|haystack| memchr::memmem::find(haystack, needle).is_some())
                .unwrap_or(false),
            Leaf::Hash { kind, digests } => file
                .hash(*kind)
                .map(|actual| digests.iter().any(|d| d.as_slice() == actual))
                .unwrap_or(false),
        }
    }

    pub fn cost_class(&self) -> CostClass {
        match self {
            Leaf::Attribute(test) => test.cost_class(),
            Leaf::Size { .. } => CostClass::SlowAttribute,
            Leaf::Date { field, .. } => match field {
                DateField::Header => CostClass::PeHeaderData,
                _ => CostClass::SlowAttribute,
            },
            Leaf::Pattern(_) | Leaf::Regex(_) | Leaf::Skip(_) => CostClass::PatternMatch,
            Leaf::Content { .. } => CostClass::ContentSearch,
            Leaf::Hash { .. } => CostClass::HashCheck,
        }
    }

    pub fn directory_decision(&self, dir: &std::path::Path) -> DirectoryDecision {
        match self {
            Leaf::Pattern(pattern) => pattern.directory_decision(dir),
            Leaf::Skip(skip) => {
                if skip.covers(dir) {
                    DirectoryDecision::Exclude
                } else {
                    DirectoryDecision::DontCare
                }
            }
            _ => DirectoryDecision::DontCare,
        }
    }

    pub(crate) fn make_non_recursive(&mut self) {
        if let Leaf::Pattern(pattern) = self {
            pattern.disable_pruning();
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Attribute(test) => f.write_str(test.name()),
            Leaf::Size { comparison, bytes } => {
                let name = match comparison {
                    SizeComparison::Less => "LessThanSize",
                    SizeComparison::Greater => "GreaterThanSize",
                    SizeComparison::Equal => "EqualsSize",
                };
                write!(f, "{}({})", name, bytes)
            }
            Leaf::Date {
                field,
                comparison,
                at,
            } => {
                let direction = match comparison {
                    DateComparison::Before => "Before",
                    DateComparison::After => "After",
                };
                write!(
                    f,
                    "{}{}({})",
                    field.label(),
                    direction,
                    at.format("%Y-%m-%dT%H:%M:%SZ")
                )
            }
            Leaf::Pattern(pattern) => write!(f, "Pattern({})", pattern.text()),
            Leaf::Regex(regex) => write!(f, "Regex({})", regex.text()),
            Leaf::Skip(skip) => write!(f, "SkipDirectory({})", skip.text()),
            Leaf::Content { needle, hex: true } => write!(f, "ContainsHex({})", to_hex(needle)),
            Leaf::Content { needle, hex: false } => {
                write!(f, "Contains({:?})", String::from_utf8_lossy(needle))
            }
            Leaf::Hash { kind, digests } => {
                let list: Vec<String> = digests.iter().map(|d| to_hex(d)).collect();
                write!(f, "{}In[{}]", kind, list.join(","))
            }
        }
    }
}
