//! File metadata consumed by the criteria.
//!
//! The criteria only see the [`FileMetadataView`] trait. [`FileRecord`] is
//! the portable implementation used by the scanner: cheap filesystem
//! metadata is read when the record is created, expensive data (contents,
//! PE headers, digests) is computed on first use and cached on the record.

pub mod digest;
pub mod pe;

pub use digest::HashKind;
pub use pe::PeInfo;

use chrono::{DateTime, Utc};
use memmap2::Mmap;
use std::fs::{self, File, Metadata};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Win32 file attribute bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAttributes(pub u32);

impl FileAttributes {
    pub const READONLY: u32 = 0x0001;
    pub const HIDDEN: u32 = 0x0002;
    pub const SYSTEM: u32 = 0x0004;
    pub const DIRECTORY: u32 = 0x0010;
    pub const ARCHIVE: u32 = 0x0020;
    pub const TEMPORARY: u32 = 0x0100;
    pub const SPARSE_FILE: u32 = 0x0200;
    pub const REPARSE_POINT: u32 = 0x0400;
    pub const COMPRESSED: u32 = 0x0800;
    pub const OFFLINE: u32 = 0x1000;
    pub const NOT_CONTENT_INDEXED: u32 = 0x2000;
    pub const ENCRYPTED: u32 = 0x4000;

    pub fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }

    pub fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    /// `dir`-style attribute string, e.g. `-A--H---` for an archived hidden file
    pub fn to_letters(self) -> String {
        [
            (Self::DIRECTORY, 'D'),
            (Self::ARCHIVE, 'A'),
            (Self::READONLY, 'R'),
            (Self::SYSTEM, 'S'),
            (Self::HIDDEN, 'H'),
            (Self::COMPRESSED, 'C'),
            (Self::ENCRYPTED, 'E'),
            (Self::REPARSE_POINT, 'J'),
        ]
        .iter()
        .map(|&(bit, letter)| if self.contains(bit) { letter } else { '-' })
        .collect()
    }
}

/// Read-only view of one file's metadata.
///
/// Implementations never fail: unavailable data is reported as `None`,
/// `false` or zero. Lazily computed values must be computed at most once
/// per record.
pub trait FileMetadataView {
    fn path(&self) -> &Path;
    fn size(&self) -> u64;
    fn created(&self) -> Option<DateTime<Utc>>;
    fn modified(&self) -> Option<DateTime<Utc>>;
    fn accessed(&self) -> Option<DateTime<Utc>>;
    fn attributes(&self) -> FileAttributes;

    /// Full file contents, `None` for directories and unreadable files
    fn contents(&self) -> Option<&[u8]>;

    /// Parsed PE headers, `None` for anything that is not a PE image
    fn pe_info(&self) -> Option<&PeInfo>;

    /// Whether the PE header checksum matches the image
    fn pe_checksum_valid(&self) -> bool;

    fn hash(&self, kind: HashKind) -> Option<&[u8]>;

    /// Authenticode signature verified against the system trust store
    fn signature_valid(&self) -> bool;

    /// File is protected by Windows File Protection / SFC
    fn sfc_protected(&self) -> bool;
}

enum FileBytes {
    Mapped(Mmap),
    Empty,
}

impl FileBytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            FileBytes::Mapped(map) => &map[..],
            FileBytes::Empty => &[],
        }
    }
}

/// Metadata for one filesystem entry with compute-once caches
pub struct FileRecord {
    path: PathBuf,
    size: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    accessed: Option<DateTime<Utc>>,
    attributes: FileAttributes,
    contents: OnceLock<Option<FileBytes>>,
    pe: OnceLock<Option<PeInfo>>,
    checksum_valid: OnceLock<bool>,
    hashes: [OnceLock<Option<Vec<u8>>>; 6],
}

impl FileRecord {
    /// Read the metadata of `path`. A missing or unreadable entry still
    /// produces a record, with zero values throughout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let link_meta = fs::symlink_metadata(&path).ok();
        let is_link = link_meta
            .as_ref()
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        let meta = if is_link {
            fs::metadata(&path).ok().or(link_meta)
        } else {
            link_meta
        };

        let mut record = Self::empty(path);
        if let Some(meta) = meta {
            record.size = if meta.is_dir() { 0 } else { meta.len() };
            record.created = meta.created().ok().map(DateTime::<Utc>::from);
            record.modified = meta.modified().ok().map(DateTime::<Utc>::from);
            record.accessed = meta.accessed().ok().map(DateTime::<Utc>::from);
            record.attributes = attributes_of(&record.path, &meta, is_link);
        }
        record
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            size: 0,
            created: None,
            modified: None,
            accessed: None,
            attributes: FileAttributes::default(),
            contents: OnceLock::new(),
            pe: OnceLock::new(),
            checksum_valid: OnceLock::new(),
            hashes: Default::default(),
        }
    }

    fn map_contents(&self) -> Option<FileBytes> {
        if self.attributes.is_directory() {
            return None;
        }
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!("cannot open {}: {}", self.path.display(), e);
                return None;
            }
        };
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Some(FileBytes::Empty);
        }
        // SAFETY: the mapping is read-only and dropped with the record; a
        // concurrent truncation by another process is outside our control.
        match unsafe { Mmap::map(&file) } {
            Ok(map) => Some(FileBytes::Mapped(map)),
            Err(e) => {
                tracing::debug!("cannot map {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl FileMetadataView for FileRecord {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn accessed(&self) -> Option<DateTime<Utc>> {
        self.accessed
    }

    fn attributes(&self) -> FileAttributes {
        self.attributes
    }

    fn contents(&self) -> Option<&[u8]> {
        self.contents
            .get_or_init(|| self.map_contents())
            .as_ref()
            .map(FileBytes::as_slice)
    }

    fn pe_info(&self) -> Option<&PeInfo> {
        self.pe
            .get_or_init(|| self.contents().and_then(PeInfo::parse))
            .as_ref()
    }

    fn pe_checksum_valid(&self) -> bool {
        *self.checksum_valid.get_or_init(|| {
            match (self.pe_info(), self.contents()) {
                (Some(info), Some(data)) => info.checksum_matches(data),
                _ => false,
            }
        })
    }

    fn hash(&self, kind: HashKind) -> Option<&[u8]> {
        self.hashes[kind.index()]
            .get_or_init(|| {
                self.contents()
                    .map(|data| digest::digest_bytes(kind, data))
            })
            .as_deref()
    }

    fn signature_valid(&self) -> bool {
        // Trust verification needs the platform trust provider, which the
        // portable record does not have.
        false
    }

    fn sfc_protected(&self) -> bool {
        false
    }
}

#[cfg(windows)]
fn attributes_of(_path: &Path, meta: &Metadata, _is_link: bool) -> FileAttributes {
    use std::os::windows::fs::MetadataExt;
    FileAttributes(meta.file_attributes())
}

#[cfg(not(windows))]
fn attributes_of(path: &Path, meta: &Metadata, is_link: bool) -> FileAttributes {
    let mut bits = 0;
    if meta.is_dir() {
        bits |= FileAttributes::DIRECTORY;
    }
    if meta.permissions().readonly() {
        bits |= FileAttributes::READONLY;
    }
    if is_link {
        bits |= FileAttributes::REPARSE_POINT;
    }
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false);
    if hidden {
        bits |= FileAttributes::HIDDEN;
    }
    FileAttributes(bits)
}
