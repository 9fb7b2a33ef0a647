//! Scan configuration produced by the parser and handed to the scanner and
//! the output formatter.

use std::path::PathBuf;
use std::time::Duration;

/// Key used to order results before printing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Path,
    Size,
    Modified,
    Created,
    Accessed,
}

impl SortKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "name" => Some(SortKey::Name),
            "path" => Some(SortKey::Path),
            "size" => Some(SortKey::Size),
            "modified" | "mtime" | "date" => Some(SortKey::Modified),
            "created" | "ctime" => Some(SortKey::Created),
            "accessed" | "atime" => Some(SortKey::Accessed),
            _ => None,
        }
    }
}

/// Requested result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub key: SortKey,
    pub descending: bool,
}

/// How each matching file is printed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Full path only
    #[default]
    Bare,
    /// Modified time, size and path
    Long,
    /// User template with `{placeholder}` fields
    Template(String),
}

/// Text encoding of the result stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputEncoding {
    #[default]
    Utf8,
    Utf16,
}

impl OutputEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(OutputEncoding::Utf8),
            "utf16" | "utf-16" | "unicode" => Some(OutputEncoding::Utf16),
            _ => None,
        }
    }
}

/// Options collected from configuration modifiers on the command line.
///
/// Modifiers such as `--sort`, `--limit` or `-n` emit no criteria; they
/// update this struct instead. The parser owns it while parsing and returns
/// it next to the criteria tree.
#[derive(Debug, Clone)]
pub struct ScanConfiguration {
    pub sort: Option<SortOrder>,
    pub format: OutputFormat,
    pub encoding: OutputEncoding,
    /// Maximum number of results, `None` for unlimited
    pub limit: Option<usize>,
    /// Wall-clock budget for the whole run
    pub timeout: Option<Duration>,
    pub recursive: bool,
    pub debug: bool,
    pub progress: bool,
    /// Explicit roots from `--root`; empty means derive them from patterns
    pub roots: Vec<PathBuf>,
    /// Directory relative path patterns are resolved against
    pub base_dir: PathBuf,
}

impl Default for ScanConfiguration {
    fn default() -> Self {
        Self {
            sort: None,
            format: OutputFormat::default(),
            encoding: OutputEncoding::default(),
            limit: None,
            timeout: None,
            recursive: true,
            debug: false,
            progress: false,
            roots: Vec::new(),
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl ScanConfiguration {
    /// Configuration whose relative patterns resolve against `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_aliases() {
        assert_eq!(SortKey::from_name("MTIME"), Some(SortKey::Modified));
        assert_eq!(SortKey::from_name("size"), Some(SortKey::Size));
        assert_eq!(SortKey::from_name("bogus"), None);
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(OutputEncoding::from_name("UTF-16"), Some(OutputEncoding::Utf16));
        assert_eq!(OutputEncoding::from_name("utf8"), Some(OutputEncoding::Utf8));
        assert_eq!(OutputEncoding::from_name("ebcdic"), None);
    }

    #[test]
    fn test_defaults() {
        let config = ScanConfiguration::with_base_dir("/tmp");
        assert!(config.recursive);
        assert!(!config.debug);
        assert_eq!(config.limit, None);
        assert_eq!(config.base_dir, PathBuf::from("/tmp"));
    }
}
