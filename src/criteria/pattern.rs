//! Path-based predicates: wildcard patterns, path regexes and skip rules.
//!
//! Paths are compared with `/` as the separator and case-insensitively, the
//! way Windows resolves them. `\` in patterns and paths is treated as `/`.

use super::DirectoryDecision;
use crate::query::ParseError;
use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};

/// Replace `\` with `/`
pub(crate) fn normalize_separators(text: &str) -> String {
    text.replace('\\', "/")
}

/// Normalized, lowercased form of a directory path with a trailing `/`
fn directory_key(path: &Path) -> String {
    let mut key = normalize_separators(&path.to_string_lossy()).to_lowercase();
    if !key.ends_with('/') {
        key.push('/');
    }
    key
}

fn is_absolute(normalized: &str) -> bool {
    if normalized.starts_with('/') {
        return true;
    }
    let bytes = normalized.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Join a relative path text onto `base_dir`
fn absolutize(normalized: &str, base_dir: &Path) -> String {
    if is_absolute(normalized) {
        return normalized.to_string();
    }
    let base = normalize_separators(&base_dir.to_string_lossy());
    let rest = normalized.strip_prefix("./").unwrap_or(normalized);
    format!("{}/{}", base.trim_end_matches('/'), rest)
}

/// Escape glob metacharacters that plain wildcards do not use
fn escape_for_glob(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '[' | ']' | '{' | '}' => {
                out.push('[');
                out.push(ch);
                out.push(']');
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Wildcard pattern (`*`, `?`) matched against a file name, or against the
/// full path when the pattern contains a separator.
#[derive(Debug, Clone)]
pub struct PathPattern {
    text: String,
    matcher: GlobMatcher,
    full_path: bool,
    /// Lowercased literal directory prefix, ends with `/`
    root_key: Option<String>,
    root_dir: Option<PathBuf>,
    prunes: bool,
}

impl PathPattern {
    pub fn new(text: &str, base_dir: &Path) -> Result<Self, ParseError> {
        let normalized = normalize_separators(text);
        let full_path = normalized.contains('/');
        let target = if full_path {
            absolutize(&normalized, base_dir)
        } else {
            normalized
        };

        let glob = GlobBuilder::new(&escape_for_glob(&target))
            .case_insensitive(true)
            .literal_separator(false)
            .backslash_escape(false)
            .build()
            .map_err(|e| ParseError::InvalidPattern {
                pattern: text.to_string(),
                message: e.to_string(),
            })?;

        let (root_key, root_dir) = if full_path {
            let literal_end = target.find(['*', '?']).unwrap_or(target.len());
            match target[..literal_end].rfind('/') {
                Some(slash) => {
                    let root = &target[..=slash];
                    (Some(root.to_lowercase()), Some(PathBuf::from(root)))
                }
                None => (None, None),
            }
        } else {
            (None, None)
        };

        Ok(Self {
            text: text.to_string(),
            matcher: glob.compile_matcher(),
            full_path,
            root_key,
            root_dir,
            prunes: true,
        })
    }

    /// The pattern as written
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Literal directory the pattern is anchored at, if any
    pub fn root_dir(&self) -> Option<&Path> {
        self.root_dir.as_deref()
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.full_path {
            let candidate = normalize_separators(&path.to_string_lossy());
            self.matcher.is_match(candidate.as_str())
        } else {
            match path.file_name() {
                Some(name) => self.matcher.is_match(name.to_string_lossy().as_ref()),
                None => false,
            }
        }
    }

    /// Include when `dir` lies on the way to the pattern root or inside it,
    /// Exclude anywhere else, DontCare without a literal root.
    pub fn directory_decision(&self, dir: &Path) -> DirectoryDecision {
        let root = match (&self.root_key, self.prunes) {
            (Some(root), true) => root,
            _ => return DirectoryDecision::DontCare,
        };
        let dir = directory_key(dir);
        if root.starts_with(&dir) || dir.starts_with(root.as_str()) {
            DirectoryDecision::Include
        } else {
            DirectoryDecision::Exclude
        }
    }

    pub(crate) fn disable_pruning(&mut self) {
        self.prunes = false;
    }

    pub fn prunes(&self) -> bool {
        self.prunes && self.root_key.is_some()
    }
}

/// Case-insensitive regular expression over the full path
#[derive(Debug, Clone)]
pub struct PathRegex {
    text: String,
    regex: Regex,
}

impl PathRegex {
    pub fn new(text: &str) -> Result<Self, ParseError> {
        let regex = RegexBuilder::new(text).case_insensitive(true).build()?;
        Ok(Self {
            text: text.to_string(),
            regex,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.regex.is_match(&path.to_string_lossy())
    }
}

/// Directory excluded from the search, by path prefix or by name
#[derive(Debug, Clone)]
pub struct SkipDirectory {
    text: String,
    rule: SkipRule,
}

#[derive(Debug, Clone)]
enum SkipRule {
    /// Lowercased directory key ending with `/`
    Prefix(String),
    /// Lowercased component name
    Name(String),
}

impl SkipDirectory {
    pub fn new(text: &str, base_dir: &Path) -> Self {
        let normalized = normalize_separators(text);
        let rule = if normalized.contains('/') {
            let mut key = absolutize(&normalized, base_dir).to_lowercase();
            if !key.ends_with('/') {
                key.push('/');
            }
            SkipRule::Prefix(key)
        } else {
            SkipRule::Name(normalized.to_lowercase())
        };
        Self {
            text: text.to_string(),
            rule,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether `path` is the skipped directory or lies beneath it
    pub fn covers(&self, path: &Path) -> bool {
        match &self.rule {
            SkipRule::Prefix(prefix) => directory_key(path).starts_with(prefix.as_str()),
            SkipRule::Name(name) => normalize_separators(&path.to_string_lossy())
                .split('/')
                .any(|component| component.to_lowercase() == *name),
        }
    }
}
