//! Sources for `--loadline NAME` text.
//!
//! A resolver turns a name into a line of command-line text, which the
//! parser tokenizes and splices in at its cursor.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub trait LoadLineResolver {
    /// Resolve `name` to command-line text, or explain why it cannot be
    fn load_line(&self, name: &str) -> Result<String, String>;
}

/// Reads the named file; line breaks become spaces
#[derive(Debug, Clone)]
pub struct FileLoadLineResolver {
    base_dir: PathBuf,
}

impl FileLoadLineResolver {
    /// Relative names are read from `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl LoadLineResolver for FileLoadLineResolver {
    fn load_line(&self, name: &str) -> Result<String, String> {
        let path = self.base_dir.join(name);
        let text = fs::read_to_string(&path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        Ok(text
            .trim_start_matches('\u{feff}')
            .lines()
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// Preconfigured name to text table, names compared case-insensitively
#[derive(Debug, Clone, Default)]
pub struct MapLoadLineResolver {
    lines: BTreeMap<String, String>,
}

impl MapLoadLineResolver {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            lines: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
                .collect(),
        }
    }
}

impl LoadLineResolver for MapLoadLineResolver {
    fn load_line(&self, name: &str) -> Result<String, String> {
        self.lines
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| format!("no loadline named '{}' is configured", name))
    }
}

/// Tries each resolver in turn; the first success wins
#[derive(Default)]
pub struct ChainedLoadLineResolver {
    resolvers: Vec<Box<dyn LoadLineResolver>>,
}

impl ChainedLoadLineResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl LoadLineResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }
}

impl LoadLineResolver for ChainedLoadLineResolver {
    fn load_line(&self, name: &str) -> Result<String, String> {
        let mut failures = Vec::new();
        for resolver in &self.resolvers {
            match resolver.load_line(name) {
                Ok(line) => return Ok(line),
                Err(message) => failures.push(message),
            }
        }
        if failures.is_empty() {
            return Err(format!("no loadline source available for '{}'", name));
        }
        Err(failures.join("; "))
    }
}
