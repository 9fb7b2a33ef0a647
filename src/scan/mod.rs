//! Directory walker driving a criteria tree.
//!
//! Every entry below a scan root is evaluated; directories whose
//! [`DirectoryDecision`] is Exclude are not descended into.

pub mod watchdog;

use crate::config::ScanConfiguration;
use crate::criteria::{CriterionTree, DirectoryDecision};
use crate::metadata::{FileMetadataView, FileRecord};
use crate::output::render_line;
use crate::utils::progress::{ProgressBar, ProgressStyle};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use ignore::{WalkBuilder, WalkState};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;

/// One matching entry
#[derive(Debug, Clone)]
pub struct ScanMatch {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    /// Output line rendered while the metadata was loaded
    pub line: String,
}

impl ScanMatch {
    fn from_record(record: &FileRecord, config: &ScanConfiguration) -> Self {
        Self {
            path: record.path().to_path_buf(),
            size: record.size(),
            modified: record.modified(),
            created: record.created(),
            accessed: record.accessed(),
            line: render_line(&config.format, record),
        }
    }
}

/// Counters reported after a scan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Entries evaluated against the tree
    pub visited: usize,
    /// Directories not descended into
    pub pruned: usize,
    pub matched: usize,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub matches: Vec<ScanMatch>,
    pub stats: ScanStats,
}

/// Roots to walk: explicit roots, else pattern roots, else the base
/// directory. Nested roots are dropped so nothing is reported twice.
pub fn scan_roots(tree: &CriterionTree, config: &ScanConfiguration) -> Vec<PathBuf> {
    let mut roots = if !config.roots.is_empty() {
        config.roots.clone()
    } else {
        let from_patterns = tree.pattern_roots();
        if from_patterns.is_empty() {
            vec![config.base_dir.clone()]
        } else {
            from_patterns
                .iter()
                .map(|root| resolve_root_case(root))
                .collect()
        }
    };

    roots.sort();
    roots.dedup();
    let mut kept: Vec<PathBuf> = Vec::new();
    for root in roots {
        if !kept.iter().any(|k| root.starts_with(k)) {
            kept.push(root);
        }
    }
    kept
}

/// Spell a pattern root the way it exists on disk.
///
/// Patterns match case-insensitively, so `LOGS/*.log` must walk `logs/`
/// on a case-sensitive filesystem too. Components are looked up one at a
/// time, an exact name winning over a case-folded one; from the first
/// component that cannot be found the rest is kept as typed.
fn resolve_root_case(root: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    let mut components = root.components();
    while let Some(component) = components.next() {
        let Component::Normal(name) = component else {
            resolved.push(component);
            continue;
        };
        match on_disk_name(&resolved, name) {
            Some(found) => resolved.push(found),
            None => {
                resolved.push(name);
                resolved.extend(components.by_ref());
                break;
            }
        }
    }
    resolved
}

fn on_disk_name(dir: &Path, name: &OsStr) -> Option<OsString> {
    let entries = fs::read_dir(dir).ok()?;
    let wanted = name.to_string_lossy().to_lowercase();
    let mut folded = None;
    for entry in entries.flatten() {
        let candidate = entry.file_name();
        if candidate == name {
            return Some(candidate);
        }
        if folded.is_none() && candidate.to_string_lossy().to_lowercase() == wanted {
            folded = Some(candidate);
        }
    }
    folded
}

/// Walk with a parallel directory walker
pub struct Scanner<'t> {
    tree: &'t CriterionTree,
    config: &'t ScanConfiguration,
    threads: usize,
}

impl<'t> Scanner<'t> {
    pub fn new(tree: &'t CriterionTree, config: &'t ScanConfiguration) -> Self {
        Self {
            tree,
            config,
            threads: 0,
        }
    }

    /// Walker threads, 0 lets the walker choose
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn run(&self) -> Result<ScanOutcome> {
        let roots = scan_roots(self.tree, self.config);
        let Some((first, rest)) = roots.split_first() else {
            bail!("no directory to scan");
        };
        for root in &roots {
            if !root.exists() {
                tracing::warn!("scan root {} does not exist", root.display());
            }
        }
        tracing::debug!(roots = ?roots, threads = self.threads, "starting scan");

        let mut builder = WalkBuilder::new(first);
        for root in rest {
            builder.add(root);
        }
        builder
            .standard_filters(false)
            .follow_links(false)
            .threads(self.threads);
        if !self.config.recursive {
            builder.max_depth(Some(1));
        }

        let progress = self.progress_bar();
        let visited = AtomicUsize::new(0);
        let pruned = AtomicUsize::new(0);
        let matched = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        // Quitting early is only correct when no sort reorders the results
        let early_limit = if self.config.sort.is_none() {
            self.config.limit
        } else {
            None
        };

        let (tx, rx) = mpsc::channel::<ScanMatch>();
        builder.build_parallel().run(|| {
            let tx = tx.clone();
            let progress = progress.clone();
            let (visited, pruned, matched, stop) = (&visited, &pruned, &matched, &stop);
            Box::new(move |entry| {
                if stop.load(Ordering::Relaxed) {
                    return WalkState::Quit;
                }
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!("walk error: {}", e);
                        return WalkState::Continue;
                    }
                };
                // Roots themselves are never results
                if entry.depth() == 0 {
                    return WalkState::Continue;
                }

                let record = FileRecord::new(entry.path());
                let count = visited.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 256 == 0 {
                    progress.set_message(format!("{} entries", count));
                }

                if self.tree.evaluate(&record) {
                    let n = matched.fetch_add(1, Ordering::Relaxed) + 1;
                    if tx.send(ScanMatch::from_record(&record, self.config)).is_err() {
                        return WalkState::Quit;
                    }
                    if early_limit.is_some_and(|limit| n >= limit) {
                        stop.store(true, Ordering::Relaxed);
                        return WalkState::Quit;
                    }
                }

                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if is_dir && self.prune(entry.path()) {
                    pruned.fetch_add(1, Ordering::Relaxed);
                    return WalkState::Skip;
                }
                WalkState::Continue
            })
        });
        drop(tx);

        let mut matches: Vec<ScanMatch> = rx.into_iter().collect();
        progress.finish_and_clear();

        if let Some(order) = self.config.sort {
            crate::output::sort_matches(&mut matches, order);
        } else {
            // Parallel walking reports in no fixed order
            matches.sort_by(|a, b| a.path.cmp(&b.path));
        }
        if let Some(limit) = self.config.limit {
            matches.truncate(limit);
        }

        let stats = ScanStats {
            visited: visited.into_inner(),
            pruned: pruned.into_inner(),
            matched: matches.len(),
        };
        tracing::debug!(?stats, "scan finished");
        Ok(ScanOutcome { matches, stats })
    }

    fn prune(&self, dir: &Path) -> bool {
        let decision = self.tree.directory_decision(dir);
        tracing::trace!(dir = %dir.display(), ?decision, "directory decision");
        decision == DirectoryDecision::Exclude
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Scanning...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner
    }
}
