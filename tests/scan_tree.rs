//! End-to-end tests: scan a scratch directory tree with the library and
//! with the `pevfind` binary.

use pevfind::config::{OutputFormat, ScanConfiguration};
use pevfind::query::{MapLoadLineResolver, parse_with_config};
use pevfind::scan::{ScanOutcome, Scanner};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// docs/readme.md, docs/guide.txt, build/out.bin, build/cache/blob.bin,
/// notes.txt, .hidden.txt
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::create_dir_all(root.join("build/cache")).unwrap();
    fs::write(root.join("docs/readme.md"), "# Readme\n").unwrap();
    fs::write(root.join("docs/guide.txt"), "step one\nstep two\n").unwrap();
    fs::write(root.join("build/out.bin"), [0x4d, 0x5a, 0x90, 0x00]).unwrap();
    fs::write(root.join("build/cache/blob.bin"), vec![0u8; 4096]).unwrap();
    fs::write(root.join("notes.txt"), "remember the milk").unwrap();
    fs::write(root.join(".hidden.txt"), "").unwrap();
    dir
}

fn scan(dir: &Path, expression: &str) -> ScanOutcome {
    let parsed = parse_with_config(
        expression,
        &MapLoadLineResolver::default(),
        ScanConfiguration::with_base_dir(dir),
    )
    .unwrap();
    let mut tree = parsed.tree;
    tree.reorder_tree();
    if !parsed.config.recursive {
        tree.make_non_recursive();
    }
    Scanner::new(&tree, &parsed.config).run().unwrap()
}

fn relative(outcome: &ScanOutcome, base: &Path) -> Vec<String> {
    outcome
        .matches
        .iter()
        .map(|m| {
            m.path
                .strip_prefix(base)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[test]
fn test_name_pattern_finds_nested_files() {
    let dir = fixture();
    let outcome = scan(dir.path(), "*.txt");
    assert_eq!(
        relative(&outcome, dir.path()),
        vec![".hidden.txt", "docs/guide.txt", "notes.txt"]
    );
}

#[test]
fn test_hidden_files_are_not_filtered_by_walker() {
    let dir = fixture();
    let outcome = scan(dir.path(), "-tF -s=0");
    assert_eq!(relative(&outcome, dir.path()), vec![".hidden.txt"]);
}

#[test]
fn test_hex_content_search() {
    let dir = fixture();
    let outcome = scan(dir.path(), "-tF --hex#4D5A90#");
    assert_eq!(relative(&outcome, dir.path()), vec!["build/out.bin"]);
}

#[test]
fn test_directories_can_match() {
    let dir = fixture();
    let outcome = scan(dir.path(), "-tD");
    assert_eq!(
        relative(&outcome, dir.path()),
        vec!["build", "build/cache", "docs"]
    );
}

#[test]
fn test_rooted_pattern_prunes_other_directories() {
    let dir = fixture();
    let pattern = format!("{}/build/*.bin", dir.path().display());
    let outcome = scan(dir.path(), &format!("\"{}\"", pattern));
    assert_eq!(
        relative(&outcome, dir.path()),
        vec!["build/cache/blob.bin", "build/out.bin"]
    );
    // docs/ and the top-level files are never reached
    assert_eq!(outcome.stats.visited, 3);
}

#[test]
fn test_skip_directory_by_name() {
    let dir = fixture();
    let outcome = scan(dir.path(), "*.bin --skip#cache#");
    assert_eq!(relative(&outcome, dir.path()), vec!["build/out.bin"]);
    assert_eq!(outcome.stats.pruned, 1);
}

#[test]
fn test_sorted_by_size_descending_with_limit() {
    let dir = fixture();
    let outcome = scan(dir.path(), "-tF --sort#-size# --limit#2#");
    assert_eq!(
        relative(&outcome, dir.path()),
        vec!["build/cache/blob.bin", "docs/guide.txt"]
    );
}

#[test]
fn test_template_output_line() {
    let dir = fixture();
    let outcome = scan(dir.path(), "notes.txt --format#{name}:{size}:{md5}#");
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(
        outcome.matches[0].line,
        "notes.txt:17:1c6e76593ebd1c93bc2934c3e57f810c"
    );
}

#[test]
fn test_long_format_is_recorded() {
    let dir = fixture();
    let parsed = parse_with_config(
        "*.md --long",
        &MapLoadLineResolver::default(),
        ScanConfiguration::with_base_dir(dir.path()),
    )
    .unwrap();
    assert_eq!(parsed.config.format, OutputFormat::Long);
    let outcome = Scanner::new(&parsed.tree, &parsed.config).run().unwrap();
    assert!(outcome.matches[0].line.ends_with("readme.md"));
}

fn pevfind(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pevfind"))
        .args(args)
        .current_dir(dir)
        .env("XDG_DATA_HOME", dir.join(".appdata"))
        .env("PEVFIND_LOG", "off")
        .output()
        .expect("Failed to run pevfind")
}

#[test]
fn test_binary_prints_bare_paths() {
    let dir = fixture();
    let output = pevfind(dir.path(), &["*.md"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("readme.md"), "{stdout}");
}

#[test]
fn test_binary_tree_subcommand() {
    let dir = fixture();
    let output = pevfind(dir.path(), &["tree", "--md5#d41d8cd98f00b204e9800998ecf8427e#", "-tH"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "BRACKET\n  IsHidden\n  MD5In[d41d8cd98f00b204e9800998ecf8427e]\n"
    );
}

#[test]
fn test_binary_reports_parse_errors() {
    let dir = fixture();
    let output = pevfind(dir.path(), &["{", "-tD"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(!output.stderr.is_empty());
}
