//! Performance benchmarks for pevfind
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pevfind::config::ScanConfiguration;
use pevfind::metadata::FileRecord;
use pevfind::query::{MapLoadLineResolver, parse_with_config, tokenize};
use pevfind::scan::Scanner;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const EXPRESSIONS: &[&str] = &[
    "*.exe",
    "-tF -s+1M",
    "\"C:\\Program Files\\*.dll\" -t6",
    "-tA OR -tD AND -tH XOR -tS",
    "IF -tD -tH ELSE { -tF --contains#needle# }",
    "*.log --skip#node_modules# --sort#-size# --limit#100#",
    "--md5#d41d8cd98f00b204e9800998ecf8427e,5d41402abc4b2a76b9719d911017c592# -tF",
];

/// Create a test directory tree with sample files for benchmarking
fn create_benchmark_fixtures() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root_path = temp_dir.path().to_path_buf();

    for d in 0..10 {
        let dir = root_path.join(format!("dir_{}", d));
        fs::create_dir_all(dir.join("nested")).expect("Failed to create dir");
        for i in 0..20 {
            let content = format!("file {d}/{i}\n").repeat(i + 1);
            fs::write(dir.join(format!("file_{}.txt", i)), &content)
                .expect("Failed to write file");
            fs::write(dir.join("nested").join(format!("data_{}.bin", i)), &content)
                .expect("Failed to write file");
        }
    }

    (temp_dir, root_path)
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    for expression in EXPRESSIONS {
        group.bench_with_input(
            BenchmarkId::from_parameter(expression),
            expression,
            |b, &e| b.iter(|| tokenize(black_box(e))),
        );
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let resolver = MapLoadLineResolver::default();
    let mut group = c.benchmark_group("parse");
    for expression in EXPRESSIONS {
        group.bench_with_input(
            BenchmarkId::from_parameter(expression),
            expression,
            |b, &e| {
                b.iter(|| {
                    parse_with_config(
                        black_box(e),
                        &resolver,
                        ScanConfiguration::with_base_dir("/"),
                    )
                })
            },
        );
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let (_temp_dir, root_path) = create_benchmark_fixtures();
    let resolver = MapLoadLineResolver::default();
    let file = root_path.join("dir_3").join("file_7.txt");

    let mut group = c.benchmark_group("evaluate");
    for (name, expression) in [
        ("attributes", "-tF -s+10"),
        ("pattern", "*.txt OR *.bin"),
        ("content", "--contains#file 3/7#"),
        ("hash_after_cheap_miss", "--md5#d41d8cd98f00b204e9800998ecf8427e# -tD"),
    ] {
        let parsed = parse_with_config(
            expression,
            &resolver,
            ScanConfiguration::with_base_dir(&root_path),
        )
        .expect("Failed to parse");
        let mut tree = parsed.tree;
        tree.reorder_tree();
        group.bench_function(name, |b| {
            b.iter(|| tree.evaluate(&FileRecord::new(black_box(&file))))
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let (_temp_dir, root_path) = create_benchmark_fixtures();
    let resolver = MapLoadLineResolver::default();

    let mut group = c.benchmark_group("scan");
    for (name, expression) in [
        ("all_files", "-tF"),
        ("skip_nested", "*.bin --skip#nested#"),
        ("content", "-tF --contains#file 9/19#"),
    ] {
        let parsed = parse_with_config(
            expression,
            &resolver,
            ScanConfiguration::with_base_dir(&root_path),
        )
        .expect("Failed to parse");
        let mut tree = parsed.tree;
        tree.reorder_tree();
        group.bench_function(name, |b| {
            b.iter(|| Scanner::new(&tree, &parsed.config).run())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_parse, bench_evaluate, bench_scan);

criterion_main!(benches);
