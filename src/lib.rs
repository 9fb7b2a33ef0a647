//! # pevfind - file search by criteria expression
//!
//! pevfind finds files with a small boolean language: wildcard and regex
//! path patterns, attribute letters, size and date comparisons, PE header
//! tests, hash lists and content searches, joined with `AND`, `OR`, `XOR`,
//! `NOT`, `{ }` groups and `IF ... ELSE ...`.
//!
//! ## Architecture
//!
//! - [`query`] - Lexer, recursive-descent parser and loadline splicing
//! - [`criteria`] - Criterion tree, cost reordering and directory pruning
//! - [`metadata`] - Lazily computed file facts (PE header, hashes, contents)
//! - [`scan`] - Parallel directory walk driven by a criterion tree
//! - [`output`] - Result lines, sorting and encoded printing
//! - [`config`] - Scan options collected from configuration modifiers
//! - [`utils`] - App data config, output encoders, progress spinner
//!
//! ## Quick Start
//!
//! ```no_run
//! use pevfind::query::{parse_criteria_expression, MapLoadLineResolver};
//! use pevfind::scan::Scanner;
//!
//! let resolver = MapLoadLineResolver::default();
//! let parsed = parse_criteria_expression("*.dll -t6 --sort#-size#", &resolver).unwrap();
//! let mut tree = parsed.tree;
//! tree.reorder_tree();
//!
//! let outcome = Scanner::new(&tree, &parsed.config).run().unwrap();
//! for m in outcome.matches {
//!     println!("{}", m.line);
//! }
//! ```
//!
//! ## Evaluation cost
//!
//! Every criterion has a cost class, from plain attribute bits up to
//! signature checks. Reordering moves cheap operands first so `AND` and
//! `OR` short-circuit before a file is hashed or read.

pub mod config;
pub mod criteria;
pub mod metadata;
pub mod output;
pub mod query;
pub mod scan;
pub mod utils;
