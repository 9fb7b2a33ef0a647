//! Utility functions shared by the binary and the library.
//!
//! ## Modules
//!
//! - [`app_data`] - Application data directory and persisted config
//! - [`encoding`] - UTF-8 / UTF-16LE line encoders for the result stream
//! - [`progress`] - Progress spinner, no-op without the `progress` feature

pub mod app_data;
pub mod encoding;
pub mod progress;

pub use app_data::{AppConfig, get_app_data_dir, get_config_path};
pub use encoding::{UTF16LE_BOM, encode_line, preamble};
