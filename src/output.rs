//! Result rendering: per-file lines, sorting and printing

use crate::config::{OutputEncoding, OutputFormat, SortKey, SortOrder};
use crate::metadata::digest::to_hex;
use crate::metadata::{FileMetadataView, HashKind};
use crate::scan::ScanMatch;
use crate::utils::encoding::{encode_line, preamble};
use chrono::{DateTime, Local, Utc};
use std::cmp::Ordering;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render one result line while the file's metadata is at hand
pub fn render_line(format: &OutputFormat, file: &dyn FileMetadataView) -> String {
    match format {
        OutputFormat::Bare => file.path().display().to_string(),
        OutputFormat::Long => format!(
            "{}  {:>14}  {}  {}",
            format_time(file.modified()),
            file.size(),
            file.attributes().to_letters(),
            file.path().display()
        ),
        OutputFormat::Template(template) => render_template(template, file),
    }
}

/// Replace `{placeholder}` fields; unknown fields are copied unchanged
pub fn render_template(template: &str, file: &dyn FileMetadataView) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let field = &after[..close];
                match placeholder(field, file) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(field);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn placeholder(field: &str, file: &dyn FileMetadataView) -> Option<String> {
    let path = file.path();
    let value = match field {
        "path" => path.display().to_string(),
        "name" => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        "dir" => path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        "size" => file.size().to_string(),
        "mtime" => format_time(file.modified()),
        "ctime" => format_time(file.created()),
        "atime" => format_time(file.accessed()),
        "attrs" => file.attributes().to_letters(),
        "pets" => format_time(
            file.pe_info()
                .and_then(|pe| DateTime::from_timestamp(pe.timestamp as i64, 0)),
        ),
        other => {
            let kind = HashKind::from_name(other)?;
            file.hash(kind).map(to_hex).unwrap_or_default()
        }
    };
    Some(value)
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.with_timezone(&Local).format(TIME_FORMAT).to_string(),
        None => "-".repeat(19),
    }
}

/// Sort results in place; ties fall back to the path
pub fn sort_matches(matches: &mut [ScanMatch], order: SortOrder) {
    matches.sort_by(|a, b| {
        let ordering = compare(a, b, order.key).then_with(|| a.path.cmp(&b.path));
        if order.descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn compare(a: &ScanMatch, b: &ScanMatch, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => {
            let name = |m: &ScanMatch| {
                m.path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default()
            };
            name(a).cmp(&name(b))
        }
        SortKey::Path => a
            .path
            .to_string_lossy()
            .to_lowercase()
            .cmp(&b.path.to_string_lossy().to_lowercase()),
        SortKey::Size => a.size.cmp(&b.size),
        SortKey::Modified => a.modified.cmp(&b.modified),
        SortKey::Created => a.created.cmp(&b.created),
        SortKey::Accessed => a.accessed.cmp(&b.accessed),
    }
}

/// Print results to stdout in the configured encoding
pub fn print_matches(
    matches: &[ScanMatch],
    format: &OutputFormat,
    encoding: OutputEncoding,
    color: bool,
) -> io::Result<()> {
    match encoding {
        OutputEncoding::Utf8 => {
            let choice = if color {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            };
            let mut stdout = StandardStream::stdout(choice);
            write_colored(&mut stdout, matches, format)
        }
        OutputEncoding::Utf16 => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_encoded(&mut lock, matches, encoding)
        }
    }
}

/// Bare paths are highlighted; other formats are written as rendered
pub fn write_colored<W: WriteColor>(
    out: &mut W,
    matches: &[ScanMatch],
    format: &OutputFormat,
) -> io::Result<()> {
    for m in matches {
        if *format == OutputFormat::Bare {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(out, "{}", m.line)?;
            out.reset()?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", m.line)?;
        }
    }
    out.flush()
}

pub fn write_encoded<W: Write>(
    out: &mut W,
    matches: &[ScanMatch],
    encoding: OutputEncoding,
) -> io::Result<()> {
    let mut buf = preamble(encoding).to_vec();
    for m in matches {
        encode_line(&m.line, encoding, &mut buf);
    }
    out.write_all(&buf)?;
    out.flush()
}
