//! Modifier dispatch: turns one `-x...` / `--name#...#` token into
//! criteria and configuration changes.

use super::error::ParseError;
use super::lexer::Token;
use crate::config::{OutputEncoding, OutputFormat, ScanConfiguration, SortKey, SortOrder};
use crate::criteria::{
    AttributeTest, Criterion, DateComparison, DateField, Leaf, PathRegex, SizeComparison,
    SkipDirectory,
};
use crate::metadata::HashKind;
use crate::metadata::digest::from_hex;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use std::time::Duration;

/// What the parser must do after a modifier was applied
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Done,
    /// `--loadline`; `None` when the name is the next token
    LoadLine(Option<String>),
}

/// Apply one modifier token. Criteria are appended to `out` (zero or more),
/// configuration modifiers update `config`.
pub(crate) fn dispatch(
    token: &Token,
    config: &mut ScanConfiguration,
    now: DateTime<Utc>,
    out: &mut Vec<Criterion>,
) -> Result<Dispatch, ParseError> {
    let lexeme = token.lexeme.as_str();
    match lexeme.strip_prefix("--") {
        Some(name) => dispatch_long(lexeme, &name.to_ascii_lowercase(), token, config, out),
        None => dispatch_short(lexeme, token, config, now, out).map(|_| Dispatch::Done),
    }
}

fn dispatch_short(
    lexeme: &str,
    token: &Token,
    config: &mut ScanConfiguration,
    now: DateTime<Utc>,
    out: &mut Vec<Criterion>,
) -> Result<(), ParseError> {
    let mut chars = lexeme[1..].chars();
    let letter = match chars.next() {
        Some(c) => c.to_ascii_lowercase(),
        None => return Err(ParseError::InvalidModifier(lexeme.to_string())),
    };
    let inline = chars.as_str();
    let arg = if inline.is_empty() {
        token.payload.as_deref().unwrap_or("")
    } else {
        inline
    };

    match letter {
        't' => {
            if arg.is_empty() {
                return Err(ParseError::MissingArgument(lexeme.to_string()));
            }
            for c in arg.chars() {
                let test = AttributeTest::from_letter(c).ok_or(ParseError::InvalidTypeLetter(c))?;
                out.push(Leaf::Attribute(test).into());
            }
        }
        's' => {
            let (comparison, bytes) = parse_size(arg)?;
            out.push(Leaf::Size { comparison, bytes }.into());
        }
        'c' | 'm' | 'a' | 'p' => {
            let field = match letter {
                'c' => DateField::Created,
                'm' => DateField::Modified,
                'a' => DateField::Accessed,
                _ => DateField::Header,
            };
            let (comparison, at) = parse_date_comparison(arg, now)?;
            out.push(
                Leaf::Date {
                    field,
                    comparison,
                    at,
                }
                .into(),
            );
        }
        'n' if arg.is_empty() => config.recursive = false,
        _ => return Err(ParseError::InvalidModifier(lexeme.to_string())),
    }
    Ok(())
}

fn dispatch_long(
    lexeme: &str,
    name: &str,
    token: &Token,
    config: &mut ScanConfiguration,
    out: &mut Vec<Criterion>,
) -> Result<Dispatch, ParseError> {
    let payload = || {
        token
            .payload
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ParseError::MissingArgument(lexeme.to_string()))
    };

    if let Some(kind) = HashKind::from_name(name) {
        let digests = parse_hash_list(kind, payload()?)?;
        out.push(Leaf::Hash { kind, digests }.into());
        return Ok(Dispatch::Done);
    }

    match name {
        "loadline" => return Ok(Dispatch::LoadLine(token.payload.clone())),
        "contains" => out.push(
            Leaf::Content {
                needle: payload()?.as_bytes().to_vec(),
                hex: false,
            }
            .into(),
        ),
        "hex" => {
            let text = payload()?;
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            let needle = from_hex(&compact)
                .filter(|bytes| !bytes.is_empty())
                .ok_or_else(|| ParseError::InvalidHex(text.to_string()))?;
            out.push(Leaf::Content { needle, hex: true }.into());
        }
        "regex" => out.push(Leaf::Regex(PathRegex::new(payload()?)?).into()),
        "skip" => out.push(Leaf::Skip(SkipDirectory::new(payload()?, &config.base_dir)).into()),
        "root" => {
            let root = config.base_dir.join(payload()?);
            config.roots.push(root);
        }
        "sort" => {
            let value = payload()?;
            let (descending, key_name) = match value.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, value),
            };
            let key = SortKey::from_name(key_name).ok_or_else(|| ParseError::InvalidOption {
                modifier: lexeme.to_string(),
                value: value.to_string(),
            })?;
            config.sort = Some(SortOrder { key, descending });
        }
        "limit" => config.limit = Some(parse_number(lexeme, payload()?)? as usize),
        "timeout" => {
            config.timeout = Some(Duration::from_millis(parse_number(lexeme, payload()?)?))
        }
        "format" => config.format = OutputFormat::Template(payload()?.to_string()),
        "long" => config.format = OutputFormat::Long,
        "encoding" => {
            let value = payload()?;
            config.encoding =
                OutputEncoding::from_name(value).ok_or_else(|| ParseError::InvalidOption {
                    modifier: lexeme.to_string(),
                    value: value.to_string(),
                })?;
        }
        "norecurse" => config.recursive = false,
        "debug" => config.debug = true,
        "progress" => config.progress = true,
        _ => return Err(ParseError::InvalidModifier(lexeme.to_string())),
    }
    Ok(Dispatch::Done)
}

fn parse_number(modifier: &str, value: &str) -> Result<u64, ParseError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidNumber {
            modifier: modifier.to_string(),
            value: value.to_string(),
        })
}

fn parse_hash_list(kind: HashKind, list: &str) -> Result<Vec<Vec<u8>>, ParseError> {
    let mut digests = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match from_hex(item) {
            Some(bytes) if bytes.len() == kind.digest_len() => digests.push(bytes),
            _ => return Err(ParseError::InvalidHash(item.to_string())),
        }
    }
    if digests.is_empty() {
        return Err(ParseError::InvalidHash(list.to_string()));
    }
    Ok(digests)
}

/// `[+-=]N[K|M|G|T]`, units are powers of 1024, no sign means equal
pub(crate) fn parse_size(text: &str) -> Result<(SizeComparison, u64), ParseError> {
    let invalid = || ParseError::InvalidSize(text.to_string());
    let (comparison, rest) = match text.chars().next() {
        Some('+') => (SizeComparison::Greater, &text[1..]),
        Some('-') => (SizeComparison::Less, &text[1..]),
        Some('=') => (SizeComparison::Equal, &text[1..]),
        _ => (SizeComparison::Equal, text),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, unit) = rest.split_at(digits_end);
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let shift = match unit.to_ascii_uppercase().as_str() {
        "" => 0,
        "K" => 10,
        "M" => 20,
        "G" => 30,
        "T" => 40,
        _ => return Err(invalid()),
    };
    let bytes = value.checked_mul(1u64 << shift).ok_or_else(invalid)?;
    Ok((comparison, bytes))
}

/// `+DATE` (after) or `-DATE` (before)
pub(crate) fn parse_date_comparison(
    text: &str,
    now: DateTime<Utc>,
) -> Result<(DateComparison, DateTime<Utc>), ParseError> {
    let (comparison, rest) = match text.chars().next() {
        Some('+') => (DateComparison::After, &text[1..]),
        Some('-') => (DateComparison::Before, &text[1..]),
        _ => return Err(ParseError::InvalidDate(text.to_string())),
    };
    Ok((comparison, parse_date(rest, now)?))
}

/// Absolute local date/time or a relative `N[d|h]` before `now`
pub(crate) fn parse_date(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ParseError> {
    let invalid = || ParseError::InvalidDate(text.to_string());

    if let Some(amount) = text.strip_suffix(['d', 'D']) {
        let days: i64 = amount.parse().map_err(|_| invalid())?;
        return TimeDelta::try_days(days)
            .and_then(|d| now.checked_sub_signed(d))
            .ok_or_else(invalid);
    }
    if let Some(amount) = text.strip_suffix(['h', 'H']) {
        let hours: i64 = amount.parse().map_err(|_| invalid())?;
        return TimeDelta::try_hours(hours)
            .and_then(|d| now.checked_sub_signed(d))
            .ok_or_else(invalid);
    }

    let naive = if text.contains('T') {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
            .map_err(|_| invalid())?
    } else {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|_| invalid())?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(invalid)?
    };
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}
