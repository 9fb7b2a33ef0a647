//! Error types produced while turning a command line into a criteria tree.

use thiserror::Error;

/// Malformed quoting in the raw command line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated quote starting at offset {0}")]
    UnterminatedQuote(usize),

    #[error("unterminated #...# option payload starting at offset {0}")]
    UnterminatedPayload(usize),
}

/// Every way a parse can fail. A failed parse never yields a partial tree.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("no qualifiers: the expression selects nothing to search for")]
    NoQualifiers,

    #[error("unbalanced brackets")]
    UnbalancedBrackets,

    #[error("unexpected trailing input starting at '{0}'")]
    TrailingTokens(String),

    #[error("invalid modifier '{0}'")]
    InvalidModifier(String),

    #[error("modifier '{0}' requires an argument")]
    MissingArgument(String),

    #[error("invalid type letter '{0}'")]
    InvalidTypeLetter(char),

    #[error("invalid size literal '{0}'")]
    InvalidSize(String),

    #[error("invalid date literal '{0}'")]
    InvalidDate(String),

    #[error("invalid number '{value}' for {modifier}")]
    InvalidNumber { modifier: String, value: String },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("invalid hash '{0}'")]
    InvalidHash(String),

    #[error("invalid hex string '{0}'")]
    InvalidHex(String),

    #[error("invalid value '{value}' for {modifier}")]
    InvalidOption { modifier: String, value: String },

    #[error("loadline '{name}' failed: {message}")]
    LoadLine { name: String, message: String },

    #[error("loadline expansion exceeded {0} splices")]
    LoadLineDepth(usize),

    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}
