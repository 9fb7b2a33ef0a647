//! Command line to criteria tree.
//!
//! [`parse_criteria_expression`] runs the lexer and the parser and returns
//! the tree together with the scan configuration collected from
//! configuration modifiers.

pub mod error;
pub mod lexer;
pub mod loadline;
mod modifiers;
pub mod parser;

pub use error::{LexError, ParseError};
pub use lexer::{Token, TokenKind, tokenize};
pub use loadline::{
    ChainedLoadLineResolver, FileLoadLineResolver, LoadLineResolver, MapLoadLineResolver,
};
pub use parser::{MAX_LOADLINE_SPLICES, MAX_NESTING, Parser};

use crate::config::ScanConfiguration;
use crate::criteria::CriterionTree;

/// Result of a successful parse
#[derive(Debug)]
pub struct ParsedCommand {
    pub tree: CriterionTree,
    pub config: ScanConfiguration,
}

/// Parse `command_line` with a default configuration based in the current
/// directory
pub fn parse_criteria_expression(
    command_line: &str,
    resolver: &dyn LoadLineResolver,
) -> Result<ParsedCommand, ParseError> {
    parse_with_config(command_line, resolver, ScanConfiguration::default())
}

/// Parse `command_line`, starting from `config`
pub fn parse_with_config(
    command_line: &str,
    resolver: &dyn LoadLineResolver,
    config: ScanConfiguration,
) -> Result<ParsedCommand, ParseError> {
    let tokens = tokenize(command_line)?;
    tracing::debug!(tokens = tokens.len(), "parsing criteria expression");
    let (root, config) = Parser::new(tokens, resolver, config).parse()?;
    Ok(ParsedCommand {
        tree: CriterionTree::new(root),
        config,
    })
}
