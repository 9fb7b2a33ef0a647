//! Recursive-descent parser for criteria expressions.
//!
//! Precedence, loosest first:
//!
//! ```text
//! Expression := AndExpr
//! AndExpr    := OrExpr (AND OrExpr)*
//! OrExpr     := XorExpr (OR XorExpr)*
//! XorExpr    := AtomSeq (XOR AtomSeq)*
//! AtomSeq    := Atom+
//! Atom       := NOT AtomSeq | '{' Expression '}' | IF Atom AtomSeq (ELSE AtomSeq)?
//!             | Pattern | Modifier
//! ```
//!
//! Binary operators fold pairwise with the newest operand first, so
//! `a AND b AND c` becomes `And(c, And(b, a))`.

use super::error::ParseError;
use super::lexer::{Token, TokenKind, tokenize_fragment};
use super::loadline::LoadLineResolver;
use super::modifiers::{self, Dispatch};
use crate::config::ScanConfiguration;
use crate::criteria::{Criterion, Leaf, PathPattern};
use chrono::{DateTime, Utc};

/// Upper bound on `--loadline` expansions in one parse
pub const MAX_LOADLINE_SPLICES: usize = 64;

/// Upper bound on the depth of the tree being built: each `NOT`, `IF` or
/// `{` and each folded binary operator adds one level
pub const MAX_NESTING: usize = 256;

static END: Token = Token {
    kind: TokenKind::End,
    lexeme: String::new(),
    payload: None,
};

/// Parser over a token vector with an index cursor.
///
/// `--loadline` inserts tokens at the cursor, so the vector grows while
/// parsing; the cursor stays valid because it is an index.
pub struct Parser<'r> {
    tokens: Vec<Token>,
    cursor: usize,
    resolver: &'r dyn LoadLineResolver,
    config: ScanConfiguration,
    now: DateTime<Utc>,
    splices: usize,
    depth: usize,
}

impl<'r> Parser<'r> {
    pub fn new(
        tokens: Vec<Token>,
        resolver: &'r dyn LoadLineResolver,
        config: ScanConfiguration,
    ) -> Self {
        Self {
            tokens,
            cursor: 0,
            resolver,
            config,
            now: Utc::now(),
            splices: 0,
            depth: 0,
        }
    }

    /// Reference time for relative dates such as `-m+7d`
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Parse the whole stream; anything left before End is an error
    pub fn parse(mut self) -> Result<(Criterion, ScanConfiguration), ParseError> {
        let root = self.expression()?;
        let next = self.peek().kind;
        match next {
            TokenKind::End => Ok((root, self.config)),
            TokenKind::EndBracket => Err(ParseError::UnbalancedBrackets),
            _ => Err(ParseError::TrailingTokens(self.peek().lexeme.clone())),
        }
    }

    fn expression(&mut self) -> Result<Criterion, ParseError> {
        self.and_expr()
    }

    fn and_expr(&mut self) -> Result<Criterion, ParseError> {
        let depth = self.depth;
        let mut left = self.or_expr()?;
        while self.consume(TokenKind::And) {
            self.descend()?;
            let right = self.or_expr()?;
            left = Criterion::and(right, left);
        }
        self.depth = depth;
        Ok(left)
    }

    fn or_expr(&mut self) -> Result<Criterion, ParseError> {
        let depth = self.depth;
        let mut left = self.xor_expr()?;
        while self.consume(TokenKind::Or) {
            self.descend()?;
            let right = self.xor_expr()?;
            left = Criterion::or(right, left);
        }
        self.depth = depth;
        Ok(left)
    }

    fn xor_expr(&mut self) -> Result<Criterion, ParseError> {
        let depth = self.depth;
        let mut left = self.atom_seq()?;
        while self.consume(TokenKind::Xor) {
            self.descend()?;
            let right = self.atom_seq()?;
            left = Criterion::xor(right, left);
        }
        self.depth = depth;
        Ok(left)
    }

    /// Consecutive atoms; more than one criterion becomes a bracket group
    fn atom_seq(&mut self) -> Result<Criterion, ParseError> {
        let mut items = Vec::new();
        while self.peek().starts_atom() {
            self.atom(&mut items)?;
        }
        if items.is_empty() {
            return Err(ParseError::NoQualifiers);
        }
        Ok(Criterion::bracket(items))
    }

    /// The first atom that yields criteria. Configuration modifiers and
    /// loadlines in front of it are applied on the way.
    fn single_atom(&mut self) -> Result<Criterion, ParseError> {
        let mut items = Vec::new();
        while items.is_empty() && self.peek().starts_atom() {
            self.atom(&mut items)?;
        }
        if items.is_empty() {
            return Err(ParseError::NoQualifiers);
        }
        Ok(Criterion::bracket(items))
    }

    /// Parse one atom, appending zero or more criteria to `out`
    fn atom(&mut self, out: &mut Vec<Criterion>) -> Result<(), ParseError> {
        let token = self.next_token();
        match token.kind {
            TokenKind::Not => {
                self.descend()?;
                let inner = self.atom_seq()?;
                self.depth -= 1;
                out.push(Criterion::not(inner));
            }
            TokenKind::Bracket => {
                self.descend()?;
                let inner = self.expression()?;
                if !self.consume(TokenKind::EndBracket) {
                    return Err(ParseError::UnbalancedBrackets);
                }
                self.depth -= 1;
                out.push(inner);
            }
            TokenKind::If => {
                self.descend()?;
                let condition = self.single_atom()?;
                let then = self.atom_seq()?;
                let otherwise = if self.consume(TokenKind::Else) {
                    Some(self.atom_seq()?)
                } else {
                    None
                };
                self.depth -= 1;
                out.push(Criterion::if_then_else(condition, then, otherwise));
            }
            TokenKind::Pattern => {
                let pattern = PathPattern::new(&token.lexeme, &self.config.base_dir)?;
                out.push(Leaf::Pattern(pattern).into());
            }
            TokenKind::Modifier => {
                match modifiers::dispatch(&token, &mut self.config, self.now, out)? {
                    Dispatch::Done => {}
                    Dispatch::LoadLine(name) => {
                        let name = match name {
                            Some(name) => name,
                            None => self.loadline_name(&token)?,
                        };
                        if name.is_empty() {
                            return Err(ParseError::MissingArgument(token.lexeme));
                        }
                        self.splice_loadline(&name)?;
                    }
                }
            }
            _ => return Err(ParseError::TrailingTokens(token.lexeme)),
        }
        Ok(())
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        Ok(())
    }

    /// Name given as the word after `--loadline`
    fn loadline_name(&mut self, token: &Token) -> Result<String, ParseError> {
        if self.peek().kind != TokenKind::Pattern {
            return Err(ParseError::MissingArgument(token.lexeme.clone()));
        }
        Ok(self.next_token().lexeme)
    }

    /// Tokenize the resolved text and insert it at the cursor
    fn splice_loadline(&mut self, name: &str) -> Result<(), ParseError> {
        if self.splices >= MAX_LOADLINE_SPLICES {
            return Err(ParseError::LoadLineDepth(MAX_LOADLINE_SPLICES));
        }
        self.splices += 1;

        let line = self
            .resolver
            .load_line(name)
            .map_err(|message| ParseError::LoadLine {
                name: name.to_string(),
                message,
            })?;
        let tokens = tokenize_fragment(&line)?;
        tracing::debug!(
            name,
            tokens = tokens.len(),
            cursor = self.cursor,
            "splicing loadline"
        );
        self.tokens.splice(self.cursor..self.cursor, tokens);
        Ok(())
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.cursor).unwrap_or(&END)
    }

    /// Take the current token; the cursor never moves past End
    fn next_token(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::End {
            self.cursor += 1;
        }
        token
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.next_token();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::CostClass;
    use crate::query::lexer::tokenize;
    use crate::query::loadline::MapLoadLineResolver;

    fn parse_with(input: &str, resolver: &MapLoadLineResolver) -> Result<Criterion, ParseError> {
        let tokens = tokenize(input)?;
        let config = ScanConfiguration::with_base_dir("/base");
        Parser::new(tokens, resolver, config)
            .parse()
            .map(|(root, _)| root)
    }

    fn parse(input: &str) -> Result<Criterion, ParseError> {
        parse_with(input, &MapLoadLineResolver::default())
    }

    fn tree(input: &str) -> String {
        parse(input).unwrap().describe()
    }

    #[test]
    fn test_size_literals() {
        assert_eq!(tree("-s+100"), "GreaterThanSize(100)\n");
        assert_eq!(tree("-s-100"), "LessThanSize(100)\n");
        assert_eq!(tree("-s=100"), "EqualsSize(100)\n");
    }

    #[test]
    fn test_and_of_pattern_and_directory() {
        assert_eq!(
            tree("\"*.exe\" AND -tD"),
            "AND\n  IsDirectory\n  Pattern(*.exe)\n"
        );
    }

    #[test]
    fn test_not_wraps_following_sequence() {
        assert_eq!(tree("NOT -tH"), "NOT\n  IsHidden\n");
        assert_eq!(tree("not -tH -tS"), "NOT\n  BRACKET\n    IsHidden\n    IsSystem\n");
    }

    #[test]
    fn test_bracket_group() {
        let root = parse("{ -tA -tD }").unwrap();
        match &root {
            Criterion::Bracket(children) => {
                assert_eq!(children.len(), 2);
                assert!(
                    children
                        .iter()
                        .all(|c| c.cost_class() == CostClass::FastAttribute)
                );
            }
            other => panic!("expected bracket, got {other:?}"),
        }
    }

    #[test]
    fn test_type_string_expands_to_bracket() {
        assert_eq!(tree("-tAD"), "BRACKET\n  IsArchive\n  IsDirectory\n");
    }

    #[test]
    fn test_left_fold_order() {
        assert_eq!(
            tree("-tA AND -tD AND -tH"),
            "AND\n  IsHidden\n  AND\n    IsDirectory\n    IsArchive\n"
        );
        assert_eq!(tree("-tA OR -tD"), "OR\n  IsDirectory\n  IsArchive\n");
        assert_eq!(tree("-tA XOR -tD"), "XOR\n  IsDirectory\n  IsArchive\n");
    }

    #[test]
    fn test_precedence() {
        // AND binds loosest, XOR tightest
        assert_eq!(
            tree("-tA OR -tD AND -tH"),
            "AND\n  IsHidden\n  OR\n    IsDirectory\n    IsArchive\n"
        );
        assert_eq!(
            tree("-tA XOR -tD OR -tH"),
            "OR\n  IsHidden\n  XOR\n    IsDirectory\n    IsArchive\n"
        );
        assert_eq!(
            tree("-tA -tS OR -tD"),
            "OR\n  IsDirectory\n  BRACKET\n    IsArchive\n    IsSystem\n"
        );
    }

    #[test]
    fn test_braces_override_precedence() {
        assert_eq!(
            tree("-tA OR { -tD AND -tH }"),
            "OR\n  AND\n    IsHidden\n    IsDirectory\n  IsArchive\n"
        );
    }

    #[test]
    fn test_if_then_else() {
        assert_eq!(
            tree("IF -tD -tH ELSE -tS"),
            "IF\n  IsDirectory\nTHEN\n  IsHidden\nELSE\n  IsSystem\n"
        );
        assert_eq!(
            tree("IF -tD -tH -tA"),
            "IF\n  IsDirectory\nTHEN\n  BRACKET\n    IsHidden\n    IsArchive\n"
        );
        // A type string condition stays one atom
        assert_eq!(
            tree("IF -tDH -tS"),
            "IF\n  BRACKET\n    IsDirectory\n    IsHidden\nTHEN\n  IsSystem\n"
        );
    }

    #[test]
    fn test_if_without_then_fails() {
        assert!(matches!(parse("IF -tD"), Err(ParseError::NoQualifiers)));
        assert!(matches!(parse("IF -tD -tH ELSE"), Err(ParseError::NoQualifiers)));
    }

    #[test]
    fn test_empty_expression() {
        assert!(matches!(parse(""), Err(ParseError::NoQualifiers)));
        assert!(matches!(parse("--long --debug"), Err(ParseError::NoQualifiers)));
        assert!(matches!(parse("-tA AND"), Err(ParseError::NoQualifiers)));
        assert!(matches!(parse("{ }"), Err(ParseError::NoQualifiers)));
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(matches!(parse("{ -tD"), Err(ParseError::UnbalancedBrackets)));
        assert!(matches!(parse("-tD }"), Err(ParseError::UnbalancedBrackets)));
        assert!(matches!(
            parse("{ { -tD } -tA"),
            Err(ParseError::UnbalancedBrackets)
        ));
    }

    #[test]
    fn test_trailing_tokens() {
        assert!(matches!(
            parse("-tD ELSE -tA"),
            Err(ParseError::TrailingTokens(t)) if t == "ELSE"
        ));
    }

    #[test]
    fn test_lex_errors_surface() {
        assert!(matches!(parse("\"*.exe"), Err(ParseError::Lex(_))));
    }

    #[test]
    fn test_invalid_leaf_arguments_abort() {
        assert!(matches!(parse("-tD -s+12Q"), Err(ParseError::InvalidSize(_))));
        assert!(matches!(parse("-m+someday"), Err(ParseError::InvalidDate(_))));
        assert!(matches!(parse("-tQ"), Err(ParseError::InvalidTypeLetter('Q'))));
        assert!(matches!(parse("--bogus"), Err(ParseError::InvalidModifier(_))));
    }

    #[test]
    fn test_configuration_is_returned() {
        let resolver = MapLoadLineResolver::default();
        let tokens = tokenize("*.log --limit#5# -n").unwrap();
        let (_, config) = Parser::new(tokens, &resolver, ScanConfiguration::with_base_dir("/"))
            .parse()
            .unwrap();
        assert_eq!(config.limit, Some(5));
        assert!(!config.recursive);
    }

    #[test]
    fn test_loadline_splices_at_cursor() {
        let resolver = MapLoadLineResolver::new([("pair", "-tA -tD")]);
        assert_eq!(
            parse_with("-tH --loadline pair -tS", &resolver)
                .unwrap()
                .describe(),
            "BRACKET\n  IsHidden\n  IsArchive\n  IsDirectory\n  IsSystem\n"
        );
        assert_eq!(
            parse_with("-tH --loadline#pair# OR -tS", &resolver)
                .unwrap()
                .describe(),
            "OR\n  IsSystem\n  BRACKET\n    IsHidden\n    IsArchive\n    IsDirectory\n"
        );
    }

    #[test]
    fn test_loadline_can_supply_operators() {
        let resolver = MapLoadLineResolver::new([("either", "-tA OR -tD")]);
        assert_eq!(
            parse_with("--loadline either", &resolver).unwrap().describe(),
            "OR\n  IsDirectory\n  IsArchive\n"
        );
    }

    #[test]
    fn test_nested_loadlines() {
        let resolver = MapLoadLineResolver::new([
            ("outer", "-tA --loadline inner -tS"),
            ("inner", "-tD"),
        ]);
        assert_eq!(
            parse_with("--loadline outer", &resolver).unwrap().describe(),
            "BRACKET\n  IsArchive\n  IsDirectory\n  IsSystem\n"
        );
    }

    #[test]
    fn test_empty_loadline_alone_has_no_qualifiers() {
        let resolver = MapLoadLineResolver::new([("nothing", "")]);
        assert!(matches!(
            parse_with("--loadline nothing", &resolver),
            Err(ParseError::NoQualifiers)
        ));
    }

    #[test]
    fn test_loadline_failure_propagates() {
        let err = parse("-tD --loadline missing").unwrap_err();
        match err {
            ParseError::LoadLine { name, message } => {
                assert_eq!(name, "missing");
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            parse("-tD --loadline"),
            Err(ParseError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_self_including_loadline_is_capped() {
        let resolver = MapLoadLineResolver::new([("again", "-tA --loadline again")]);
        assert!(matches!(
            parse_with("--loadline again", &resolver),
            Err(ParseError::LoadLineDepth(MAX_LOADLINE_SPLICES))
        ));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let braces = format!("{}-tA{}", "{ ".repeat(5000), " }".repeat(5000));
        assert!(matches!(
            parse(&braces),
            Err(ParseError::TooDeep(MAX_NESTING))
        ));

        let negations = format!("{}-tA", "NOT ".repeat(5000));
        assert!(matches!(
            parse(&negations),
            Err(ParseError::TooDeep(MAX_NESTING))
        ));

        let conditions = format!("{}-tA", "IF -tD ".repeat(5000));
        assert!(matches!(
            parse(&conditions),
            Err(ParseError::TooDeep(MAX_NESTING))
        ));

        let chain = format!("-tA{}", " OR -tH".repeat(5000));
        assert!(matches!(parse(&chain), Err(ParseError::TooDeep(MAX_NESTING))));
    }

    #[test]
    fn test_nesting_below_the_limit_parses() {
        let depth = MAX_NESTING / 2;
        let braces = format!("{}-tA{}", "{ ".repeat(depth), " }".repeat(depth));
        assert_eq!(parse(&braces).unwrap().describe(), "IsArchive\n");

        // sibling groups do not add up
        let siblings = vec!["{ NOT -tH }"; MAX_NESTING * 2].join(" ");
        assert!(parse(&siblings).is_ok());
    }

    #[test]
    fn test_deep_nesting_through_loadlines_is_rejected() {
        let resolver = MapLoadLineResolver::new([("deep", "{ { { { { { { { { {")]);
        let input = format!("{}-tA", "--loadline deep ".repeat(MAX_LOADLINE_SPLICES));
        assert!(matches!(
            parse_with(&input, &resolver),
            Err(ParseError::TooDeep(MAX_NESTING))
        ));
    }

    #[test]
    fn test_relative_dates_use_reference_time() {
        let resolver = MapLoadLineResolver::default();
        let now = DateTime::parse_from_rfc3339("2024-01-10T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let tokens = tokenize("-c-1d").unwrap();
        let (root, _) = Parser::new(tokens, &resolver, ScanConfiguration::with_base_dir("/"))
            .with_now(now)
            .parse()
            .unwrap();
        assert_eq!(root.describe(), "CreatedBefore(2024-01-09T00:00:00Z)\n");
    }
}
