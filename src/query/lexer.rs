//! Tokenizer for criteria command lines.
//!
//! Words are separated by whitespace. A word starting with `-` is a
//! modifier; everything else is a pattern unless it is a lone `{`, `}` or
//! one of the keywords `AND`, `OR`, `XOR`, `NOT`, `IF`, `ELSE` (any case).
//! Double quotes group text containing spaces and always yield a pattern.
//!
//! Modifiers may carry a `#...#` payload, e.g. `--md5#a1b2,c3d4#`. Inside
//! the payload whitespace is kept and `##` stands for a literal `#`.

use super::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Bracket,
    EndBracket,
    And,
    Or,
    Xor,
    Not,
    If,
    Else,
    Pattern,
    Modifier,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Word text with quotes removed; for modifiers the part before `#`
    pub lexeme: String,
    /// `#...#` payload of a modifier
    pub payload: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            payload: None,
        }
    }

    pub fn end() -> Self {
        Self::new(TokenKind::End, "")
    }

    /// Whether this token can start an atom
    pub fn starts_atom(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Bracket
                | TokenKind::Not
                | TokenKind::If
                | TokenKind::Pattern
                | TokenKind::Modifier
        )
    }
}

/// Tokenize a full command line, terminated by an End token
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = tokenize_fragment(input)?;
    tokens.push(Token::end());
    Ok(tokens)
}

/// Tokenize text to be spliced into an existing stream; no End token
pub fn tokenize_fragment(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).run()
}

/// Keyword lookup by length, then by letter
fn keyword(word: &str) -> Option<TokenKind> {
    let b = word.as_bytes();
    let up = |i: usize| b[i].to_ascii_uppercase();
    match b.len() {
        2 => match (up(0), up(1)) {
            (b'O', b'R') => Some(TokenKind::Or),
            (b'I', b'F') => Some(TokenKind::If),
            _ => None,
        },
        3 => match (up(0), up(1), up(2)) {
            (b'A', b'N', b'D') => Some(TokenKind::And),
            (b'X', b'O', b'R') => Some(TokenKind::Xor),
            (b'N', b'O', b'T') => Some(TokenKind::Not),
            _ => None,
        },
        4 => match (up(0), up(1), up(2), up(3)) {
            (b'E', b'L', b'S', b'E') => Some(TokenKind::Else),
            _ => None,
        },
        _ => None,
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None => break,
                Some('-') => tokens.push(self.lex_modifier()?),
                Some(_) => tokens.push(self.lex_word()?),
            }
        }
        Ok(tokens)
    }

    fn lex_word(&mut self) -> Result<Token, LexError> {
        let mut text = String::new();
        let mut quoted = false;

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                break;
            }
            if ch == '"' {
                quoted = true;
                let start = self.pos;
                self.advance();
                loop {
                    match self.peek_char() {
                        None => return Err(LexError::UnterminatedQuote(start)),
                        Some('"') => {
                            self.advance();
                            break;
                        }
                        Some(c) => {
                            text.push(c);
                            self.advance();
                        }
                    }
                }
            } else {
                text.push(ch);
                self.advance();
            }
        }

        if quoted {
            return Ok(Token::new(TokenKind::Pattern, text));
        }
        let kind = match text.as_str() {
            "{" => TokenKind::Bracket,
            "}" => TokenKind::EndBracket,
            word => keyword(word).unwrap_or(TokenKind::Pattern),
        };
        Ok(Token::new(kind, text))
    }

    fn lex_modifier(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || ch == '#' {
                break;
            }
            self.advance();
        }
        let mut token = Token::new(TokenKind::Modifier, &self.input[start..self.pos]);

        if self.peek_char() == Some('#') {
            let payload_start = self.pos;
            self.advance();
            let mut payload = String::new();
            loop {
                match self.peek_char() {
                    None => return Err(LexError::UnterminatedPayload(payload_start)),
                    Some('#') => {
                        self.advance();
                        if self.consume_char('#') {
                            payload.push('#');
                        } else {
                            break;
                        }
                    }
                    Some(c) => {
                        payload.push(c);
                        self.advance();
                    }
                }
            }
            token.payload = Some(payload);
        }
        Ok(token)
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }
}
