//! Lexer for the scene language
//!
//! Converts source code into a stream of tokens. Lexing is lenient: characters
//! that cannot start a token are skipped, so `tokenize` never fails.

use crate::token::{lookup_keyword, Span, Token, TokenKind};

/// Convenience wrapper around [`Lexer::tokenize`]
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

/// The lexer state
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer from source code
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire source. The result always ends with an `Eof` token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token() {
            tokens.push(token);
        }

        tokens.push(Token::new(
            TokenKind::Eof,
            Span::new(self.current_pos, self.current_pos, self.line, self.column),
            String::new(),
        ));

        tokens
    }

    /// Get the next token, or `None` at end of input
    fn next_token(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace_and_comments();

            let &(start_pos, ch) = self.chars.peek()?;
            let start_line = self.line;
            let start_column = self.column;

            let kind = match ch {
                '(' => { self.advance(); TokenKind::LeftParen }
                ')' => { self.advance(); TokenKind::RightParen }
                '{' => { self.advance(); TokenKind::LeftBrace }
                '}' => { self.advance(); TokenKind::RightBrace }
                '[' => { self.advance(); TokenKind::LeftBracket }
                ']' => { self.advance(); TokenKind::RightBracket }
                ',' => { self.advance(); TokenKind::Comma }
                ';' => { self.advance(); TokenKind::Semicolon }
                ':' => { self.advance(); TokenKind::Colon }
                '.' => { self.advance(); TokenKind::Dot }
                '+' => { self.advance(); TokenKind::Plus }
                '-' => { self.advance(); TokenKind::Minus }
                '*' => { self.advance(); TokenKind::Star }
                '/' => { self.advance(); TokenKind::Slash }
                '%' => { self.advance(); TokenKind::Percent }

                '=' => self.one_or_two(TokenKind::Equal, TokenKind::EqualEqual),
                '!' => self.one_or_two(TokenKind::Bang, TokenKind::BangEqual),
                '<' => self.one_or_two(TokenKind::Less, TokenKind::LessEqual),
                '>' => self.one_or_two(TokenKind::Greater, TokenKind::GreaterEqual),

                '"' => self.scan_string(),

                c if c.is_ascii_digit() => self.scan_number(),

                c if c.is_ascii_alphabetic() || c == '_' || c == '@' => self.scan_identifier(),

                // Anything else is dropped
                _ => {
                    self.advance();
                    continue;
                }
            };

            let lexeme = self.source[start_pos..self.current_pos].to_string();

            return Some(Token::new(
                kind,
                Span::new(start_pos, self.current_pos, start_line, start_column),
                lexeme,
            ));
        }
    }

    /// Consume one character, then a trailing `=` if present
    fn one_or_two(&mut self, single: TokenKind, with_equal: TokenKind) -> TokenKind {
        self.advance();
        if self.peek_char() == Some('=') {
            self.advance();
            with_equal
        } else {
            single
        }
    }

    /// Advance and return the current character
    fn advance(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.current_pos = pos + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Peek at the next character without advancing
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    /// Skip whitespace, `//` comments and `#` comments
    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek_char() {
            match ch {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.source[self.current_pos..].starts_with("//") => self.skip_line(),
                '#' => self.skip_line(),
                _ => break,
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Scan a string literal. No escape processing; an unterminated string
    /// runs to the end of input.
    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // opening quote

        let mut value = String::new();
        while let Some(c) = self.advance() {
            if c == '"' {
                break;
            }
            value.push(c);
        }

        TokenKind::String(value)
    }

    /// Scan a number literal: a digit run with an optional fractional part
    fn scan_number(&mut self) -> TokenKind {
        let start = self.current_pos;

        self.consume_digits();

        if self.peek_char() == Some('.') {
            let remaining = &self.source[self.current_pos..];
            if remaining.chars().nth(1).map_or(false, |c| c.is_ascii_digit()) {
                self.advance(); // the dot
                self.consume_digits();
            }
        }

        let text = &self.source[start..self.current_pos];
        // A digit run with at most one fraction always parses
        TokenKind::Number(text.parse::<f64>().unwrap_or(0.0))
    }

    fn consume_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.current_pos;
        self.advance(); // leading letter, `_` or `@`

        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.current_pos];

        lookup_keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()))
    }
}
