//! Lexer for WebAssembly Text Format.
//!
//! Tokenises WAT source into a stream of tokens. The lexer is implemented as
//! an iterator, producing tokens lazily on demand.
//!
//! # Example
//!
//! ```
//! use watparse::wat::Lexer;
//!
//! let source = "(module (func $add (param i32 i32) (result i32)))";
//! for result in Lexer::new(source) {
//!     let token = result.expect("valid token");
//!     println!("{:?}", token);
//! }
//! ```

use super::cursor::{Cursor, Position};
use super::error::LexError;
use super::token::{CommentKind, FloatLit, SignedValue, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// Numeric patterns
// ============================================================================

// Bodies of numeric literals, after any sign and after the `0x` prefix for
// the hex forms. An underscore may only sit between two digits, except that
// one may follow the `0x` prefix directly.
static DEC_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9](?:_?[0-9])*$").expect("valid pattern"));
static HEX_INT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^_?[0-9A-Fa-f](?:_?[0-9A-Fa-f])*$").expect("valid pattern"));
static DEC_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9](?:_?[0-9])*(?:\.(?:[0-9](?:_?[0-9])*)?)?(?:[eE][+-]?[0-9](?:_?[0-9])*)?$")
        .expect("valid pattern")
});
static HEX_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f](?:_?[0-9A-Fa-f])*(?:\.(?:[0-9A-Fa-f](?:_?[0-9A-Fa-f])*)?)?(?:[pP][+-]?[0-9](?:_?[0-9])*)?$")
        .expect("valid pattern")
});

/// Parse an unsigned decimal or `0x` hex literal, as used in `offset=N`.
pub(crate) fn parse_u64(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x") {
        if !HEX_INT.is_match(hex) {
            return None;
        }
        u64::from_str_radix(&strip_underscores(hex), 16).ok()
    } else if DEC_INT.is_match(text) {
        strip_underscores(text).parse().ok()
    } else {
        None
    }
}

fn strip_underscores(s: &str) -> String {
    s.chars().filter(|&c| c != '_').collect()
}

// ============================================================================
// Lexer
// ============================================================================

/// Lexer for WebAssembly Text Format.
///
/// Produces tokens via the `Iterator` trait. After an error the lexer skips
/// to the next token boundary, so iteration can continue past bad input.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    keep_comments: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            keep_comments: false,
        }
    }

    /// Emit comments as [`TokenKind::Comment`] tokens instead of skipping them.
    #[must_use]
    pub fn with_comments(mut self) -> Self {
        self.keep_comments = true;
        self
    }

    /// Tokenise the entire source, returning all tokens or the first error.
    pub fn tokenise(source: &str) -> Result<Vec<Token>, LexError> {
        Lexer::new(source).collect()
    }

    fn error(&self, message: impl Into<String>, pos: Position) -> LexError {
        LexError::new(message, pos.span_here())
    }

    fn error_span(&self, message: impl Into<String>, start: Position) -> LexError {
        LexError::new(message, start.span_to(&self.cursor.position()))
    }

    /// Skip the rest of a malformed token.
    fn recover(&mut self) {
        self.cursor.skip_while(|c| !is_boundary(c));
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.cursor.skip_while(|c| c.is_ascii_whitespace());
            if self.cursor.is_eof() {
                return None;
            }

            let start = self.cursor.position();
            let comment = match (self.cursor.peek(), self.cursor.peek_second()) {
                (Some(';'), Some(';')) | (Some('/'), Some('/')) => {
                    self.cursor.skip_while(|c| c != '\n' && c != '\r');
                    Some(CommentKind::Line)
                }
                (Some('('), Some(';')) => {
                    if let Err(e) = self.skip_block_comment() {
                        return Some(Err(e));
                    }
                    Some(CommentKind::Block)
                }
                _ => None,
            };

            match comment {
                Some(kind) if self.keep_comments => {
                    let span = start.span_to(&self.cursor.position());
                    return Some(Ok(Token::new(TokenKind::Comment(kind), span)));
                }
                Some(_) => continue,
                None => {}
            }

            return match self.lex_token() {
                Ok(kind) => Some(Ok(Token::new(kind, start.span_to(&self.cursor.position())))),
                Err(e) => {
                    self.recover();
                    Some(Err(e))
                }
            };
        }
    }
}

// ============================================================================
// Top-level token dispatch
// ============================================================================

impl<'a> Lexer<'a> {
    /// Lex a single token (after whitespace/comments have been skipped).
    fn lex_token(&mut self) -> Result<TokenKind, LexError> {
        let start = self.cursor.position();

        let Some(c) = self.cursor.peek() else {
            return Err(self.error("unexpected end of input", start));
        };
        let kind = match c {
            '(' => {
                self.cursor.advance();
                return Ok(TokenKind::LeftParen);
            }
            ')' => {
                self.cursor.advance();
                return Ok(TokenKind::RightParen);
            }
            '"' => TokenKind::String(self.lex_string()?),
            '$' => self.lex_id()?,
            c if is_idchar(c) => {
                let word = self.cursor.take_while(is_idchar);
                classify_word(word).map_err(|message| self.error_span(message, start))?
            }
            c => {
                self.cursor.advance();
                return Err(self.error(format!("unexpected character: {:?}", c), start));
            }
        };

        self.check_token_boundary(start)?;
        Ok(kind)
    }

    /// Verify the next character is a valid token boundary. WAT requires
    /// whitespace or parentheses between all non-paren tokens, so `1x`,
    /// `$l"a"` and `"a""b"` are all malformed.
    fn check_token_boundary(&self, start: Position) -> Result<(), LexError> {
        match self.cursor.peek() {
            None => Ok(()),
            Some(c) if is_boundary(c) => Ok(()),
            Some(_) => Err(self.error("unknown operator", start)),
        }
    }
}

// ============================================================================
// Comments
// ============================================================================

impl<'a> Lexer<'a> {
    /// Skip a block comment, handling nesting.
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.cursor.position();

        // "(;"
        self.cursor.advance();
        self.cursor.advance();

        let mut depth = 1;

        while depth > 0 {
            match (self.cursor.peek(), self.cursor.peek_second()) {
                (None, _) => {
                    return Err(self.error_span("unterminated block comment", start));
                }
                (Some('('), Some(';')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth += 1;
                }
                (Some(';'), Some(')')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth -= 1;
                }
                _ => {
                    self.cursor.advance();
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Identifiers
// ============================================================================

impl<'a> Lexer<'a> {
    /// Lex an identifier: `$` followed by idchars, or `$` followed by a
    /// non-empty quoted name.
    fn lex_id(&mut self) -> Result<TokenKind, LexError> {
        let start = self.cursor.position();

        // '$'
        self.cursor.advance();

        if self.cursor.peek() == Some('"') {
            let bytes = self.lex_string()?;
            if bytes.is_empty() {
                return Err(self.error_span("empty identifier", start));
            }
            return String::from_utf8(bytes)
                .map(TokenKind::Id)
                .map_err(|_| self.error_span("malformed UTF-8 encoding in identifier", start));
        }

        let name = self.cursor.take_while(is_idchar);
        if name.is_empty() {
            return Err(self.error_span("expected identifier after '$'", start));
        }

        Ok(TokenKind::Id(name.to_string()))
    }
}

// ============================================================================
// String literals
// ============================================================================

impl<'a> Lexer<'a> {
    /// Lex a string literal, returning its decoded bytes.
    ///
    /// A malformed escape does not stop the scan: the rest of the literal is
    /// consumed so that lexing resumes after the closing quote.
    fn lex_string(&mut self) -> Result<Vec<u8>, LexError> {
        let start = self.cursor.position();

        // Opening quote
        self.cursor.advance();

        let mut bytes = Vec::new();
        let mut first_error = None;

        loop {
            match self.cursor.peek() {
                None => {
                    return Err(self.error_span("unterminated string literal", start));
                }
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some('\\') => {
                    self.cursor.advance();
                    if let Err(e) = self.lex_escape(&mut bytes) {
                        first_error.get_or_insert(e);
                    }
                }
                Some(c) => {
                    self.cursor.advance();
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(bytes),
        }
    }

    /// Lex an escape sequence (after the backslash), appending to `bytes`.
    fn lex_escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), LexError> {
        let pos = self.cursor.position();
        let c = self
            .cursor
            .advance()
            .ok_or_else(|| self.error("unterminated escape sequence", pos))?;

        match c {
            't' => bytes.push(0x09),
            'n' => bytes.push(0x0A),
            'r' => bytes.push(0x0D),
            '"' => bytes.push(0x22),
            '\'' => bytes.push(0x27),
            '\\' => bytes.push(0x5C),
            'x' => {
                let high = self.hex_digit()?;
                let low = self.hex_digit()?;
                bytes.push((high << 4) | low);
            }
            'u' => self.lex_unicode_escape(bytes)?,
            c if c.is_ascii_hexdigit() => {
                let high = c.to_digit(16).unwrap_or(0) as u8;
                let low = self.hex_digit()?;
                bytes.push((high << 4) | low);
            }
            _ => return Err(self.error(format!("invalid escape sequence: \\{}", c), pos)),
        }

        Ok(())
    }

    /// Consume one hex digit. The closing quote is left in place on failure.
    fn hex_digit(&mut self) -> Result<u8, LexError> {
        let pos = self.cursor.position();
        match self.cursor.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                self.cursor.advance();
                Ok(c.to_digit(16).unwrap_or(0) as u8)
            }
            Some(c) => Err(self.error(format!("invalid hex digit: {:?}", c), pos)),
            None => Err(self.error("unterminated hex escape", pos)),
        }
    }

    /// Lex `\u{H+}` or `\uHHHH`, appending the UTF-8 encoding.
    fn lex_unicode_escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), LexError> {
        let digits_start = self.cursor.position();

        let code_point = if self.cursor.peek() == Some('{') {
            self.cursor.advance();
            let digits = self.cursor.take_while(|c| c.is_ascii_hexdigit() || c == '_');
            if digits.is_empty() || !HEX_INT.is_match(digits) || digits.starts_with('_') {
                return Err(self.error("malformed unicode escape", digits_start));
            }
            let close_pos = self.cursor.position();
            if self.cursor.peek() != Some('}') {
                return Err(self.error("expected '}' in unicode escape", close_pos));
            }
            self.cursor.advance();
            u32::from_str_radix(&strip_underscores(digits), 16)
                .map_err(|_| self.error("unicode escape value too large", digits_start))?
        } else {
            let mut value = 0u32;
            for _ in 0..4 {
                value = (value << 4) | u32::from(self.hex_digit()?);
            }
            value
        };

        let c = char::from_u32(code_point)
            .ok_or_else(|| self.error(format!("invalid unicode code point: U+{:X}", code_point), digits_start))?;

        let mut buf = [0u8; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());

        Ok(())
    }
}

// ============================================================================
// Words: keywords and numbers
// ============================================================================

/// Classify a maximal run of idchars as a number or a keyword.
///
/// Anything that starts with a digit (after an optional sign) must be a
/// well-formed number; `inf`, `nan` and `nan:0x...` are floats; everything
/// else is a keyword.
fn classify_word(word: &str) -> Result<TokenKind, String> {
    let (negative, has_sign, body) = match word.as_bytes().first() {
        Some(b'-') => (true, true, &word[1..]),
        Some(b'+') => (false, true, &word[1..]),
        _ => (false, false, word),
    };

    if let Some(float) = parse_special_float(body, negative) {
        return Ok(TokenKind::Float(float));
    }

    if !body.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(TokenKind::Keyword(word.to_string()));
    }

    let sv = |value| {
        if has_sign {
            SignedValue::signed(value, negative)
        } else {
            SignedValue::unsigned(value)
        }
    };

    if let Some(hex) = body.strip_prefix("0x") {
        if hex.is_empty() || hex == "_" {
            return Err("expected hex digits after '0x'".to_string());
        }
        if HEX_INT.is_match(hex) {
            let digits = strip_underscores(hex);
            return Ok(match u64::from_str_radix(&digits, 16) {
                Ok(value) => TokenKind::HexNum(sv(value)),
                // Too wide for any integer type; only meaningful as a float.
                Err(_) => TokenKind::Float(FloatLit::Hex {
                    negative,
                    hex_str: format!("0x{}", digits),
                }),
            });
        }
        if HEX_FLOAT.is_match(hex) {
            return Ok(TokenKind::Float(FloatLit::Hex {
                negative,
                hex_str: format!("0x{}", strip_underscores(hex)),
            }));
        }
        if hex.starts_with('.') {
            return Err("invalid hex float".to_string());
        }
        return Err(format!("malformed number: {}", word));
    }

    if DEC_INT.is_match(body) {
        let digits = strip_underscores(body);
        return Ok(match digits.parse::<u64>() {
            Ok(value) => TokenKind::Num(sv(value)),
            Err(_) => TokenKind::Float(FloatLit::Decimal {
                negative,
                decimal_str: digits,
            }),
        });
    }

    if DEC_FLOAT.is_match(body) {
        return Ok(TokenKind::Float(FloatLit::Decimal {
            negative,
            decimal_str: strip_underscores(body),
        }));
    }

    Err(format!("malformed number: {}", word))
}

/// Parse special float keywords: inf, nan, nan:0x...
fn parse_special_float(text: &str, negative: bool) -> Option<FloatLit> {
    if text == "inf" {
        Some(FloatLit::Inf { negative })
    } else if text == "nan" {
        Some(FloatLit::Nan {
            negative,
            payload: None,
        })
    } else if let Some(payload_hex) = text.strip_prefix("nan:0x") {
        if payload_hex.starts_with('_') || !HEX_INT.is_match(payload_hex) {
            return None;
        }
        let payload = u64::from_str_radix(&strip_underscores(payload_hex), 16).ok()?;
        Some(FloatLit::Nan {
            negative,
            payload: Some(payload),
        })
    } else {
        None
    }
}

/// Characters that may follow a token.
fn is_boundary(c: char) -> bool {
    c.is_ascii_whitespace() || matches!(c, '(' | ')' | ';')
}

/// Check if a character is valid in a WAT identifier or keyword.
///
/// idchar is ASCII letters and digits plus ``!#$%&'*+-./:<=>?@\^_`|~``.
/// See: <https://webassembly.github.io/spec/core/text/values.html#text-id>
fn is_idchar(c: char) -> bool {
    matches!(
        c,
        '0'..='9'
            | 'a'..='z'
            | 'A'..='Z'
            | '!'
            | '#'
            | '$'
            | '%'
            | '&'
            | '\''
            | '*'
            | '+'
            | '-'
            | '.'
            | '/'
            | ':'
            | '<'
            | '='
            | '>'
            | '?'
            | '@'
            | '\\'
            | '^'
            | '_'
            | '`'
            | '|'
            | '~'
    )
}

// ============================================================================
// Tests
// ============================================================================


// ============================================================================
// Property-based tests
// ============================================================================
