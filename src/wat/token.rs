//! Token types for the WAT lexer.

use fhex::FromHex;
use serde::Serialize;
use std::fmt;

/// A location in source text.
///
/// Spans track both byte offsets (for slicing) and line/column (for errors).
/// Line and column describe `start`; columns count Unicode characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    /// Byte offset where this span starts.
    pub start: usize,
    /// Byte offset just past the end of this span.
    pub end: usize,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, counting characters not bytes).
    pub column: u32,
}

impl Span {
    /// A zero-length span at the start of source, for errors without position.
    pub const ZERO: Span = Span {
        start: 0,
        end: 0,
        line: 1,
        column: 1,
    };

    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the byte at `offset` lies inside this span.
    ///
    /// Zero-length spans contain nothing.
    #[must_use]
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// The span running from the start of `self` to the end of `other`.
    #[must_use]
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end.max(self.start), self.line, self.column)
    }

    /// A zero-length span where this one starts.
    #[must_use]
    pub fn at_start(self) -> Span {
        Span::new(self.start, self.start, self.line, self.column)
    }

    /// A zero-length span at the end of `source`.
    #[must_use]
    pub fn end_of(source: &str) -> Span {
        let line = source.matches('\n').count() as u32 + 1;
        let last_line = source.rsplit('\n').next().unwrap_or("");
        Span::new(source.len(), source.len(), line, last_line.chars().count() as u32 + 1)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A lexical token with its location in source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Get the original source text for this token.
    ///
    /// ```
    /// use watparse::wat::Lexer;
    ///
    /// let source = "(module)";
    /// let tokens = Lexer::tokenise(source).unwrap();
    /// assert_eq!(tokens[1].text(source), "module");
    /// ```
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// Which comment syntax produced a [`TokenKind::Comment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// `;; ...` or `// ...` to end of line.
    Line,
    /// `(; ... ;)`, possibly nested.
    Block,
}

/// The kind of token, with associated data where relevant.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,

    /// A bare word like `module`, `i32.add`, `offset=8`.
    Keyword(String),

    /// An identifier like `$name`. The stored string excludes the leading `$`.
    Id(String),

    /// A string literal with escape sequences resolved.
    ///
    /// Stored as raw bytes since WAT strings can contain arbitrary bytes.
    String(Vec<u8>),

    /// A decimal integer literal.
    Num(SignedValue<u64>),

    /// A hexadecimal integer literal (`0x` prefix).
    HexNum(SignedValue<u64>),

    /// A floating-point literal, including `inf` and `nan` forms.
    Float(FloatLit),

    /// Comment trivia. Only produced by [`Lexer::with_comments`](super::Lexer::with_comments).
    Comment(CommentKind),
}

impl TokenKind {
    /// The integer value of a `Num` or `HexNum` token.
    #[must_use]
    pub fn as_integer(&self) -> Option<SignedValue<u64>> {
        match self {
            TokenKind::Num(sv) | TokenKind::HexNum(sv) => Some(*sv),
            _ => None,
        }
    }
}

/// A value with an explicit sign.
///
/// This representation preserves the distinction between `-0` and `0`, and
/// allows representing the full u64 range (which i64 cannot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedValue<T> {
    /// The magnitude of the value.
    pub value: T,
    /// Whether a negative sign was present in the source.
    pub negative: bool,
    /// Whether any explicit sign (+ or -) was present in the source.
    pub has_sign: bool,
}

impl<T> SignedValue<T> {
    /// A value with an explicit sign (`+42` or `-42`).
    pub fn signed(value: T, negative: bool) -> Self {
        Self {
            value,
            negative,
            has_sign: true,
        }
    }

    /// A bare literal like `42`.
    pub fn unsigned(value: T) -> Self {
        Self {
            value,
            negative: false,
            has_sign: false,
        }
    }
}

impl SignedValue<u64> {
    /// Convert to i64, returning None if the value overflows. `-0` becomes `0`.
    #[must_use]
    pub fn to_i64(self) -> Option<i64> {
        if self.negative {
            if self.value == 0 {
                Some(0)
            } else if self.value == i64::MAX as u64 + 1 {
                Some(i64::MIN)
            } else if self.value <= i64::MAX as u64 {
                Some(-(self.value as i64))
            } else {
                None
            }
        } else if self.value <= i64::MAX as u64 {
            Some(self.value as i64)
        } else {
            None
        }
    }

    /// Convert to u64, returning None if negative (except `-0`).
    #[must_use]
    pub fn to_u64(self) -> Option<u64> {
        if self.negative && self.value != 0 {
            None
        } else {
            Some(self.value)
        }
    }
}

/// A floating-point literal.
///
/// Keeps the source digits for decimal and hex floats so that f32 and f64
/// conversions each round once, directly from the text.
#[derive(Debug, Clone, PartialEq)]
pub enum FloatLit {
    Decimal { negative: bool, decimal_str: String },
    Hex { negative: bool, hex_str: String },
    Inf { negative: bool },
    /// NaN with an optional significand payload (`nan:0x...`).
    Nan { negative: bool, payload: Option<u64> },
}

impl FloatLit {
    /// Convert to f64. NaN payloads are not preserved.
    ///
    /// Returns `None` if the stored digits do not form a number.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        let v: f64 = match self {
            FloatLit::Decimal { decimal_str, .. } => decimal_str.parse().ok()?,
            FloatLit::Hex { hex_str, .. } => from_hex(hex_str)?,
            FloatLit::Inf { .. } => f64::INFINITY,
            FloatLit::Nan { .. } => return Some(f64::NAN),
        };
        Some(if self.is_negative() { -v } else { v })
    }

    /// Convert to f32, rounding directly from the source digits.
    #[must_use]
    pub fn to_f32(&self) -> Option<f32> {
        let v: f32 = match self {
            FloatLit::Decimal { decimal_str, .. } => decimal_str.parse().ok()?,
            FloatLit::Hex { hex_str, .. } => from_hex(hex_str)?,
            FloatLit::Inf { .. } => f32::INFINITY,
            FloatLit::Nan { .. } => return Some(f32::NAN),
        };
        Some(if self.is_negative() { -v } else { v })
    }

    pub fn is_negative(&self) -> bool {
        match self {
            FloatLit::Decimal { negative, .. }
            | FloatLit::Hex { negative, .. }
            | FloatLit::Inf { negative }
            | FloatLit::Nan { negative, .. } => *negative,
        }
    }
}

/// Hex integers too wide for `u64` are kept as floats without an exponent.
fn from_hex<T: FromHex>(hex_str: &str) -> Option<T> {
    if hex_str.contains(|c| c == 'p' || c == 'P') {
        T::from_hex(hex_str)
    } else {
        T::from_hex(&format!("{}p0", hex_str))
    }
}

impl fmt::Display for FloatLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = |negative: bool| if negative { "-" } else { "" };
        match self {
            FloatLit::Decimal { negative, decimal_str } => write!(f, "{}{}", sign(*negative), decimal_str),
            FloatLit::Hex { negative, hex_str } => write!(f, "{}{}", sign(*negative), hex_str),
            FloatLit::Inf { negative } => write!(f, "{}inf", sign(*negative)),
            FloatLit::Nan { negative, payload: None } => write!(f, "{}nan", sign(*negative)),
            FloatLit::Nan {
                negative,
                payload: Some(p),
            } => write!(f, "{}nan:0x{:x}", sign(*negative), p),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Keyword(s) => write!(f, "{}", s),
            TokenKind::Id(s) => write!(f, "${}", s),
            TokenKind::String(bytes) => {
                write!(f, "\"")?;
                for &b in bytes {
                    if b.is_ascii_graphic() || b == b' ' {
                        write!(f, "{}", b as char)?;
                    } else {
                        write!(f, "\\{:02x}", b)?;
                    }
                }
                write!(f, "\"")
            }
            TokenKind::Num(sv) => {
                if sv.negative {
                    write!(f, "-{}", sv.value)
                } else {
                    write!(f, "{}", sv.value)
                }
            }
            TokenKind::HexNum(sv) => {
                if sv.negative {
                    write!(f, "-0x{:x}", sv.value)
                } else {
                    write!(f, "0x{:x}", sv.value)
                }
            }
            TokenKind::Float(fl) => write!(f, "{}", fl),
            TokenKind::Comment(CommentKind::Line) => write!(f, "line comment"),
            TokenKind::Comment(CommentKind::Block) => write!(f, "block comment"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}
