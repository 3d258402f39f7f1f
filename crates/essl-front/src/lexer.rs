//! Tokenizer for the GLSL-ES subset.
//!
//! Produces a bounded token stream plus any `#version` / `#extension`
//! directives. Malformed input yields `LexError` diagnostics; the lexer
//! never panics on arbitrary bytes.

use essl_ast::{
    Diagnostic, DiagnosticKind, ExtensionBehavior, ExtensionDirective,
};

/// Structural keywords.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kw {
    Attribute,
    Const,
    Uniform,
    Varying,
    Invariant,
    Precision,
    Highp,
    Mediump,
    Lowp,
    Break,
    Continue,
    Do,
    For,
    While,
    If,
    Else,
    Return,
    Discard,
    In,
    Out,
    InOut,
    Struct,
    True,
    False,
}

/// A single token.
#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    /// Identifier or type name; the parser resolves type keywords.
    Ident(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Kw(Kw),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Semicolon,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    Inc,
    Dec,
    Assign,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Bang,
    AndAnd,
    OrOr,
    XorXor,
}

/// A token with its source line.
#[derive(Clone, Debug)]
pub struct SpannedTok {
    pub tok: Tok,
    pub line: u32,
}

/// Result of tokenizing one source string.
#[derive(Debug, Default)]
pub struct LexOutput {
    pub tokens: Vec<SpannedTok>,
    pub extensions: Vec<ExtensionDirective>,
    pub version: Option<u32>,
    pub diagnostics: Vec<Diagnostic>,
}

fn keyword(text: &str) -> Option<Kw> {
    Some(match text {
        "attribute" => Kw::Attribute,
        "const" => Kw::Const,
        "uniform" => Kw::Uniform,
        "varying" => Kw::Varying,
        "invariant" => Kw::Invariant,
        "precision" => Kw::Precision,
        "highp" => Kw::Highp,
        "mediump" => Kw::Mediump,
        "lowp" => Kw::Lowp,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "do" => Kw::Do,
        "for" => Kw::For,
        "while" => Kw::While,
        "if" => Kw::If,
        "else" => Kw::Else,
        "return" => Kw::Return,
        "discard" => Kw::Discard,
        "in" => Kw::In,
        "out" => Kw::Out,
        "inout" => Kw::InOut,
        "struct" => Kw::Struct,
        "true" => Kw::True,
        "false" => Kw::False,
        _ => return None,
    })
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    out: LexOutput,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn push(&mut self, tok: Tok) {
        let line = self.line;
        self.out.tokens.push(SpannedTok { tok, line });
    }

    fn error(&mut self, message: impl Into<String>) {
        let line = self.line;
        self.out
            .diagnostics
            .push(Diagnostic::error(DiagnosticKind::LexError, line, message));
    }

    fn skip_block_comment(&mut self) {
        // Already past "/*".
        loop {
            match self.bump() {
                Some(b'*') if self.peek() == Some(b'/') => {
                    self.bump();
                    return;
                }
                Some(_) => {}
                None => {
                    self.error("unterminated block comment");
                    return;
                }
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn read_line(&mut self) -> String {
        let start = self.pos;
        self.skip_line();
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn directive(&mut self) {
        // Already past '#'.
        let line = self.line;
        let raw = self.read_line();
        let text = raw.trim_start().to_owned();
        let mut words = text.split_whitespace();
        match words.next() {
            None => {} // bare '#' line is allowed
            Some("version") => match words.next().and_then(|w| w.parse::<u32>().ok()) {
                Some(v) => self.out.version = Some(v),
                None => self.error("malformed #version directive"),
            },
            Some("extension") => {
                // "#extension <name> : <behavior>"
                let rest: String = text["extension".len()..].replace(':', " : ");
                let mut parts = rest.split_whitespace();
                let name = parts.next().map(str::to_owned);
                let colon = parts.next();
                let behavior = parts.next().and_then(|b| match b {
                    "enable" => Some(ExtensionBehavior::Enable),
                    "require" => Some(ExtensionBehavior::Require),
                    "warn" => Some(ExtensionBehavior::Warn),
                    "disable" => Some(ExtensionBehavior::Disable),
                    _ => None,
                });
                match (name, colon, behavior) {
                    (Some(name), Some(":"), Some(behavior)) => {
                        self.out.extensions.push(ExtensionDirective {
                            name,
                            behavior,
                            line,
                        });
                    }
                    _ => self.error("malformed #extension directive"),
                }
            }
            Some("pragma") => {} // ignored
            Some(other) => {
                self.error(format!("unsupported preprocessor directive '#{other}'"));
            }
        }
    }

    fn ident(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .unwrap_or_default()
            .to_owned();
        match keyword(&text) {
            Some(kw) => self.push(Tok::Kw(kw)),
            None => self.push(Tok::Ident(text)),
        }
    }

    fn number(&mut self) {
        let start = self.pos;
        let mut is_float = false;

        // Hex and octal integers have no fractional forms.
        if self.peek() == Some(b'0') && matches!(self.peek2(), Some(b'x') | Some(b'X')) {
            self.pos += 2;
            let digits = self.take_while(|c| c.is_ascii_hexdigit());
            match i64::from_str_radix(&digits, 16) {
                Ok(v) => self.int_token(v),
                Err(_) => self.error("malformed hexadecimal literal"),
            }
            return;
        }

        self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.take_while(|c| c.is_ascii_digit()).is_empty() {
                self.pos = mark;
            } else {
                is_float = true;
            }
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        if is_float {
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => self.push(Tok::Float(v)),
                _ => self.error(format!("malformed float literal '{text}'")),
            }
        } else {
            // Leading 0 means octal in GLSL.
            let parsed = if text.len() > 1 && text.starts_with('0') {
                i64::from_str_radix(&text[1..], 8)
            } else {
                text.parse::<i64>()
            };
            match parsed {
                Ok(v) => self.int_token(v),
                Err(_) => self.error(format!("malformed integer literal '{text}'")),
            }
        }
    }

    fn int_token(&mut self, value: i64) {
        if matches!(self.peek(), Some(b'u') | Some(b'U')) {
            self.pos += 1;
            self.push(Tok::UInt(value as u64));
        } else {
            self.push(Tok::Int(value));
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if pred(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn run(mut self) -> LexOutput {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                }
                b'/' if self.peek2() == Some(b'/') => self.skip_line(),
                b'/' if self.peek2() == Some(b'*') => {
                    self.pos += 2;
                    self.skip_block_comment();
                }
                b'#' => {
                    self.pos += 1;
                    self.directive();
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.ident(),
                b'0'..=b'9' => self.number(),
                b'.' if self.peek2().is_some_and(|c| c.is_ascii_digit()) => self.number(),
                _ => {
                    self.pos += 1;
                    let tok = match c {
                        b'(' => Some(Tok::LParen),
                        b')' => Some(Tok::RParen),
                        b'[' => Some(Tok::LBracket),
                        b']' => Some(Tok::RBracket),
                        b'{' => Some(Tok::LBrace),
                        b'}' => Some(Tok::RBrace),
                        b'.' => Some(Tok::Dot),
                        b',' => Some(Tok::Comma),
                        b';' => Some(Tok::Semicolon),
                        b'?' => Some(Tok::Question),
                        b':' => Some(Tok::Colon),
                        b'+' => Some(self.two(b'+', Tok::Inc, b'=', Tok::PlusEq, Tok::Plus)),
                        b'-' => Some(self.two(b'-', Tok::Dec, b'=', Tok::MinusEq, Tok::Minus)),
                        b'*' => Some(self.one(b'=', Tok::StarEq, Tok::Star)),
                        b'/' => Some(self.one(b'=', Tok::SlashEq, Tok::Slash)),
                        b'=' => Some(self.one(b'=', Tok::Eq, Tok::Assign)),
                        b'!' => Some(self.one(b'=', Tok::NotEq, Tok::Bang)),
                        b'<' => Some(self.one(b'=', Tok::Le, Tok::Lt)),
                        b'>' => Some(self.one(b'=', Tok::Ge, Tok::Gt)),
                        b'&' => self.pair(b'&', Tok::AndAnd, "&"),
                        b'|' => self.pair(b'|', Tok::OrOr, "|"),
                        b'^' => self.pair(b'^', Tok::XorXor, "^"),
                        _ => {
                            self.error(format!("unexpected character '{}'", c as char));
                            None
                        }
                    };
                    if let Some(tok) = tok {
                        self.push(tok);
                    }
                }
            }
        }
        self.out
    }

    /// `c` followed by `a` → `ta`; by `b` → `tb`; else `otherwise`.
    fn two(&mut self, a: u8, ta: Tok, b: u8, tb: Tok, otherwise: Tok) -> Tok {
        if self.peek() == Some(a) {
            self.pos += 1;
            ta
        } else if self.peek() == Some(b) {
            self.pos += 1;
            tb
        } else {
            otherwise
        }
    }

    fn one(&mut self, a: u8, ta: Tok, otherwise: Tok) -> Tok {
        if self.peek() == Some(a) {
            self.pos += 1;
            ta
        } else {
            otherwise
        }
    }

    /// Doubled operator (`&&`, `||`, `^^`); the single form is not in the
    /// language.
    fn pair(&mut self, c: u8, tok: Tok, text: &str) -> Option<Tok> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Some(tok)
        } else {
            self.error(format!("unexpected character '{text}'"));
            None
        }
    }
}

/// Tokenizes `source`.
pub fn tokenize(source: &str) -> LexOutput {
    Lexer {
        src: source.as_bytes(),
        pos: 0,
        line: 1,
        out: LexOutput::default(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(source: &str) -> Vec<Tok> {
        tokenize(source).tokens.into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn punctuation_and_idents() {
        assert_eq!(
            toks("a += b;"),
            vec![
                Tok::Ident("a".into()),
                Tok::PlusEq,
                Tok::Ident("b".into()),
                Tok::Semicolon
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(toks("1 2.5 .5 1e3 0x1f 017 3u"), vec![
            Tok::Int(1),
            Tok::Float(2.5),
            Tok::Float(0.5),
            Tok::Float(1000.0),
            Tok::Int(31),
            Tok::Int(15),
            Tok::UInt(3),
        ]);
    }

    #[test]
    fn comments_do_not_produce_tokens() {
        assert_eq!(toks("a // b\n/* c\nd */ e"), vec![
            Tok::Ident("a".into()),
            Tok::Ident("e".into()),
        ]);
    }

    #[test]
    fn line_tracking() {
        let out = tokenize("a\nb\n\nc");
        let lines: Vec<u32> = out.tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn extension_directive() {
        let out = tokenize("#extension GL_OES_standard_derivatives : enable\nvoid");
        assert_eq!(out.extensions.len(), 1);
        assert_eq!(out.extensions[0].name, "GL_OES_standard_derivatives");
        assert_eq!(out.extensions[0].behavior, ExtensionBehavior::Enable);
    }

    #[test]
    fn version_directive() {
        let out = tokenize("#version 100\n");
        assert_eq!(out.version, Some(100));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn bad_character_is_a_diagnostic_not_a_panic() {
        let out = tokenize("float a = 1.0; @");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::LexError);
    }

    #[test]
    fn single_ampersand_rejected() {
        let out = tokenize("a & b");
        assert_eq!(out.diagnostics.len(), 1);
    }
}
