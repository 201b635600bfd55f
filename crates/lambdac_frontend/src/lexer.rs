//! Lexer for the surface language (spec §6).
//!
//! The lexer and surface parser are collaborators in spec.md's framing: the
//! compiler core only needs a surface AST to start from. They are still
//! built here end to end so the pipeline can be exercised and tested
//! without an external frontend.

use std::path::{Path as FsPath, PathBuf};

use crate::error::{Error, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Assign,
    SemiColon,
    ParenOpen,
    ParenClose,
    Arrow,
    PathSep,
    MacroMarker,
    Star,
    Ellipsis,
    Pub,
    Impure,
    Mod,
    Use,
    As,
    Extern,
    Crate,
    Super,
    SelfKw,
    String,
    Char,
    Ident,
    End,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

/// Keyword/punctuation patterns tried in order at each position, mirroring
/// the original lexer's ordered pattern table (longest-match keywords are
/// guarded by a trailing non-ident-char lookahead done manually below).
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("pub", TokenKind::Pub),
    ("impure", TokenKind::Impure),
    ("mod", TokenKind::Mod),
    ("use", TokenKind::Use),
    ("as", TokenKind::As),
    ("extern", TokenKind::Extern),
    ("crate", TokenKind::Crate),
    ("super", TokenKind::Super),
    ("self", TokenKind::SelfKw),
];

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    file: Option<PathBuf>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, file: Option<&FsPath>) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            file: file.map(|p| p.to_path_buf()),
        }
    }

    fn span(&self) -> Span {
        match &self.file {
            Some(f) => Span::new(f.clone(), self.line, self.col),
            None => Span::synthetic(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self) -> Result<Token, Error> {
        let span = self.span();
        let start = self.pos;
        self.advance(); // opening quote
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => {
                    self.advance();
                }
                Some(_) => {}
                None => {
                    return Err(Error::TokenizeError {
                        span,
                        message: "unterminated string literal".into(),
                    });
                }
            }
        }
        let text = self.src[start..self.pos].to_string();
        Ok(Token { kind: TokenKind::String, text, span })
    }

    fn lex_char(&mut self) -> Result<Token, Error> {
        let span = self.span();
        let start = self.pos;
        self.advance(); // opening quote
        loop {
            match self.advance() {
                Some('\'') => break,
                Some('\\') => {
                    self.advance();
                }
                Some(_) => {}
                None => {
                    return Err(Error::TokenizeError {
                        span,
                        message: "unterminated char literal".into(),
                    });
                }
            }
        }
        let text = self.src[start..self.pos].to_string();
        Ok(Token { kind: TokenKind::Char, text, span })
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let span = self.span();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        let text = self.src[start..self.pos].to_string();
        for (kw, kind) in KEYWORDS {
            if text == *kw {
                return Token { kind: *kind, text, span };
            }
        }
        Token { kind: TokenKind::Ident, text, span }
    }

    fn lex_one(&mut self) -> Result<Token, Error> {
        self.skip_trivia();
        let span = self.span();
        let Some(c) = self.peek() else {
            return Ok(Token { kind: TokenKind::End, text: String::new(), span });
        };

        if c == '"' {
            return self.lex_string();
        }
        if c == '\'' {
            return self.lex_char();
        }
        if is_ident_char(c) {
            return Ok(self.lex_ident_or_keyword());
        }

        // Longer punctuation must be tried before shorter prefixes of it.
        if self.src[self.pos..].starts_with("...") {
            self.advance();
            self.advance();
            self.advance();
            return Ok(Token { kind: TokenKind::Ellipsis, text: "...".into(), span });
        }
        if self.src[self.pos..].starts_with("->") {
            self.advance();
            self.advance();
            return Ok(Token { kind: TokenKind::Arrow, text: "->".into(), span });
        }
        if self.src[self.pos..].starts_with("::") {
            self.advance();
            self.advance();
            return Ok(Token { kind: TokenKind::PathSep, text: "::".into(), span });
        }

        let (kind, len) = match c {
            '=' => (TokenKind::Assign, 1),
            ';' => (TokenKind::SemiColon, 1),
            '(' => (TokenKind::ParenOpen, 1),
            ')' => (TokenKind::ParenClose, 1),
            '!' => (TokenKind::MacroMarker, 1),
            '*' => (TokenKind::Star, 1),
            _ => {
                return Err(Error::TokenizeError {
                    span,
                    message: format!("unrecognized character '{c}'"),
                });
            }
        };
        let start = self.pos;
        for _ in 0..len {
            self.advance();
        }
        Ok(Token { kind, text: self.src[start..self.pos].to_string(), span })
    }

    /// Tokenize the entire source, including the trailing `End` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.lex_one()?;
            let is_end = tok.kind == TokenKind::End;
            tokens.push(tok);
            if is_end {
                break;
            }
        }
        Ok(tokens)
    }
}

/// Decode a lexed string literal's escapes into raw bytes (spec §4.3's
/// `String(bytes)` macro payload).
pub fn decode_string_literal(text: &str) -> Vec<u8> {
    let inner = &text[1..text.len() - 1];
    decode_escapes(inner)
}

/// Decode a lexed char literal into its single raw byte.
pub fn decode_char_literal(text: &str) -> Option<u8> {
    let inner = &text[1..text.len() - 1];
    let bytes = decode_escapes(inner);
    if bytes.len() == 1 {
        Some(bytes[0])
    } else {
        None
    }
}

fn decode_escapes(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push(b'\n'),
                Some('t') => out.push(b'\t'),
                Some('r') => out.push(b'\r'),
                Some('0') => out.push(0),
                Some('\\') => out.push(b'\\'),
                Some('"') => out.push(b'"'),
                Some('\'') => out.push(b'\''),
                Some(other) => out.extend(other.to_string().as_bytes()),
                None => {}
            }
        } else {
            out.extend(c.to_string().as_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src, None).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_simple_assignment() {
        let ks = kinds("pub ident = a -> a;");
        assert_eq!(
            ks,
            vec![
                TokenKind::Pub,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Ident,
                TokenKind::Arrow,
                TokenKind::Ident,
                TokenKind::SemiColon,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let ks = kinds("# a comment\nident");
        assert_eq!(ks, vec![TokenKind::Ident, TokenKind::End]);
    }

    #[test]
    fn lexes_string_and_char_and_number_macros() {
        let ks = kinds(r#"!"hi" !'x' !3"#);
        assert_eq!(
            ks,
            vec![
                TokenKind::MacroMarker,
                TokenKind::String,
                TokenKind::MacroMarker,
                TokenKind::Char,
                TokenKind::MacroMarker,
                TokenKind::Ident,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn lexes_ellipsis_stub_marker() {
        let ks = kinds("pub f = ...;");
        assert_eq!(
            ks,
            vec![
                TokenKind::Pub,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Ellipsis,
                TokenKind::SemiColon,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn rejects_unrecognized_character() {
        let err = Lexer::new("@", None).tokenize().unwrap_err();
        assert!(matches!(err, Error::TokenizeError { .. }));
    }

    #[test]
    fn decode_string_literal_handles_escapes() {
        let bytes = decode_string_literal(r#""a\nb""#);
        assert_eq!(bytes, b"a\nb");
    }
}
