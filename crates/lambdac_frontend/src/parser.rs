//! Recursive-descent parser for the surface language (spec §6).

use std::path::Path as FsPath;

use crate::ast::{Expr, Macro, PathSegment, RelativePath, SourceFile, Statement};
use crate::error::{Error, Span};
use crate::lexer::{decode_char_literal, decode_string_literal, Lexer, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_source(src: &str, file: Option<&FsPath>) -> Result<SourceFile, Error> {
        let tokens = Lexer::new(src, file).tokenize()?;
        let mut parser = Parser::new(tokens);
        parser.parse_program()
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn cur_span(&self) -> Span {
        self.cur().span.clone()
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn drop(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: TokenKind) -> Result<Token, Error> {
        if self.cur().kind != kind {
            return Err(self.err(&format!("expected {kind:?}")));
        }
        let tok = self.cur().clone();
        self.drop();
        Ok(tok)
    }

    fn err(&self, message: &str) -> Error {
        Error::ParseError {
            span: self.cur_span(),
            message: format!("{message}, found {:?} '{}'", self.cur().kind, self.cur().text),
        }
    }

    fn parse_program(&mut self) -> Result<SourceFile, Error> {
        let mut statements = Vec::new();
        while !self.at(TokenKind::End) {
            statements.push(self.parse_statement()?);
        }
        Ok(SourceFile { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, Error> {
        if self.at(TokenKind::Extern) {
            return self.parse_extern();
        }

        let mut is_public = false;
        if self.at(TokenKind::Pub) {
            self.drop();
            is_public = true;
        }

        if self.at(TokenKind::Use) {
            self.parse_import(is_public)
        } else if self.at(TokenKind::Mod) {
            self.parse_mod(is_public)
        } else {
            self.parse_assignment(is_public)
        }
    }

    fn parse_extern(&mut self) -> Result<Statement, Error> {
        let span = self.cur_span();
        self.eat(TokenKind::Extern)?;
        if self.at(TokenKind::Crate) {
            self.drop();
            let name = self.eat(TokenKind::Ident)?.text;
            self.eat(TokenKind::SemiColon)?;
            Ok(Statement::ExternCrate { name, span })
        } else if self.at(TokenKind::Impure) {
            self.drop();
            let name = self.eat(TokenKind::Ident)?.text;
            self.eat(TokenKind::SemiColon)?;
            Ok(Statement::Extern { name, span })
        } else {
            Err(self.err("expected 'crate' or 'impure' after 'extern'"))
        }
    }

    fn parse_mod(&mut self, is_public: bool) -> Result<Statement, Error> {
        let span = self.cur_span();
        self.eat(TokenKind::Mod)?;
        let name = self.eat(TokenKind::Ident)?.text;
        self.eat(TokenKind::SemiColon)?;
        Ok(Statement::Mod { name, is_public, span })
    }

    fn parse_import(&mut self, is_public: bool) -> Result<Statement, Error> {
        let span = self.cur_span();
        self.eat(TokenKind::Use)?;
        let (path, is_wildcard) = self.parse_relative_path_maybe_wildcard()?;

        if is_wildcard {
            self.eat(TokenKind::SemiColon)?;
            return Ok(Statement::Import { path, name: None, is_wildcard: true, is_public, span });
        }

        let name = if self.at(TokenKind::As) {
            self.drop();
            Some(self.eat(TokenKind::Ident)?.text)
        } else {
            match path.segments.last() {
                Some(PathSegment::Name(n)) => Some(n.clone()),
                _ => return Err(self.err("import path must end in a name")),
            }
        };

        self.eat(TokenKind::SemiColon)?;
        Ok(Statement::Import { path, name, is_wildcard: false, is_public, span })
    }

    fn parse_assignment(&mut self, is_public: bool) -> Result<Statement, Error> {
        let span = self.cur_span();
        let mut is_impure = false;
        if self.at(TokenKind::Impure) {
            self.drop();
            is_impure = true;
        }

        let name = self.eat(TokenKind::Ident)?.text;
        self.eat(TokenKind::Assign)?;
        let value = self.parse_chain()?;
        self.eat(TokenKind::SemiColon)?;

        Ok(Statement::Assignment { name, value, is_public, is_impure, span })
    }

    /// Parses a relative path, with an optional leading identifier already
    /// consumed (used when the first `Ident` token was consumed generically
    /// while disambiguating expression forms).
    fn parse_relative_path(&mut self, first: Option<(String, Span)>) -> Result<RelativePath, Error> {
        let (mut segments, span) = match first {
            Some((name, span)) => (vec![PathSegment::Name(name)], span),
            None => {
                let span = self.cur_span();
                let seg = if self.at(TokenKind::Crate) {
                    self.drop();
                    PathSegment::Crate
                } else if self.at(TokenKind::SelfKw) {
                    self.drop();
                    PathSegment::SelfMod
                } else if self.at(TokenKind::Super) {
                    self.drop();
                    PathSegment::Super
                } else {
                    let name = self.eat(TokenKind::Ident)?.text;
                    PathSegment::Name(name)
                };
                (vec![seg], span)
            }
        };

        while self.at(TokenKind::PathSep) {
            self.drop();
            if self.at(TokenKind::Super) {
                self.drop();
                segments.push(PathSegment::Super);
            } else {
                let name = self.eat(TokenKind::Ident)?.text;
                segments.push(PathSegment::Name(name));
            }
        }

        Ok(RelativePath { segments, span })
    }

    /// Like [`Self::parse_relative_path`] but accepts a trailing `::*`
    /// wildcard, returning whether it was present.
    fn parse_relative_path_maybe_wildcard(&mut self) -> Result<(RelativePath, bool), Error> {
        let span = self.cur_span();
        let seg = if self.at(TokenKind::Crate) {
            self.drop();
            PathSegment::Crate
        } else if self.at(TokenKind::SelfKw) {
            self.drop();
            PathSegment::SelfMod
        } else if self.at(TokenKind::Super) {
            self.drop();
            PathSegment::Super
        } else {
            let name = self.eat(TokenKind::Ident)?.text;
            PathSegment::Name(name)
        };
        let mut segments = vec![seg];
        let mut is_wildcard = false;

        while self.at(TokenKind::PathSep) {
            self.drop();
            if self.at(TokenKind::Super) {
                self.drop();
                segments.push(PathSegment::Super);
            } else if self.at(TokenKind::Star) {
                self.drop();
                is_wildcard = true;
                break;
            } else {
                let name = self.eat(TokenKind::Ident)?.text;
                segments.push(PathSegment::Name(name));
            }
        }

        Ok((RelativePath { segments, span }, is_wildcard))
    }

    fn parse_paren(&mut self) -> Result<Expr, Error> {
        let inner = self.parse_chain()?;
        self.eat(TokenKind::ParenClose)?;
        Ok(Expr::Paren(Box::new(inner)))
    }

    fn parse_macro(&mut self) -> Result<Expr, Error> {
        let span = self.cur_span();
        self.eat(TokenKind::MacroMarker)?;
        if self.at(TokenKind::String) {
            let tok = self.eat(TokenKind::String)?;
            let bytes = decode_string_literal(&tok.text);
            Ok(Expr::Macro(Macro::String(bytes), span))
        } else if self.at(TokenKind::Char) {
            let tok = self.eat(TokenKind::Char)?;
            let byte = decode_char_literal(&tok.text)
                .ok_or_else(|| self.err("char literal must decode to exactly one byte"))?;
            Ok(Expr::Macro(Macro::Char(byte), span))
        } else if self.at(TokenKind::Ident) && self.cur().text.chars().all(|c| c.is_ascii_digit()) {
            let tok = self.eat(TokenKind::Ident)?;
            Ok(Expr::Macro(Macro::Number(tok.text), span))
        } else {
            Err(self.err("expected a string, char, or number literal after '!'"))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        if self.at(TokenKind::ParenOpen) {
            self.drop();
            self.parse_paren()
        } else if self.at(TokenKind::Ellipsis) {
            let span = self.cur_span();
            self.drop();
            Ok(Expr::Ellipsis(span))
        } else if self.at(TokenKind::MacroMarker) {
            self.parse_macro()
        } else if self.at(TokenKind::Ident) {
            let span = self.cur_span();
            let name = self.eat(TokenKind::Ident)?.text;
            if self.at(TokenKind::PathSep) {
                let path = self.parse_relative_path(Some((name, span)))?;
                Ok(Expr::RelPath(path))
            } else if self.at(TokenKind::Arrow) {
                self.drop();
                let body = self.parse_chain()?;
                Ok(Expr::Lambda { param: name, body: Box::new(body), span })
            } else {
                Ok(Expr::Ident(name, span))
            }
        } else if self.at(TokenKind::Crate) || self.at(TokenKind::SelfKw) || self.at(TokenKind::Super) {
            let path = self.parse_relative_path(None)?;
            Ok(Expr::RelPath(path))
        } else {
            Err(self.err("expected an expression"))
        }
    }

    /// Parses a left-associative application spine: `f a1 a2 ... an`.
    fn parse_chain(&mut self) -> Result<Expr, Error> {
        let mut prev = self.parse_expr()?;
        while !self.at(TokenKind::ParenClose) && !self.at(TokenKind::SemiColon) && !self.at(TokenKind::End) {
            let arg = self.parse_expr()?;
            prev = Expr::Call(Box::new(prev), Box::new(arg));
        }
        Ok(prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> SourceFile {
        Parser::parse_source(src, None).expect("parse should succeed")
    }

    #[test]
    fn parses_identity() {
        let file = parse("pub main = _ -> ident; pub ident = a -> a;");
        assert_eq!(file.statements.len(), 2);
    }

    #[test]
    fn parses_application_chain_left_associative() {
        let file = parse("pub apply2 = f -> x -> f (f x);");
        match &file.statements[0] {
            Statement::Assignment { value, .. } => {
                // f -> x -> f (f x): outer lambda body is a Call(f, Paren(Call(f,x)))
                if let Expr::Lambda { body, .. } = value {
                    if let Expr::Lambda { body, .. } = &**body {
                        assert!(matches!(**body, Expr::Call(_, _)));
                    } else {
                        panic!("expected nested lambda");
                    }
                } else {
                    panic!("expected lambda");
                }
            }
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn parses_extern_crate_and_impure() {
        let file = parse("extern crate std; extern impure print;");
        assert!(matches!(file.statements[0], Statement::ExternCrate { .. }));
        assert!(matches!(file.statements[1], Statement::Extern { .. }));
    }

    #[test]
    fn parses_import_with_as() {
        let file = parse("pub use std::ident as id;");
        match &file.statements[0] {
            Statement::Import { name, is_public, is_wildcard, .. } => {
                assert_eq!(name.as_deref(), Some("id"));
                assert!(is_public);
                assert!(!is_wildcard);
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn parses_number_macro() {
        let file = parse("pub three = !3;");
        match &file.statements[0] {
            Statement::Assignment { value: Expr::Macro(Macro::Number(n), _), .. } => {
                assert_eq!(n, "3");
            }
            _ => panic!("expected number macro"),
        }
    }

    #[test]
    fn parses_wildcard_import() {
        let file = parse("use std::*;");
        match &file.statements[0] {
            Statement::Import { is_wildcard, name, .. } => {
                assert!(is_wildcard);
                assert!(name.is_none());
            }
            _ => panic!("expected wildcard import"),
        }
    }

    #[test]
    fn parses_stub_ellipsis_body() {
        let file = parse("pub f = ...;");
        match &file.statements[0] {
            Statement::Assignment { value: Expr::Ellipsis(_), .. } => {}
            _ => panic!("expected ellipsis stub body"),
        }
    }

    #[test]
    fn parses_relative_path_with_super() {
        let file = parse("pub x = super::foo::bar;");
        match &file.statements[0] {
            Statement::Assignment { value: Expr::RelPath(p), .. } => {
                assert_eq!(p.segments[0], PathSegment::Super);
            }
            _ => panic!("expected relative path expr"),
        }
    }
}
