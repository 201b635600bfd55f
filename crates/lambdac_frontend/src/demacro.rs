//! Macro desugaring (spec §4.3, component C4).
//!
//! Runs on the surface AST, strictly before name resolution: every
//! `!"..."`/`!'x'`/`!N` literal becomes a reference into `std::list_n` /
//! `std::decK` / `std::<digit>`, so the resolver only ever has to deal
//! with plain calls, lambdas, and paths.

use crate::ast::{Expr, Macro, PathSegment, RelativePath, SourceFile, Statement};
use crate::error::Span;

fn std_path(segments: &[&str], span: &Span) -> RelativePath {
    let mut segs = vec![PathSegment::Name("std".to_string())];
    segs.extend(segments.iter().map(|s| PathSegment::Name(s.to_string())));
    RelativePath { segments: segs, span: span.clone() }
}

fn build_call_chain(mut exprs: Vec<Expr>) -> Expr {
    let mut chain = exprs.remove(0);
    for e in exprs {
        chain = Expr::Call(Box::new(chain), Box::new(e));
    }
    chain
}

/// `!N` → `std::decK std::d0 std::d1 ... std::d(K-1)` for a K-digit `N`,
/// or just `std::N` directly when `N` is a single digit.
fn desugar_number(digits: &str, span: &Span) -> Expr {
    let digit_exprs: Vec<Expr> = digits
        .chars()
        .map(|d| Expr::RelPath(std_path(&[&d.to_string()], span)))
        .collect();

    if digit_exprs.len() == 1 {
        return digit_exprs.into_iter().next().unwrap();
    }

    let dec_name = format!("dec{}", digit_exprs.len());
    let mut chain_exprs = vec![Expr::RelPath(std_path(&[&dec_name], span))];
    chain_exprs.extend(digit_exprs);
    Expr::Paren(Box::new(build_call_chain(chain_exprs)))
}

/// `!'x'` → the single byte's decimal value, desugared the same way a
/// number literal is.
fn desugar_char(byte: u8, span: &Span) -> Expr {
    desugar_number(&byte.to_string(), span)
}

/// `!"..."` → `std::list_n <len> <byte0> <byte1> ...`, each byte itself
/// desugared as a number.
fn desugar_string(bytes: &[u8], span: &Span) -> Expr {
    let char_exprs: Vec<Expr> = bytes.iter().map(|b| desugar_char(*b, span)).collect();
    let len_expr = desugar_number(&bytes.len().to_string(), span);

    let mut chain_exprs = vec![Expr::RelPath(std_path(&["list_n"], span)), len_expr];
    chain_exprs.extend(char_exprs);
    Expr::Paren(Box::new(build_call_chain(chain_exprs)))
}

pub fn desugar_expr(expr: &Expr) -> Expr {
    match expr {
        Expr::Paren(inner) => Expr::Paren(Box::new(desugar_expr(inner))),
        Expr::Call(f, a) => Expr::Call(Box::new(desugar_expr(f)), Box::new(desugar_expr(a))),
        Expr::Lambda { param, body, span } => {
            Expr::Lambda { param: param.clone(), body: Box::new(desugar_expr(body)), span: span.clone() }
        }
        Expr::Macro(m, span) => match m {
            Macro::String(bytes) => desugar_string(bytes, span),
            Macro::Char(byte) => desugar_char(*byte, span),
            Macro::Number(digits) => desugar_number(digits, span),
        },
        other => other.clone(),
    }
}

fn desugar_statement(stmt: &Statement) -> Statement {
    match stmt {
        Statement::Assignment { name, value, is_public, is_impure, span } => Statement::Assignment {
            name: name.clone(),
            value: desugar_expr(value),
            is_public: *is_public,
            is_impure: *is_impure,
            span: span.clone(),
        },
        other => other.clone(),
    }
}

pub fn desugar_source_file(file: &SourceFile) -> SourceFile {
    SourceFile { statements: file.statements.iter().map(desugar_statement).collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn desugar(src: &str) -> SourceFile {
        let file = Parser::parse_source(src, None).unwrap();
        desugar_source_file(&file)
    }

    #[test]
    fn single_digit_number_becomes_plain_std_path() {
        let file = desugar("pub n = !3;");
        match &file.statements[0] {
            Statement::Assignment { value: Expr::RelPath(p), .. } => {
                assert_eq!(p.segments, vec![PathSegment::Name("std".into()), PathSegment::Name("3".into())]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn multi_digit_number_becomes_dec_chain() {
        let file = desugar("pub n = !42;");
        match &file.statements[0] {
            Statement::Assignment { value: Expr::Paren(inner), .. } => {
                assert!(matches!(**inner, Expr::Call(_, _)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn string_literal_becomes_list_n_call() {
        let file = desugar(r#"pub s = !"hi";"#);
        match &file.statements[0] {
            Statement::Assignment { value: Expr::Paren(_), .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn char_literal_desugars_like_a_number() {
        let file = desugar("pub c = !'a';");
        match &file.statements[0] {
            Statement::Assignment { value: Expr::Paren(inner), .. } => {
                assert!(matches!(**inner, Expr::Call(_, _)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
