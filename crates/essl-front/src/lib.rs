//! Frontend for the ESSL shader compiler: source text in, declaration-list
//! AST out.
//!
//! The validation core treats lexing and parsing as external collaborators;
//! this crate is that collaborator. Nothing in `essl-validate` or the
//! backends depends on it.

mod lexer;
mod parser;

pub use lexer::{tokenize, Kw, LexOutput, SpannedTok, Tok};

use essl_ast::{Diagnostic, TranslationUnit};

/// The result of parsing one shader source string.
///
/// A unit is always returned; if `diagnostics` contains any error the unit
/// is partial and must not be validated as a complete program.
#[derive(Debug)]
pub struct ParseOutput {
    pub unit: TranslationUnit,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    /// True when no lexical or syntactic error was recorded.
    pub fn is_clean(&self) -> bool {
        self.diagnostics
            .iter()
            .all(|d| d.severity != essl_ast::Severity::Error)
    }
}

/// Lexes and parses `source` into a translation unit.
pub fn parse(source: &str) -> ParseOutput {
    let lexed = tokenize(source);
    let mut diagnostics = lexed.diagnostics;
    let (mut unit, parse_diags) = parser::parse_tokens(lexed.tokens);
    unit.extensions = lexed.extensions;
    unit.version = lexed.version;
    diagnostics.extend(parse_diags);
    log::debug!(
        "parsed {} declarations, {} diagnostics",
        unit.decls.len(),
        diagnostics.len()
    );
    ParseOutput { unit, diagnostics }
}
