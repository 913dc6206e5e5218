pub mod ast;
mod emitter;
mod lexer;
mod parser;
pub mod semantics;
pub mod symbols;
pub mod tac;
mod temp_gen;

pub use emitter::{EmitterError, Listing};
pub use lexer::LexerError;
pub use parser::ParserError;
pub use symbols::SemanticError;
pub use tac::TacError;

use semantics::Translator;
use std::fs;
use std::path::{Path, PathBuf};
use symbols::SymbolTable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O: {path}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Tac(#[from] TacError),

    #[error(transparent)]
    Emitter(#[from] EmitterError),
}

impl Error {
    /// Byte offset into the source text, for errors that have one
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Lexer(e) => Some(e.offset),
            Error::Parser(e) => Some(e.offset),
            Error::Semantic(e) => e.offset(),
            Error::Tac(e) => e.source.offset(),
            Error::Io { .. } | Error::Emitter(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct StopAfter {
    pub lex: bool,
    pub parse: bool,
}

impl StopAfter {
    pub fn will_stop(&self) -> bool {
        self.lex || self.parse
    }
}

/// Everything produced from one compilation unit.
#[derive(Debug)]
pub struct Translation {
    pub program: ast::Program,
    pub symbols: SymbolTable,
    pub tac: tac::Program,
}

/// Run the whole pipeline over `source`: lex, parse with the symbol table
/// filled in as declarations are seen, then generate three-address code.
pub fn translate(source: &str) -> Result<Translation, Error> {
    let (program, symbols) = front_end(source)?;
    let tac = tac::generate(&program, &symbols)?;
    Ok(Translation {
        program,
        symbols,
        tac,
    })
}

fn front_end(source: &str) -> Result<(ast::Program, SymbolTable), Error> {
    let tokens = lexer::lex(source)?;
    log::debug!("Lexed input: {tokens:#?}");

    let mut translator = Translator::new();
    let program = parser::parse(&tokens, &mut translator)?;
    let symbols = translator.into_symbols();
    log::debug!("AST: {program:#?}");
    log::debug!("Symbol table:\n{symbols}");

    Ok((program, symbols))
}

pub fn read_input(input_filename: &Path) -> Result<String, Error> {
    log::info!("Reading input file: {}", input_filename.display());
    let input = fs::read_to_string(input_filename).map_err(|e| Error::Io {
        source: e,
        path: input_filename.to_path_buf(),
    })?;
    Ok(input)
}

/// Translate `input` and write its listing to `output` (stdout if `None`).
///
/// If generation fails part way, the functions completed before the failure
/// are still written out before the error is returned.
pub fn do_the_thing(
    input: &str,
    input_filename: &Path,
    output: Option<&Path>,
    stop_after: &StopAfter,
    listing: &Listing,
) -> Result<(), Error> {
    if stop_after.lex {
        log::info!("Lexing input file: {}", input_filename.display());
        let tokens = lexer::lex(input)?;
        log::debug!("Lexed input: {tokens:#?}");
        return Ok(());
    }

    log::info!("Parsing input file: {}", input_filename.display());
    let (program, symbols) = front_end(input)?;

    if stop_after.parse {
        return Ok(());
    }

    log::info!("Generating TAC for: {}", input_filename.display());
    match tac::generate(&program, &symbols) {
        Ok(tac) => {
            log::debug!("TAC:\n{tac}");
            emitter::emit(&symbols, &tac, listing, output)?;
            Ok(())
        }
        Err(e) => {
            emitter::emit(&symbols, &e.completed, listing, output)?;
            Err(e.into())
        }
    }
}
