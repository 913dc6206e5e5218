use crate::symbols::SymbolTable;
use crate::tac;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
#[error("{message}")]
pub struct EmitterError {
    pub message: String,
}

/// Which parts of the listing to write
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Listing {
    pub symbols: bool,
    pub tac: bool,
}

impl Default for Listing {
    fn default() -> Self {
        Listing {
            symbols: true,
            tac: true,
        }
    }
}

/// Write the listing to `output`, or to stdout if there is none.
pub(crate) fn emit(
    symbols: &SymbolTable,
    tac: &tac::Program,
    listing: &Listing,
    output: Option<&Path>,
) -> Result<(), EmitterError> {
    match output {
        Some(output_filename) => {
            log::info!("Emitting output file: {}", output_filename.display());

            let file = File::create(output_filename).map_err(|e| EmitterError {
                message: format!("{e} while writing to {}", output_filename.display()),
            })?;
            let mut writer = BufWriter::new(file);

            write_out(symbols, tac, listing, &mut writer)
                .and_then(|_| writer.flush())
                .map_err(|e| EmitterError {
                    message: format!("{e} while writing to {}", output_filename.display()),
                })
        }
        None => {
            log::info!("Emitting to stdout");
            let mut writer = std::io::stdout().lock();
            write_out(symbols, tac, listing, &mut writer).map_err(|e| EmitterError {
                message: format!("{e} while writing to stdout"),
            })
        }
    }
}

fn write_out<W: Write>(
    symbols: &SymbolTable,
    tac: &tac::Program,
    listing: &Listing,
    writer: &mut W,
) -> std::io::Result<()> {
    if listing.symbols {
        writeln!(writer, "# symbol table")?;
        write!(writer, "{symbols}")?;
    }

    if listing.tac {
        if listing.symbols {
            writeln!(writer)?;
        }
        writeln!(writer, "# three-address code")?;
        write!(writer, "{tac}")?;
    }

    Ok(())
}
