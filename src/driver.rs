use anyhow::{anyhow, bail};
use clap::Parser;
use env_logger::Env;
use line_numbers::LinePositions;
use log::info;
use sdtac::{do_the_thing, Error, Listing, StopAfter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short = 'd', long = "debug", action)]
    debug: bool,

    #[arg(short = 'v', long = "verbose", action)]
    verbose: bool,

    #[arg(short = 'q', long = "quiet", action)]
    quiet: bool,

    /// Path to the file(s) to be translated
    #[arg(value_name = "FILE", required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Write the listing here instead of stdout (single input only)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Stop after lexing
    #[arg(long)]
    lex: bool,

    /// Stop after parsing and filling the symbol table
    #[arg(long)]
    parse: bool,

    /// Leave the symbol table out of the listing
    #[arg(long)]
    no_symbols: bool,

    /// Leave the three-address code out of the listing
    #[arg(long)]
    no_tac: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match (cli.debug, cli.verbose, cli.quiet) {
        (_, _, true) => "error",
        (true, _, _) => "debug",
        (_, true, _) => "info",
        (_, _, _) => "warn",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    if cli.output.is_some() && cli.input.len() > 1 {
        bail!("--output can only be used with a single input file");
    }

    let stop_after = StopAfter {
        lex: cli.lex,
        parse: cli.parse,
    };
    let listing = Listing {
        symbols: !cli.no_symbols,
        tac: !cli.no_tac,
    };

    for input_filename in &cli.input {
        process_file(input_filename, cli.output.as_deref(), &stop_after, &listing)?;
    }

    if stop_after.will_stop() {
        info!("Stopped early, no listing written");
    }

    Ok(())
}

fn process_file(
    input_filename: &Path,
    output: Option<&Path>,
    stop_after: &StopAfter,
    listing: &Listing,
) -> anyhow::Result<()> {
    info!("Translating input file: {}", input_filename.display());
    let input = sdtac::read_input(input_filename)?;
    do_the_thing(&input, input_filename, output, stop_after, listing)
        .map_err(|e| located(&input, input_filename, e))
}

// Turn a byte offset, if the error has one, into a line and column
fn located(input: &str, input_filename: &Path, e: Error) -> anyhow::Error {
    let stage = match e {
        Error::Lexer(_) => "Lexer error",
        Error::Parser(_) => "Parser error",
        Error::Semantic(_) | Error::Tac(_) => "Semantic error",
        Error::Io { .. } | Error::Emitter(_) => "Error",
    };

    match e.offset() {
        Some(offset) => {
            let line_positions = LinePositions::from(input);
            let (line_num, column) = line_positions.from_offset(offset);
            anyhow!(
                "{stage} in {file} at line {line_num}, column {column}: {e}",
                file = input_filename.display(),
                line_num = line_num.display(),
                column = column + 1
            )
        }
        None => anyhow!("{stage} in {}: {e}", input_filename.display()),
    }
}
