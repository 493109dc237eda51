//! eifdump CLI - inspect EIF enclave image files
//!
//! Parses the fixed file header and every declared section sub-header,
//! prints them field by field, and dumps the metadata section's JSON text
//! when the image carries one.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Inspect an EIF enclave image file
///
/// Prints the file header, each section sub-header, and the metadata
/// section's JSON payload if present. Size disagreements between the header
/// table and a section's own sub-header are reported as warnings on stderr
/// without failing the run.
#[derive(Parser)]
#[command(name = "eifdump")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the EIF image file
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Verify the header CRC32 against the file contents
    #[arg(long)]
    check_crc: bool,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: String,
}

fn main() -> ExitCode {
    // Map argument errors to exit code 1 like every other failure; clap's
    // default would be 2.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are "errors" to try_parse but successes
            // to the user.
            if e.use_stderr() {
                eprintln!("{e}");
                return ExitCode::from(1);
            }
            print!("{e}");
            return ExitCode::SUCCESS;
        }
    };

    if let Err(e) = eifdump::cli::check_format(&cli.format) {
        eprintln!("Error: {e}");
        return ExitCode::from(1);
    }

    match eifdump::cli::describe(&cli.image, cli.check_crc, &cli.format) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}
