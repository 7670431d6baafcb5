use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cachesim::driver::{self, parse_u32_literal, OutputSpec};
use cachesim::error::SimulatorError;

/// RV32IM emulator with a unified L1 cache, comparing LRU and
/// tree-pLRU replacement on the same workload.
#[derive(Parser)]
#[command(name = "cachesim", version)]
struct Cli {
    /// Input snapshot (initial PC, registers x1..x31, memory fragments)
    #[arg(short = 'i', value_name = "FILE")]
    input: PathBuf,

    /// Write the LRU run's final state: output file, window start
    /// address, window size in bytes
    #[arg(short = 'o', num_args = 3, value_names = ["FILE", "START_ADDR", "SIZE"])]
    output: Option<Vec<String>>,

    /// Print a verbose execution trace on stderr
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let output = match cli.output.as_deref().map(parse_output_spec).transpose() {
        Ok(output) => output,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match driver::run(&cli.input, output.as_ref(), cli.debug) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Interpret the three `-o` values: path, start address, size.
/// The numeric values accept decimal, hex (0x), and octal (leading 0).
fn parse_output_spec(values: &[String]) -> Result<OutputSpec, SimulatorError> {
    let path = PathBuf::from(&values[0]);
    let start_addr = parse_u32_literal(&values[1]).ok_or_else(|| {
        SimulatorError::Argument(format!("invalid start address '{}'", values[1]))
    })?;
    let size = parse_u32_literal(&values[2]).ok_or_else(|| {
        SimulatorError::Argument(format!("invalid size '{}'", values[2]))
    })?;
    Ok(OutputSpec { path, start_addr, size })
}
