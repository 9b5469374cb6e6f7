//! Demo CLI: loads a PS-X EXE image and prints the adapter projection
//! (C5) for a requested address range.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use psxmicro::debug::StaticDebugSource;
use psxmicro::Analyzer;

/// Disassembles a PS-X EXE image into its micro-assembly projection.
#[derive(Parser, Debug)]
#[command(name = "psxmicro", version, about)]
struct Cli {
    /// Path to the PS-X EXE image.
    exe: PathBuf,

    /// Global address to start the projection at; defaults to pc0.
    #[arg(long)]
    offset: Option<u32>,

    /// Number of blocks to print.
    #[arg(long, default_value_t = 64)]
    length: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let image = match fs::read(&cli.exe) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(path = %cli.exe.display(), %err, "failed to read image");
            return ExitCode::FAILURE;
        }
    };

    let debug = StaticDebugSource::new();
    let analyzer = match Analyzer::build(&image, &debug) {
        Ok(a) => a,
        Err(err) => {
            error!(%err, "failed to build analyzer");
            return ExitCode::FAILURE;
        }
    };

    let offset = cli.offset.unwrap_or(analyzer.header().pc0);
    for view in analyzer.instructions(offset, cli.length) {
        match view.jump_target {
            Some(target) => println!("{:#010x}: {}  -> {:#010x}", view.address, view.text, target),
            None => println!("{:#010x}: {}", view.address, view.text),
        }
    }

    ExitCode::SUCCESS
}
