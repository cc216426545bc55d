use clap::Parser;
use lc3_vm::emulator;
use lc3_vm::errors::ExecutionError;
use lc3_vm::terminal::TerminalHost;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::process::ExitCode;

/// Runs an LC-3 object file until it halts.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// `.obj` file to run, big-endian words starting with the `.ORIG` address
    program: PathBuf,
    /// Log more, repeat for even more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

const fn level_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = SimpleLogger::new()
        .with_level(level_filter(args.verbose))
        .init()
    {
        eprintln!("Could not set up logging: {e}");
    }

    let mut emu = match emulator::from_program(&args.program) {
        Ok(emu) => emu,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let mut host = TerminalHost::new();
    match emu.execute(&mut host) {
        Ok(()) | Err(ExecutionError::Interrupted) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
