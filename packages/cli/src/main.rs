mod commands;
mod scenario;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{config, decode, init, run, ConfigArgs, DecodeArgs, InitArgs, RunArgs};
use tracing_subscriber::EnvFilter;

/// Weft CLI - drive the request lifecycle from scripted scenarios
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log lifecycle internals (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter config and scenario
    Init(InitArgs),

    /// Run request scenarios through the lifecycle
    Run(RunArgs),

    /// Decode a client-side state payload
    Decode(DecodeArgs),

    /// Print the resolved configuration
    Config(ConfigArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("{} Cannot read current directory: {}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Run(args) => run(args, &cwd),
        Command::Decode(args) => decode(args),
        Command::Config(args) => config(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
