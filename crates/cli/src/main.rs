//! Conduit CLI - Command-line interface for Conduit
//!
//! Usage:
//!   conduit init [dir]                              - Write an example conduit.yaml
//!   conduit policy roles                            - Show the default role hierarchy
//!   conduit policy check --config <f> --account <a> - Show roles and permissions of an account
//!   conduit inspect --config <f>                    - Print the bootstrapped system snapshot
//!   conduit simulate --config <f>                   - Run a submit/complete handshake end to end

mod commands;

use clap::{Parser, Subcommand};
use commands::{InitCommand, InspectCommand, PolicyCommand, SimulateCommand};

#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "Conduit - Agent authorization and strategy dispatch core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new Conduit deployment config
    Init(InitCommand),
    /// Role and permission inspection
    Policy(PolicyCommand),
    /// Print the system snapshot of a config
    Inspect(InspectCommand),
    /// Simulate agents submitting and an oracle relay completing requests
    Simulate(SimulateCommand),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init(cmd) => cmd.run(),
        Commands::Policy(cmd) => cmd.run(),
        Commands::Inspect(cmd) => cmd.run(),
        Commands::Simulate(cmd) => cmd.run(),
    }
}
