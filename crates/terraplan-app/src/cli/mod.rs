use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "terraplan",
    version,
    author,
    about = "Municipality zoning-plan analysis service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            command: None,
            verbose: 0,
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn print_help() {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        println!();
    }
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the terraplan HTTP server.
    Serve(ServeArgs),
    /// Run the full pipeline for one municipality and exit.
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs;

/// One-shot pipeline execution without the HTTP surface.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Municipality name as it appears in the links CSV.
    #[arg(long)]
    pub city: String,
    /// Optional free-text task description; recorded in the logs.
    #[arg(long, default_value = "")]
    pub task: String,
}
