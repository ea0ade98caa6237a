use clap::{Parser, Subcommand};

mod cmd;
mod core;
mod utils;

use cmd::estimate::EstimateCommand;
use cmd::regions::RegionsCommand;
use cmd::schema::SchemaCommand;
use cmd::validate::ValidateCommand;

/// Estimate non-additional REDD+ credits from Global Forest Watch tree cover loss
#[derive(Parser, Debug)]
#[command(name = "ctfs", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Total credits, their value and share of the offset cap (default)
    Estimate(EstimateCommand),
    /// Per-region baseline, performance and credits
    Regions(RegionsCommand),
    /// Report data quality issues in the inputs
    Validate(ValidateCommand),
    /// Print expected input formats
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Estimate(cmd)) => cmd.exec(),
        Some(Command::Regions(cmd)) => cmd.exec(),
        Some(Command::Validate(cmd)) => cmd.exec(),
        Some(Command::Schema(cmd)) => cmd.exec(),
        None => EstimateCommand::default().exec(),
    }
}
