mod cmd;
mod logging;
mod output;
mod prompts;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cmd::{FetchArgs, GenerateArgs, PlanArgs, SyncArgs};
use output::{OutputFormat, print_error};

/// appsync - keep an installed application in sync with its manifest
#[derive(Parser)]
#[command(name = "appsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Install or update the application, then launch it
  Sync(SyncArgs),

  /// Show what a sync would change
  Plan(PlanArgs),

  /// Fetch or delete individual files of an installation
  Fetch(FetchArgs),

  /// Rebuild a manifest's file list from an application directory
  Generate(GenerateArgs),
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  let log_file = logging::init(cli.verbose);

  let result = match cli.command {
    Commands::Sync(args) => cmd::cmd_sync(args, &log_file, cli.output),
    Commands::Plan(args) => cmd::cmd_plan(args, cli.output),
    Commands::Fetch(args) => cmd::cmd_fetch(args, cli.output),
    Commands::Generate(args) => cmd::cmd_generate(args, cli.output),
  };

  if let Err(e) = &result {
    print_error(&format!("{:#}", e));
  }
  result
}
