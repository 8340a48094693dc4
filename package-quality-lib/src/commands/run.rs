//! Command dispatch logic for package-quality

use super::{
    EstimateArgs, InitArgs, PendingArgs, SuspectsArgs, WorklistArgs, estimate_package, init_config, process_all, process_pending,
    process_suspects, process_update,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "package-quality", version, author, long_about = None)]
#[command(about = "Estimate the quality of npm packages")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate every package of the worklist
    All(WorklistArgs),
    /// Estimate the packages of the worklist that are due for an update
    Update(WorklistArgs),
    /// Finish deferred estimations and retry packages that failed
    Pending(PendingArgs),
    /// Re-estimate packages with an implausible stored quality, or the named ones
    Suspects(SuspectsArgs),
    /// Estimate a single package and print the result
    Estimate(EstimateArgs),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the corresponding
/// subcommand. It's designed to be called from main.rs with the program arguments.
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        Command::All(args) => process_all(host, args).await,
        Command::Update(args) => process_update(host, args).await,
        Command::Pending(args) => process_pending(host, args).await,
        Command::Suspects(args) => process_suspects(host, args).await,
        Command::Estimate(args) => estimate_package(host, args).await,
        Command::Init(args) => init_config(host, args),
    }
}
