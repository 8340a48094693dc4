//! Command-line interface and orchestration for package-quality
//!
//! This module implements the CLI commands and wires the estimator, the batch scheduler
//! and the file-backed collections together.
//!
//! # Commands
//!
//! - **all**: Estimate every package of the worklist
//! - **update**: Estimate only the packages whose next update is due
//! - **pending**: Resume deferred issue computations and retry failed packages
//! - **suspects**: Re-estimate packages with an implausible stored quality, or named ones
//! - **estimate**: Estimate one package and print the JSON estimation without storing it
//! - **init**: Generate a default configuration file
//!
//! ## Execution Flow
//!
//! The `run` function parses command-line arguments using clap and routes to the
//! appropriate command handler. The estimating commands share the same setup in the
//! `common` module:
//!
//! 1. Initialize logging from `--log-level`
//! 2. Resolve the data directory and load the configuration
//! 3. Build the estimator with a registry cache under the data directory
//! 4. Run the batch scheduler over `packages/` and `pending/`
//! 5. Print the batch report
//!
//! Configuration is a TOML file, `package-quality.toml` in the data directory unless
//! `--config` says otherwise. Missing keys take the values of `default_config.toml`.

mod common;
mod config;
mod estimate;
mod host;
mod init;
mod pending;
mod run;
mod suspects;
mod worklist;

#[cfg(debug_assertions)]
pub use config::Config;

pub use estimate::{EstimateArgs, estimate_package};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use pending::{PendingArgs, process_pending};
pub use run::run;
pub use suspects::{SuspectsArgs, process_suspects};
pub use worklist::{WorklistArgs, process_all, process_update};
