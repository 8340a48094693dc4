use super::Host;
use super::common::{Common, CommonArgs, worklist_path, write_report};
use crate::Result;
use crate::batch::load_worklist;
use camino::Utf8PathBuf;
use clap::Parser;

#[derive(Parser, Debug)]
pub struct WorklistArgs {
    /// Worklist JSON file mapping package names to entries (default is `all.json` in the data directory)
    #[arg(long, value_name = "PATH")]
    pub worklist: Option<Utf8PathBuf>,

    /// Skip this many packages at the start of the worklist
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub offset: usize,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Estimate every package of the worklist, regardless of when it was last estimated
pub async fn process_all<H: Host>(host: &mut H, args: &WorklistArgs) -> Result<()> {
    process_worklist(host, args, false).await
}

/// Estimate the packages of the worklist that are due for an update
pub async fn process_update<H: Host>(host: &mut H, args: &WorklistArgs) -> Result<()> {
    process_worklist(host, args, true).await
}

async fn process_worklist<H: Host>(host: &mut H, args: &WorklistArgs, respect_schedule: bool) -> Result<()> {
    let common = Common::new(&args.common)?;
    let path = worklist_path(&common, args.worklist.as_ref());
    let worklist = load_worklist(path.as_std_path(), args.offset).await?;

    let report = common.scheduler(respect_schedule).run_batch(&worklist).await?;
    write_report(host, &report);
    Ok(())
}
