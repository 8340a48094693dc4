use super::Host;
use super::common::{Common, CommonArgs, write_report};
use crate::Result;
use clap::Parser;

#[derive(Parser, Debug)]
pub struct PendingArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Resume deferred issue computations and re-estimate packages that failed earlier
pub async fn process_pending<H: Host>(host: &mut H, args: &PendingArgs) -> Result<()> {
    let common = Common::new(&args.common)?;

    let report = common.scheduler(false).run_pending().await?;
    write_report(host, &report);
    Ok(())
}
