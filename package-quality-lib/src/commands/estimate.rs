use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::estimation::{EstimateError, Estimation, EstimationResult, Estimator, PackageEstimator};
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct EstimateArgs {
    /// Name of the package in the registry
    #[arg(value_name = "NAME")]
    pub name: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Estimate a single package and print the estimation as JSON, without persisting it
pub async fn estimate_package<H: Host>(host: &mut H, args: &EstimateArgs) -> Result<()> {
    let common = Common::new(&args.common)?;

    match estimate_one(&common.estimator, &args.name).await {
        Ok(estimation) => {
            let json = serde_json::to_string_pretty(&estimation).into_app_err("serializing estimation")?;
            let _ = writeln!(host.output(), "{json}");
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "Could not estimate '{}': {e}", args.name);
            host.exit(1);
            Err(e).into_app_err_with(|| format!("estimating '{}'", args.name))
        }
    }
}

/// Look the package up, estimate it, and finish any deferred issues computation right away.
async fn estimate_one(estimator: &Estimator, name: &str) -> core::result::Result<Estimation, EstimateError> {
    let entry = estimator.lookup(name).await?;

    match estimator.estimate(&entry).await?.result {
        EstimationResult::Final(estimation) => Ok(estimation),
        EstimationResult::Deferred { partial, continuation } => {
            Ok(estimator.resolve_pending(partial, &continuation).await?.estimation)
        }
    }
}
