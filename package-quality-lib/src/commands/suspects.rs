use super::Host;
use super::common::{Common, CommonArgs, worklist_path, write_report};
use crate::Result;
use crate::batch::{Collection, load_worklist};
use crate::estimation::{Estimation, PackageEntry};
use camino::Utf8PathBuf;
use clap::Parser;
use std::collections::HashSet;

const LOG_TARGET: &str = "  suspects";

/// Stored qualities above this are the product of an earlier defect and need re-estimating.
const MAX_PLAUSIBLE_QUALITY: f64 = 1.0;

#[derive(Parser, Debug)]
pub struct SuspectsArgs {
    /// Packages to re-estimate (default is every stored package with an implausible quality)
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Worklist JSON file mapping package names to entries (default is `all.json` in the data directory)
    #[arg(long, value_name = "PATH")]
    pub worklist: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Re-estimate suspicious packages now, ignoring when they are next due
pub async fn process_suspects<H: Host>(host: &mut H, args: &SuspectsArgs) -> Result<()> {
    let common = Common::new(&args.common)?;
    let path = worklist_path(&common, args.worklist.as_ref());
    let worklist = load_worklist(path.as_std_path(), 0).await?;

    let selected = if args.names.is_empty() {
        let stored: Vec<Estimation> = common.packages().list().await?;
        select_implausible(worklist, &stored)
    } else {
        select_named(&common, worklist, &args.names).await
    };

    log::info!(target: LOG_TARGET, "Re-estimating {} suspicious packages", selected.len());

    let report = common.scheduler(false).run_batch(&selected).await?;
    write_report(host, &report);
    Ok(())
}

fn select_implausible(worklist: Vec<PackageEntry>, stored: &[Estimation]) -> Vec<PackageEntry> {
    let suspects: HashSet<&str> = stored
        .iter()
        .filter(|estimation| estimation.quality.is_some_and(|quality| quality > MAX_PLAUSIBLE_QUALITY))
        .map(|estimation| estimation.name.as_str())
        .collect();

    worklist.into_iter().filter(|entry| suspects.contains(entry.name.as_str())).collect()
}

/// Named packages, taken from the worklist or looked up in the registry when absent.
async fn select_named(common: &Common, worklist: Vec<PackageEntry>, names: &[String]) -> Vec<PackageEntry> {
    let mut selected: Vec<PackageEntry> = worklist.into_iter().filter(|entry| names.contains(&entry.name)).collect();

    for name in names {
        if selected.iter().any(|entry| &entry.name == name) {
            continue;
        }

        match common.estimator.lookup(name).await {
            Ok(entry) => selected.push(entry),
            Err(e) => log::warn!(target: LOG_TARGET, "Skipping {name}: {e}"),
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(name: &str, quality: f64) -> Estimation {
        let now = Utc::now();
        let mut estimation = Estimation::new(&PackageEntry::named(name), now, now);
        estimation.quality = Some(quality);
        estimation
    }

    #[test]
    fn selects_only_implausible_qualities_in_worklist_order() {
        let worklist = vec![
            PackageEntry::named("c"),
            PackageEntry::named("a"),
            PackageEntry::named("b"),
            PackageEntry::named("d"),
        ];
        let stored = [stored("a", 1.5), stored("b", 0.7), stored("c", 2.0), stored("e", 3.0)];

        let selected: Vec<_> = select_implausible(worklist, &stored).into_iter().map(|e| e.name).collect();
        assert_eq!(selected, ["c", "a"]);
    }

    #[test]
    fn quality_of_exactly_one_is_plausible() {
        let selected = select_implausible(vec![PackageEntry::named("a")], &[stored("a", 1.0)]);
        assert!(selected.is_empty());
    }
}
