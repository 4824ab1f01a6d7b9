use crate::config::Config;
use crate::helper::with_store;
use crate::{Handler, Result};
use clap::Args;
use pair_store::SwitchReport;

/// Arguments for our `RestoreCommand`.
///
/// The live system is saved as `saved-<timestamp>` and replaced by a
/// snapshot of the given pair, which is booted from then on.
///
/// Example :
///
/// `btrsnap restore factory`
#[derive(Debug, Args)]
pub struct RestoreCommand {
    /// The pair to make live
    name: String,
}

impl Handler for RestoreCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        let report = with_store(config, |store, host| {
            Ok(store.restore(host, &self.name, &config.hooks_dir)?)
        })?;
        summarize(&report);
        println!("{} is live, reboot to use it", self.name);
        Ok(())
    }
}

fn summarize(report: &SwitchReport) {
    log::info!("previous live system saved as {}", report.backup);
    log::info!("default subvolume is now {}", report.default_subvolume);
    if report.uuid_rewritten {
        log::info!("boot table updated");
    }
    let failed = report.hooks.iter().filter(|hook| !hook.is_success()).count();
    if failed > 0 {
        log::warn!("{} of {} restore hooks failed", failed, report.hooks.len());
    }
}
