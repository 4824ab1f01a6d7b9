use crate::config::Config;
use crate::helper::with_store;
use crate::{Handler, Result};
use clap::Args;
use pair_store::names::Pair;
use pair_store::registry::Registry;

/// Arguments for our `ListCommand`.
///
/// Example :
///
/// `btrsnap list`
#[derive(Debug, Args)]
pub struct ListCommand {}

impl Handler for ListCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        let lines = with_store(config, |store, _| Ok(listing(&store.registry())?))?;
        for line in lines {
            println!("{}", line);
        }
        Ok(())
    }
}

/// One `name (version[, factory])` line per pair, sorted by name.
fn listing(registry: &Registry) -> pair_store::Result<Vec<String>> {
    let mut names = registry.list()?.collect::<Vec<_>>();
    names.sort();

    Ok(names
        .into_iter()
        .filter_map(|name| Pair::parse(&name).ok().map(|pair| (name, pair)))
        .map(|(name, pair)| {
            let version = registry.os_version_of(&pair);
            if registry.is_factory_like(&pair) {
                format!("{} ({}, factory)", name, version)
            } else {
                format!("{} ({})", name, version)
            }
        })
        .collect())
}

/// Arguments for our `PurgeCommand`.
///
/// `btrsnap purge --keep 2` deletes every `saved-<timestamp>` pair but the
/// two most recent ones.
#[derive(Debug, Args)]
pub struct PurgeCommand {
    /// How many backups to keep, overrides the configured `purge-keep`
    #[clap(long, short)]
    pub(crate) keep: Option<usize>,
}

impl Handler for PurgeCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        let keep = self.keep.unwrap_or(config.purge_keep);
        let deleted = with_store(config, |store, _| Ok(store.purge(keep)?))?;
        if deleted.is_empty() {
            log::info!("nothing to purge");
        }
        for name in deleted {
            println!("{}", name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pair_store::testing::make_pair;
    use tempdir::TempDir;

    #[test]
    fn test_listing() -> Result<()> {
        let volume = TempDir::new("btrsnap-list")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "1.0.6.10", true)?;
        make_pair(volume.path(), &Pair::parse("factory")?, "1.0", false)?;
        make_pair(volume.path(), &Pair::Live, "2.0", true)?;
        std::fs::create_dir(volume.path().join("broken-@"))?;
        std::fs::remove_file(volume.path().join("foo-@/etc/os-release"))?;

        let lines = listing(&Registry::new(volume.path()))?;

        assert_eq!(lines, vec!["factory (1.0, factory)", "foo (???)"]);
        Ok(())
    }
}
