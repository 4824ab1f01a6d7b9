use crate::config::Config;
use crate::helper::with_store;
use crate::{Handler, Result};
use clap::Args;
use pair_store::names::Pair;

/// Arguments for our `CreateCommand`.
///
/// With a single name, the live system is snapshotted:
///
/// `btrsnap create before-upgrade`
///
/// With two names, the first pair is snapshotted into the second:
///
/// `btrsnap create factory playground`
#[derive(Debug, Args)]
pub struct CreateCommand {
    /// The source pair, or the destination when it is the only name given
    pub(crate) first: String,
    /// The destination pair
    pub(crate) second: Option<String>,
}

impl CreateCommand {
    /// The source pair and the destination name.
    fn names(&self) -> pair_store::Result<(Pair, &str)> {
        Ok(match &self.second {
            Some(destination) => (Pair::parse(&self.first)?, destination.as_str()),
            None => (Pair::Live, self.first.as_str()),
        })
    }
}

impl Handler for CreateCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        let (source, destination) = self.names()?;
        with_store(config, |store, _| Ok(store.create_pair(&source, destination)?))
    }
}

/// Arguments for our `DeleteCommand`.
///
/// Example :
///
/// `btrsnap delete playground`
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// The pair to delete
    name: String,
}

impl Handler for DeleteCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        with_store(config, |store, _| Ok(store.delete_pair(&self.name)?))
    }
}

/// Arguments for our `RenameCommand`.
///
/// Example :
///
/// `btrsnap rename playground sandbox`
#[derive(Debug, Args)]
pub struct RenameCommand {
    /// The pair to rename
    source: String,
    /// Its new name
    destination: String,
}

impl Handler for RenameCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        with_store(config, |store, _| {
            Ok(store.rename_pair(&self.source, &self.destination)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_name_snapshots_the_live_system() -> Result<()> {
        let cmd = CreateCommand {
            first: "bar".to_string(),
            second: None,
        };
        assert_eq!(cmd.names()?, (Pair::Live, "bar"));

        let cmd = CreateCommand {
            first: "foo".to_string(),
            second: Some("bar".to_string()),
        };
        assert_eq!(cmd.names()?, (Pair::parse("foo")?, "bar"));

        let cmd = CreateCommand {
            first: "../foo".to_string(),
            second: Some("bar".to_string()),
        };
        assert!(cmd.names().is_err());
        Ok(())
    }
}
