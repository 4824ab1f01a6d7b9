use crate::config::Config;
use crate::helper::with_store;
use crate::{Handler, Result};
use clap::Args;

/// Arguments for our `EnterCommand`.
///
/// Opens the configured shell inside a pair, the live system by default.
///
/// Example :
///
/// `btrsnap enter factory`
#[derive(Debug, Args)]
pub struct EnterCommand {
    /// The pair to enter
    name: Option<String>,
}

impl Handler for EnterCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        let name = self.name.as_deref().unwrap_or_default();
        with_store(config, |store, host| {
            Ok(store.enter(host, name, &config.shell)?)
        })
    }
}
