use crate::config::Config;
use crate::helper::with_store;
use crate::{Handler, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for our `InjectCommand`.
///
/// Example :
///
/// `btrsnap inject rootfs-foo-1.0.tar.gz homefs-foo-1.0.tar.gz foo`
#[derive(Debug, Args)]
pub struct InjectCommand {
    /// Archive of the root half
    rootfs: PathBuf,
    /// Archive of the home half
    homefs: PathBuf,
    /// The pair to create
    name: String,
}

impl Handler for InjectCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        with_store(config, |store, _| {
            Ok(store.inject(&self.rootfs, &self.homefs, &self.name)?)
        })
    }
}

/// Arguments for our `ExportCommand`.
///
/// Example :
///
/// `btrsnap export foo /srv/images`
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// The pair to export
    name: String,
    /// Where to write the archives
    out_dir: PathBuf,
}

impl Handler for ExportCommand {
    fn handler(&self, config: &Config) -> Result<()> {
        let (rootfs, homefs) =
            with_store(config, |store, _| Ok(store.export(&self.name, &self.out_dir)?))?;
        println!("{}", rootfs.display());
        println!("{}", homefs.display());
        Ok(())
    }
}
