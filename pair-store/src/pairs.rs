use crate::names::{Half, Pair};
use crate::{Error, Result, Store};

impl Store {
    /// Snapshot both halves of `source` into a new pair named `destination`.
    ///
    /// The root half is snapshotted first. If the home half then fails, the
    /// root snapshot is left in place and reported.
    pub fn create_pair(&self, source: &Pair, destination: &str) -> Result<()> {
        let destination = Pair::new_named(destination)?;
        let registry = self.registry();
        registry.assert_exists(source)?;
        registry.assert_absent(&destination)?;

        log::info!("creating {} from {}", destination, source);
        self.both_halves("created", &destination, |half| {
            self.engine().snapshot(
                &registry.path(source, half),
                &registry.path(&destination, half),
            )
        })
    }

    /// Delete both halves of `name`.
    ///
    /// `factory` and the live system are protected.
    pub fn delete_pair(&self, name: &str) -> Result<()> {
        let pair = Pair::parse(name)?;
        if pair.is_factory() || pair.is_live() {
            return Err(Error::Protected(pair.to_string()));
        }
        let registry = self.registry();
        registry.assert_exists(&pair)?;

        log::info!("deleting {}", pair);
        self.both_halves("deleted", &pair, |half| {
            self.engine().delete_subvolume(&registry.path(&pair, half))
        })
    }

    /// Move both halves of `source` to `destination`.
    pub fn rename_pair(&self, source: &str, destination: &str) -> Result<()> {
        let source = Pair::parse(source)?;
        if source.is_live() {
            return Err(Error::Protected(source.to_string()));
        }
        let destination = Pair::new_named(destination)?;
        let registry = self.registry();
        registry.assert_exists(&source)?;
        registry.assert_absent(&destination)?;

        log::info!("renaming {} to {}", source, destination);
        self.both_halves("renamed", &source, |half| {
            self.engine().rename(
                &registry.path(&source, half),
                &registry.path(&destination, half),
            )
        })
    }

    /// Delete the backups saved by restores, keeping the `keep` most recent ones.
    ///
    /// Returns the names of the deleted pairs.
    pub fn purge(&self, keep: usize) -> Result<Vec<String>> {
        let mut backups = self
            .registry()
            .list()?
            .filter_map(|name| {
                let timestamp = Pair::parse(&name).ok()?.backup_timestamp()?;
                Some((timestamp, name))
            })
            .collect::<Vec<_>>();
        backups.sort_unstable_by(|a, b| b.cmp(a));

        let mut deleted = vec![];
        for (_, name) in backups.into_iter().skip(keep) {
            self.delete_pair(&name)?;
            deleted.push(name);
        }
        Ok(deleted)
    }

    /// Apply `operation` to the root half, then to the home half.
    fn both_halves<F>(&self, action: &'static str, pair: &Pair, mut operation: F) -> Result<()>
    where
        F: FnMut(Half) -> Result<()>,
    {
        operation(Half::Root)?;
        operation(Half::Home).map_err(|e| Error::PartialPair {
            action,
            done: pair.root().subvolume(),
            failed: pair.home().subvolume(),
            reason: e.to_string(),
        })
    }
}
