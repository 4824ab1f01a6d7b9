use crate::cli::Result;
use crate::config::Config;
use pair_store::engine::{Btrfs, StorageEngine};
use pair_store::{MountSession, Store};
use root_env::{Host, NativeHost};

/// Mount the configured volume and run `f` on a btrfs backed store.
pub fn with_store<T>(
    config: &Config,
    f: impl FnOnce(&Store, &dyn Host) -> Result<T>,
) -> Result<T> {
    open(&NativeHost, Box::new(Btrfs::default()), config, f)
}

/// Run `f` on a store opened on the configured volume.
///
/// The volume is released whether `f` succeeds or not. When both fail, the
/// error of `f` is the one reported.
pub fn open<T>(
    host: &dyn Host,
    engine: Box<dyn StorageEngine>,
    config: &Config,
    f: impl FnOnce(&Store, &dyn Host) -> Result<T>,
) -> Result<T> {
    let session = MountSession::acquire(host, &config.partition, &config.mount_point)?;
    let store = Store::new(session.mount_point(), engine);

    let result = f(&store, host);
    match (result, session.release()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), released) => {
            if let Err(release_error) = released {
                log::error!("{}", release_error);
            }
            Err(e)
        }
    }
}
