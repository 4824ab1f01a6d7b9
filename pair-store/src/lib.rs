use crate::engine::StorageEngine;
use crate::names::{Half, Pair};
use crate::registry::Registry;
use root_env::{Chroot, Command, Host};
use std::path::{Path, PathBuf};

pub mod archive;
pub mod engine;
pub mod names;
mod pairs;
pub mod registry;
pub mod session;
pub mod switch;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use session::MountSession;
pub use switch::{SwitchOver, SwitchReport, SwitchState};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A pair, or one of its halves, is missing
    #[error("{0} does not exist")]
    NotFound(String),
    /// The destination of an operation is already taken
    #[error("{0} already exists")]
    AlreadyExists(String),
    /// The pair is reserved and cannot be modified this way
    #[error("{0} is protected")]
    Protected(String),
    /// The name cannot be used for a new pair
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    /// A storage primitive failed
    #[error("`{operation}` failed: {reason}")]
    Storage { operation: String, reason: String },
    /// The first half of a pair operation succeeded and the second did not
    #[error("{done} was {action} but {failed} was not ({reason}); fix the pair by hand")]
    PartialPair {
        action: &'static str,
        done: String,
        failed: String,
        reason: String,
    },
    /// A half could not be filled and was left on the volume
    #[error("{subvolume} was left incomplete ({reason}); delete it by hand")]
    Incomplete { subvolume: String, reason: String },
    /// A switch-over step failed, the volume is left as it was at that point
    #[error("restore failed while {stage}: {reason}; the volume needs manual repair")]
    Fatal { stage: SwitchState, reason: String },
    /// An archive could not be read or written
    #[error("archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },
    /// The backing volume could not be mounted or released
    #[error("backing volume: {0}")]
    Mount(String),
    /// An error occurred while running something inside a pair
    #[error(transparent)]
    Env(#[from] root_env::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A common result type for our crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The `Store` is responsible for the snapshot pairs of a mounted volume.
///
/// It provides methods to create, delete, rename, archive and restore pairs.
/// All of them check the registry before touching the volume.
pub struct Store {
    /// Where the top-level volume is mounted.
    volume: PathBuf,
    /// The copy-on-write primitives to use
    engine: Box<dyn StorageEngine>,
}

impl Store {
    pub fn new(volume: &Path, engine: Box<dyn StorageEngine>) -> Self {
        Self {
            volume: volume.to_path_buf(),
            engine,
        }
    }

    pub fn registry(&self) -> Registry<'_> {
        Registry::new(&self.volume)
    }

    pub fn volume(&self) -> &Path {
        &self.volume
    }

    pub(crate) fn engine(&self) -> &dyn StorageEngine {
        self.engine.as_ref()
    }

    /// Run `shell` inside the root half of `name`, its home half bound on `/home`.
    pub fn enter(&self, host: &dyn Host, name: &str, shell: &str) -> Result<()> {
        let pair = Pair::parse(name)?;
        let registry = self.registry();
        registry.assert_exists(&pair)?;

        Chroot::new(&registry.path(&pair, Half::Root))
            .home(&registry.path(&pair, Half::Home))
            .command(Command::new(shell))
            .run(host)?;
        Ok(())
    }
}
