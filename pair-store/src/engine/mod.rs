pub mod btrfs;

pub use btrfs::Btrfs;

use crate::{Error, Result};
use std::path::Path;

/// The `StorageEngine` trait defines the copy-on-write primitives pairs are built from.
///
/// Every method acts on a single subvolume and is expected to be atomic at that
/// granularity. Paths are absolute paths below the mounted top-level volume.
pub trait StorageEngine {
    /// Create a writable snapshot of `source` at `destination`.
    fn snapshot(&self, source: &Path, destination: &Path) -> Result<()>;
    /// Create a new empty subvolume.
    fn create_subvolume(&self, path: &Path) -> Result<()>;
    fn delete_subvolume(&self, path: &Path) -> Result<()>;
    /// Move a subvolume in place.
    fn rename(&self, source: &Path, destination: &Path) -> Result<()> {
        log::debug!("moving {} to {}", source.display(), destination.display());
        std::fs::rename(source, destination).map_err(|e| Error::Storage {
            operation: format!("rename {}", source.display()),
            reason: e.to_string(),
        })
    }
    /// The internal identifier of the subvolume at `path`.
    fn subvolume_id(&self, path: &Path) -> Result<u64>;
    /// Make the subvolume `id` the one mounted by default from `volume`.
    fn set_default(&self, id: u64, volume: &Path) -> Result<()>;
    /// The UUID of the filesystem mounted at `volume`.
    fn filesystem_uuid(&self, volume: &Path) -> Result<String>;
}
