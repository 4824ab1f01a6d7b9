use crate::{Error, Result};
use root_env::Host;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level subvolume of a btrfs filesystem, where all the pairs live.
const TOP_LEVEL: &str = "subvolid=5";

/// Exclusive access to the top level of the backing volume.
///
/// The volume is mounted by `acquire` and unmounted by `release`, or when
/// the session is dropped.
pub struct MountSession<'h> {
    host: &'h dyn Host,
    mount_point: PathBuf,
    mounted: bool,
}

impl<'h> MountSession<'h> {
    /// Mount the top level of `partition` on `mount_point`.
    ///
    /// Anything already mounted there, such as a session left over by an
    /// interrupted run, is detached first.
    pub fn acquire(host: &'h dyn Host, partition: &Path, mount_point: &Path) -> Result<Self> {
        fs::create_dir_all(mount_point)?;
        host.force_unmount(mount_point).map_err(|e| {
            Error::Mount(format!("cannot clear {}: {}", mount_point.display(), e))
        })?;

        log::debug!("mounting {} on {}", partition.display(), mount_point.display());
        host.mount(partition, mount_point, "btrfs", Some(TOP_LEVEL))
            .map_err(|e| {
                Error::Mount(format!(
                    "cannot mount {} on {}: {}",
                    partition.display(),
                    mount_point.display(),
                    e
                ))
            })?;

        let session = MountSession {
            host,
            mount_point: mount_point.to_path_buf(),
            mounted: true,
        };
        session.settle()?;
        Ok(session)
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Unmount the volume.
    pub fn release(mut self) -> Result<()> {
        self.mounted = false;
        log::debug!("unmounting {}", self.mount_point.display());
        self.host.unmount(&self.mount_point).map_err(|e| {
            Error::Mount(format!("cannot unmount {}: {}", self.mount_point.display(), e))
        })
    }

    /// List the volume until the listing is stable.
    ///
    /// Freshly mounted volumes may report an incomplete listing at first.
    fn settle(&self) -> Result<()> {
        let count = || -> Result<usize> { Ok(fs::read_dir(&self.mount_point)?.count()) };
        let first = count()?;
        let second = count()?;
        if first != second {
            log::debug!(
                "listing of {} changed from {} to {} entries",
                self.mount_point.display(),
                first,
                second
            );
        }
        Ok(())
    }
}

impl Drop for MountSession<'_> {
    fn drop(&mut self) {
        if self.mounted {
            if let Err(e) = self.host.unmount(&self.mount_point) {
                log::error!("cannot unmount {}: {}", self.mount_point.display(), e);
            }
        }
    }
}
