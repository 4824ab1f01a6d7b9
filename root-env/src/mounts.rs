use crate::{Error, Host, Result};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

/// A host directory bound into a root.
#[derive(Clone, Debug)]
struct Mount {
    source: PathBuf,
    /// Destination, relative to the root.
    destination: PathBuf,
}

/// The list of bind mounts to set up inside a root before running something in it.
#[derive(Clone, Debug)]
pub struct Mounts {
    mounts: Vec<Mount>,
}

impl Mounts {
    /// A list without any mount.
    pub fn empty() -> Self {
        Mounts { mounts: vec![] }
    }

    /// Add a bind mount of `source` onto `destination` (relative to the root).
    pub fn bind(mut self, source: &Path, destination: &str) -> Self {
        self.mounts.push(Mount {
            source: source.to_path_buf(),
            destination: PathBuf::from(destination.trim_start_matches('/')),
        });
        self
    }

    /// Add the host kernel interfaces `/sys`, `/dev` and `/proc`.
    pub fn kernel(self) -> Self {
        self.bind(Path::new("/sys"), "sys")
            .bind(Path::new("/dev"), "dev")
            .bind(Path::new("/proc"), "proc")
    }

    /// Apply the mounts into `root`, in order.
    ///
    /// If one of them fails, the ones already applied are unwound before the error
    /// is returned. On success the returned guard keeps track of every bound target.
    pub fn apply<'h>(&self, host: &'h dyn Host, root: &Path) -> Result<Bound<'h>> {
        let mut bound = Bound {
            host,
            targets: Vec::with_capacity(self.mounts.len()),
        };

        for mount in &self.mounts {
            let target = root.join(&mount.destination);
            if !target.exists() {
                log::debug!("creating mount target {}", target.display());
                create_dir_all(&target).map_err(|source| Error::Mount {
                    target: target.clone(),
                    source,
                })?;
            }

            log::debug!(
                "binding {} on {}",
                mount.source.display(),
                target.display()
            );
            host.bind(&mount.source, &target)
                .map_err(|source| Error::Mount {
                    target: target.clone(),
                    source,
                })?;
            bound.targets.push(target);
        }

        Ok(bound)
    }
}

impl Default for Mounts {
    /// The host kernel interfaces, which every chrooted program expects.
    fn default() -> Self {
        Mounts::empty().kernel()
    }
}

/// Targets currently bound into a root.
///
/// Dropping the guard unbinds whatever is still bound, in reverse order.
pub struct Bound<'h> {
    host: &'h dyn Host,
    targets: Vec<PathBuf>,
}

impl Bound<'_> {
    /// Unbind every target in reverse order of mounting.
    ///
    /// Every target is attempted even if an earlier one fails; the first failure is returned.
    pub fn cleanup(mut self) -> Result<()> {
        self.unwind()
    }

    fn unwind(&mut self) -> Result<()> {
        let mut first_error = None;

        while let Some(target) = self.targets.pop() {
            log::debug!("unbinding {}", target.display());
            if let Err(source) = self.host.unmount(&target) {
                log::warn!("failed to unbind {}: {}", target.display(), source);
                first_error.get_or_insert(Error::Unmount { target, source });
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Bound<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.unwind() {
            log::error!("bind mounts left behind: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{Event, RecordingHost};
    use crate::Mounts;
    use std::path::Path;
    use tempdir::TempDir;

    #[test]
    fn test_mount_apply_and_cleanup() -> Result<(), std::io::Error> {
        let root = TempDir::new("root-env")?;
        let host = RecordingHost::default();

        let bound = Mounts::default().apply(&host, root.path()).unwrap();
        bound.cleanup().unwrap();

        let sys = root.path().join("sys");
        let dev = root.path().join("dev");
        let proc = root.path().join("proc");
        assert_eq!(
            host.events(),
            vec![
                Event::Bind(Path::new("/sys").to_path_buf(), sys.clone()),
                Event::Bind(Path::new("/dev").to_path_buf(), dev.clone()),
                Event::Bind(Path::new("/proc").to_path_buf(), proc.clone()),
                Event::Unmount(proc),
                Event::Unmount(dev),
                Event::Unmount(sys),
            ]
        );
        assert!(host.mounted().is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_bind_unwinds_previous_mounts() -> Result<(), std::io::Error> {
        let root = TempDir::new("root-env")?;
        let host = RecordingHost::default();
        host.fail_bind_on(&root.path().join("proc"));

        assert!(Mounts::default().apply(&host, root.path()).is_err());
        assert!(host.mounted().is_empty());
        Ok(())
    }

    #[test]
    fn test_dropping_the_guard_unbinds() -> Result<(), std::io::Error> {
        let root = TempDir::new("root-env")?;
        let host = RecordingHost::default();

        {
            let _bound = Mounts::empty()
                .bind(Path::new("/srv/home"), "/home")
                .apply(&host, root.path())
                .unwrap();
            assert_eq!(host.mounted(), vec![root.path().join("home")]);
        }

        assert!(host.mounted().is_empty());
        Ok(())
    }

    #[test]
    fn test_cleanup_keeps_going_after_a_failure() -> Result<(), std::io::Error> {
        let root = TempDir::new("root-env")?;
        let host = RecordingHost::default();
        host.fail_unmount_on(&root.path().join("dev"));

        let bound = Mounts::default().apply(&host, root.path()).unwrap();
        assert!(bound.cleanup().is_err());

        // Only the failing target is left behind.
        assert_eq!(host.mounted(), vec![root.path().join("dev")]);
        Ok(())
    }
}
