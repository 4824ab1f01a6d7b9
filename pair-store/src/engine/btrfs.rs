use crate::engine::StorageEngine;
use crate::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

/// `Btrfs` drives the `btrfs` command line tool.
#[derive(Debug)]
pub struct Btrfs {
    pub program: PathBuf,
}

impl Default for Btrfs {
    fn default() -> Self {
        Btrfs {
            program: PathBuf::from("btrfs"),
        }
    }
}

impl Btrfs {
    /// Run `btrfs` with `args` and return its standard output.
    fn run(&self, args: &[&OsStr]) -> Result<String> {
        let operation = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        log::debug!("btrfs {}", operation);

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| Error::Storage {
                operation: operation.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Storage {
                operation,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl StorageEngine for Btrfs {
    fn snapshot(&self, source: &Path, destination: &Path) -> Result<()> {
        self.run(&[
            OsStr::new("subvolume"),
            OsStr::new("snapshot"),
            source.as_os_str(),
            destination.as_os_str(),
        ])?;
        Ok(())
    }

    fn create_subvolume(&self, path: &Path) -> Result<()> {
        self.run(&[OsStr::new("subvolume"), OsStr::new("create"), path.as_os_str()])?;
        Ok(())
    }

    fn delete_subvolume(&self, path: &Path) -> Result<()> {
        self.run(&[OsStr::new("subvolume"), OsStr::new("delete"), path.as_os_str()])?;
        Ok(())
    }

    fn subvolume_id(&self, path: &Path) -> Result<u64> {
        let output = self.run(&[
            OsStr::new("inspect-internal"),
            OsStr::new("rootid"),
            path.as_os_str(),
        ])?;

        parse_rootid(&output).ok_or_else(|| Error::Storage {
            operation: format!("inspect-internal rootid {}", path.display()),
            reason: format!("unexpected output {:?}", output.trim()),
        })
    }

    fn set_default(&self, id: u64, volume: &Path) -> Result<()> {
        let id = OsString::from(id.to_string());
        self.run(&[
            OsStr::new("subvolume"),
            OsStr::new("set-default"),
            id.as_os_str(),
            volume.as_os_str(),
        ])?;
        Ok(())
    }

    fn filesystem_uuid(&self, volume: &Path) -> Result<String> {
        let output = self.run(&[
            OsStr::new("filesystem"),
            OsStr::new("show"),
            volume.as_os_str(),
        ])?;

        parse_filesystem_uuid(&output).ok_or_else(|| Error::Storage {
            operation: format!("filesystem show {}", volume.display()),
            reason: "no uuid in output".to_string(),
        })
    }
}

/// Parse the output of `btrfs inspect-internal rootid`.
fn parse_rootid(output: &str) -> Option<u64> {
    output.trim().parse().ok()
}

/// Extract the UUID from the output of `btrfs filesystem show`.
///
/// The first line reads `Label: 'root'  uuid: 1f5a...`.
fn parse_filesystem_uuid(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once("uuid:")?;
        rest.split_whitespace().next().map(str::to_string)
    })
}
