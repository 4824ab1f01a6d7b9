//! Test doubles: a storage engine backed by plain directories.

use crate::engine::StorageEngine;
use crate::names::{Half, Pair};
use crate::registry::{FACTORY_SENTINEL, OS_RELEASE};
use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File of the volume where `DirEngine` records the default subvolume id.
pub const DEFAULT_ID_FILE: &str = ".default-subvolume";

/// A `StorageEngine` where a subvolume is a directory and a snapshot a recursive copy.
pub struct DirEngine {
    uuid: String,
    ids: RefCell<HashMap<PathBuf, u64>>,
    failure: RefCell<Option<(&'static str, String)>>,
}

impl DirEngine {
    pub fn new(uuid: &str) -> Self {
        DirEngine {
            uuid: uuid.to_string(),
            ids: RefCell::new(HashMap::new()),
            failure: RefCell::new(None),
        }
    }

    /// Make `operation` fail when applied to a path whose file name is `subvolume`.
    pub fn fail_on(&self, operation: &'static str, subvolume: &str) {
        *self.failure.borrow_mut() = Some((operation, subvolume.to_string()));
    }

    fn check(&self, operation: &'static str, path: &Path) -> Result<()> {
        if let Some((op, name)) = self.failure.borrow().as_ref() {
            if *op == operation && path.file_name().map_or(false, |f| f == name.as_str()) {
                return Err(Error::Storage {
                    operation: format!("{} {}", operation, path.display()),
                    reason: "injected failure".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl StorageEngine for DirEngine {
    fn snapshot(&self, source: &Path, destination: &Path) -> Result<()> {
        self.check("snapshot", destination)?;
        if destination.exists() {
            return Err(Error::AlreadyExists(destination.display().to_string()));
        }
        copy_dir(source, destination)?;
        Ok(())
    }

    fn create_subvolume(&self, path: &Path) -> Result<()> {
        self.check("create", path)?;
        fs::create_dir(path)?;
        Ok(())
    }

    fn delete_subvolume(&self, path: &Path) -> Result<()> {
        self.check("delete", path)?;
        fs::remove_dir_all(path)?;
        Ok(())
    }

    fn rename(&self, source: &Path, destination: &Path) -> Result<()> {
        self.check("rename", source)?;
        fs::rename(source, destination)?;
        Ok(())
    }

    fn subvolume_id(&self, path: &Path) -> Result<u64> {
        let mut ids = self.ids.borrow_mut();
        let next = 256 + ids.len() as u64;
        Ok(*ids.entry(path.to_path_buf()).or_insert(next))
    }

    fn set_default(&self, id: u64, volume: &Path) -> Result<()> {
        fs::write(volume.join(DEFAULT_ID_FILE), id.to_string())?;
        Ok(())
    }

    fn filesystem_uuid(&self, _volume: &Path) -> Result<String> {
        Ok(self.uuid.clone())
    }
}

fn copy_dir(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::create_dir(destination)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            std::os::unix::fs::symlink(fs::read_link(entry.path())?, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Create both halves of `pair` under `volume`, with an os-release reporting
/// `version` and, when `initialized`, the factory sentinel.
pub fn make_pair(volume: &Path, pair: &Pair, version: &str, initialized: bool) -> Result<()> {
    let root = volume.join(pair.half(Half::Root).subvolume());
    let home = volume.join(pair.half(Half::Home).subvolume());

    fs::create_dir_all(root.join("etc"))?;
    fs::create_dir_all(&home)?;
    fs::write(
        root.join(OS_RELEASE),
        format!("NAME=\"Test\"\nVERSION_ID=\"{}\"\n", version),
    )?;
    if initialized {
        fs::write(home.join(FACTORY_SENTINEL), "")?;
    }
    Ok(())
}
