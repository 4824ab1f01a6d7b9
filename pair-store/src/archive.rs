//! Conversion between snapshot pairs and pairs of portable archives.
//!
//! A pair is exported as `rootfs-<name>-<version>.tar.gz` and
//! `homefs-<name>-<version>.tar.gz`. Ownership is kept as numeric ids.

use crate::names::{Half, Pair};
use crate::{Error, Result, Store};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// File name of the archive of one half of a pair.
pub fn archive_name(name: &str, version: &str, half: Half) -> String {
    let prefix = match half {
        Half::Root => "rootfs",
        Half::Home => "homefs",
    };
    format!("{}-{}-{}.{}", prefix, name, version, ARCHIVE_EXTENSION)
}

impl Store {
    /// Create the pair `name` from a root and a home archive.
    pub fn inject(&self, rootfs: &Path, homefs: &Path, name: &str) -> Result<()> {
        for archive in [rootfs, homefs] {
            if !archive.is_file() {
                return Err(Error::NotFound(archive.display().to_string()));
            }
        }
        let pair = Pair::new_named(name)?;
        let registry = self.registry();
        registry.assert_absent(&pair)?;

        for (archive, half) in [(rootfs, Half::Root), (homefs, Half::Home)] {
            let destination = registry.path(&pair, half);
            log::info!(
                "extracting {} into {}",
                archive.display(),
                destination.display()
            );

            let result = self
                .engine()
                .create_subvolume(&destination)
                .and_then(|_| unpack(archive, &destination));
            match (result, half) {
                (Ok(()), _) => {}
                (Err(e), Half::Home) => {
                    return Err(Error::PartialPair {
                        action: "injected",
                        done: pair.root().subvolume(),
                        failed: pair.home().subvolume(),
                        reason: e.to_string(),
                    })
                }
                (Err(e), Half::Root) if destination.exists() => {
                    return Err(Error::Incomplete {
                        subvolume: pair.root().subvolume(),
                        reason: e.to_string(),
                    })
                }
                (Err(e), Half::Root) => return Err(e),
            }
        }
        Ok(())
    }

    /// Write both halves of `name` as archives into `out_dir`.
    ///
    /// Returns the paths of the root and home archives.
    pub fn export(&self, name: &str, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let pair = Pair::parse(name)?;
        let registry = self.registry();
        registry.assert_exists(&pair)?;
        if !out_dir.is_dir() {
            return Err(Error::NotFound(out_dir.display().to_string()));
        }

        let version = registry.os_version_of(&pair);
        let name = pair.to_string();
        let rootfs = out_dir.join(archive_name(&name, &version, Half::Root));
        let homefs = out_dir.join(archive_name(&name, &version, Half::Home));
        for archive in [&rootfs, &homefs] {
            if archive.exists() {
                return Err(Error::AlreadyExists(archive.display().to_string()));
            }
        }

        for (archive, half) in [(&rootfs, Half::Root), (&homefs, Half::Home)] {
            let source = registry.path(&pair, half);
            log::info!("archiving {} into {}", source.display(), archive.display());
            pack(&source, archive)?;
        }
        Ok((rootfs, homefs))
    }
}

/// Extract the compressed tarball `archive` into `destination`.
fn unpack(archive: &Path, destination: &Path) -> Result<()> {
    let to_error = |e: std::io::Error| Error::Archive {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    };

    let file = File::open(archive).map_err(to_error)?;
    let mut tarball = Archive::new(GzDecoder::new(file));
    tarball.set_preserve_permissions(true);
    tarball.set_preserve_ownerships(true);
    tarball.set_unpack_xattrs(true);
    tarball.set_overwrite(true);
    tarball.unpack(destination).map_err(to_error)
}

/// Stream the directory `source` into a new compressed tarball at `archive`.
fn pack(source: &Path, archive: &Path) -> Result<()> {
    let to_error = |e: std::io::Error| Error::Archive {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    };

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(archive)
        .map_err(to_error)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder.append_dir_all(".", source).map_err(to_error)?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(to_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_pair, DirEngine};
    use std::fs;
    use tempdir::TempDir;

    fn store(volume: &TempDir) -> Store {
        Store::new(volume.path(), Box::new(DirEngine::new("uuid")))
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(
            archive_name("foo", "1.0.6.10", Half::Root),
            "rootfs-foo-1.0.6.10.tar.gz"
        );
        assert_eq!(
            archive_name("foo", "1.0.6.10", Half::Home),
            "homefs-foo-1.0.6.10.tar.gz"
        );
    }

    #[test]
    fn test_export_names_files_after_the_version_and_refuses_to_overwrite() -> Result<()> {
        let volume = TempDir::new("pair-store-archive")?;
        let out = TempDir::new("pair-store-out")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "1.0.6.10", true)?;
        let store = store(&volume);

        let (rootfs, homefs) = store.export("foo", out.path())?;

        assert_eq!(rootfs, out.path().join("rootfs-foo-1.0.6.10.tar.gz"));
        assert_eq!(homefs, out.path().join("homefs-foo-1.0.6.10.tar.gz"));
        assert!(rootfs.is_file() && homefs.is_file());
        assert!(matches!(
            store.export("foo", out.path()),
            Err(Error::AlreadyExists(_))
        ));
        Ok(())
    }

    #[test]
    fn test_exported_pair_can_be_injected_back() -> Result<()> {
        let volume = TempDir::new("pair-store-archive")?;
        let out = TempDir::new("pair-store-out")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "3.1", true)?;
        fs::create_dir_all(volume.path().join("foo-@home/user"))?;
        fs::write(volume.path().join("foo-@home/user/notes.txt"), "hello")?;
        let store = store(&volume);

        let (rootfs, homefs) = store.export("foo", out.path())?;
        store.inject(&rootfs, &homefs, "copy")?;

        let registry = store.registry();
        assert!(registry.exists(&Pair::parse("copy")?));
        assert_eq!(registry.os_version_of(&Pair::parse("copy")?), "3.1");
        assert!(!registry.is_factory_like(&Pair::parse("copy")?));
        assert_eq!(
            fs::read_to_string(volume.path().join("copy-@home/user/notes.txt"))?,
            "hello"
        );
        Ok(())
    }

    #[test]
    fn test_inject_preconditions() -> Result<()> {
        let volume = TempDir::new("pair-store-archive")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "1.0", true)?;
        let archive = volume.path().join("rootfs.tar.gz");
        fs::write(&archive, "")?;
        let store = store(&volume);

        assert!(matches!(
            store.inject(&archive, &volume.path().join("missing.tar.gz"), "bar"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.inject(&archive, &archive, "foo"),
            Err(Error::AlreadyExists(_))
        ));
        assert!(!volume.path().join("bar-@").exists());
        Ok(())
    }

    #[test]
    fn test_failed_root_extraction_names_the_leftover_half() -> Result<()> {
        let volume = TempDir::new("pair-store-archive")?;
        let out = TempDir::new("pair-store-out")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "1.0", true)?;
        let store = store(&volume);
        let (_, homefs) = store.export("foo", out.path())?;
        let garbage = out.path().join("garbage.tar.gz");
        fs::write(&garbage, "this is not gzip data")?;

        let result = store.inject(&garbage, &homefs, "bar");

        assert!(matches!(
            result,
            Err(Error::Incomplete { ref subvolume, .. }) if subvolume == "bar-@"
        ));
        assert!(volume.path().join("bar-@").is_dir());
        assert!(!volume.path().join("bar-@home").exists());
        Ok(())
    }

    #[test]
    fn test_failed_home_extraction_is_a_partial_pair() -> Result<()> {
        let volume = TempDir::new("pair-store-archive")?;
        let out = TempDir::new("pair-store-out")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "1.0", true)?;
        let store = store(&volume);
        let (rootfs, _) = store.export("foo", out.path())?;
        let garbage = out.path().join("garbage.tar.gz");
        fs::write(&garbage, "this is not gzip data")?;

        assert!(matches!(
            store.inject(&rootfs, &garbage, "bar"),
            Err(Error::PartialPair { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_export_missing_pair_or_directory() -> Result<()> {
        let volume = TempDir::new("pair-store-archive")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "1.0", true)?;
        let store = store(&volume);

        assert!(matches!(
            store.export("ghost", volume.path()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.export("foo", &volume.path().join("nowhere")),
            Err(Error::NotFound(_))
        ));
        Ok(())
    }
}
