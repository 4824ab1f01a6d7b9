use crate::names::{Half, Pair, HOME_SUFFIX, ROOT_SUFFIX};
use crate::{Error, Result};
use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};

/// Release metadata file, relative to a root half.
pub const OS_RELEASE: &str = "etc/os-release";
/// Marker file, relative to a home half, written once the system has been set up.
pub const FACTORY_SENTINEL: &str = ".btrsnap-initialized";
/// Reported when the version of a pair cannot be determined.
pub const UNKNOWN_VERSION: &str = "???";

/// The `Registry` answers questions about the pairs present on the volume.
///
/// It never mutates anything: the subvolume tree is the only state there is.
#[derive(Clone, Copy, Debug)]
pub struct Registry<'a> {
    volume: &'a Path,
}

impl<'a> Registry<'a> {
    pub fn new(volume: &'a Path) -> Self {
        Self { volume }
    }

    /// Path of one half of `pair`.
    pub fn path(&self, pair: &Pair, half: Half) -> PathBuf {
        self.volume.join(pair.half(half).subvolume())
    }

    /// Every named pair with both halves present, in directory order.
    ///
    /// The sequence is lazy; call `list` again to start over.
    pub fn list(&self) -> Result<Names<'a>> {
        Ok(Names {
            volume: self.volume,
            entries: fs::read_dir(self.volume)?,
        })
    }

    pub fn half_exists(&self, pair: &Pair, half: Half) -> bool {
        self.path(pair, half).is_dir()
    }

    /// A pair exists when both of its halves do.
    pub fn exists(&self, pair: &Pair) -> bool {
        Half::BOTH.iter().all(|half| self.half_exists(pair, *half))
    }

    /// Fail with `NotFound` unless both halves of `pair` exist.
    pub fn assert_exists(&self, pair: &Pair) -> Result<()> {
        for half in Half::BOTH {
            if !self.half_exists(pair, half) {
                return Err(Error::NotFound(pair.half(half).subvolume()));
            }
        }
        Ok(())
    }

    /// Fail with `AlreadyExists` if either half of `pair` exists.
    pub fn assert_absent(&self, pair: &Pair) -> Result<()> {
        for half in Half::BOTH {
            if self.path(pair, half).exists() {
                return Err(Error::AlreadyExists(pair.half(half).subvolume()));
            }
        }
        Ok(())
    }

    /// The `VERSION_ID` of the system in the root half of `pair`, or `???`.
    pub fn os_version_of(&self, pair: &Pair) -> String {
        let release = self.path(pair, Half::Root).join(OS_RELEASE);
        fs::read_to_string(&release)
            .ok()
            .and_then(|content| parse_version_id(&content))
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
    }

    /// A pair is factory-like until its home half has been marked as set up.
    pub fn is_factory_like(&self, pair: &Pair) -> bool {
        !self
            .path(pair, Half::Home)
            .join(FACTORY_SENTINEL)
            .exists()
    }
}

/// Iterator over the names of the complete pairs of a volume.
pub struct Names<'a> {
    volume: &'a Path,
    entries: ReadDir,
}

impl Iterator for Names<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for entry in self.entries.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("skipping unreadable entry in {}: {}", self.volume.display(), e);
                    continue;
                }
            };

            let file_name = entry.file_name();
            let base = match file_name.to_str().and_then(|n| n.strip_suffix(ROOT_SUFFIX)) {
                Some(base) if !base.is_empty() => base,
                _ => continue,
            };

            let home = self.volume.join(format!("{}{}", base, HOME_SUFFIX));
            if entry.path().is_dir() && home.is_dir() {
                return Some(base.to_string());
            }
        }
        None
    }
}

/// Read the `VERSION_ID` key of an os-release file.
fn parse_version_id(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("VERSION_ID=")?;
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_pair;
    use std::fs::create_dir_all;
    use tempdir::TempDir;

    #[test]
    fn test_list_only_complete_pairs() -> Result<()> {
        let volume = TempDir::new("pair-store")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "1.0", true)?;
        make_pair(volume.path(), &Pair::parse("bar")?, "1.1", false)?;
        make_pair(volume.path(), &Pair::Live, "1.2", true)?;
        // A partial pair and an unrelated directory.
        create_dir_all(volume.path().join("half-@"))?;
        create_dir_all(volume.path().join("lost+found"))?;

        let registry = Registry::new(volume.path());
        let mut names = registry.list()?.collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["bar", "foo"]);

        // Listing again starts over.
        assert_eq!(registry.list()?.count(), 2);
        Ok(())
    }

    #[test]
    fn test_assertions_check_each_half() -> Result<()> {
        let volume = TempDir::new("pair-store")?;
        create_dir_all(volume.path().join("half-@"))?;
        let registry = Registry::new(volume.path());
        let half = Pair::parse("half")?;

        assert!(!registry.exists(&half));
        assert!(matches!(
            registry.assert_exists(&half),
            Err(Error::NotFound(name)) if name == "half-@home"
        ));
        assert!(matches!(
            registry.assert_absent(&half),
            Err(Error::AlreadyExists(name)) if name == "half-@"
        ));
        assert!(registry.assert_absent(&Pair::parse("other")?).is_ok());
        Ok(())
    }

    #[test]
    fn test_os_version_and_factory_marker() -> Result<()> {
        let volume = TempDir::new("pair-store")?;
        make_pair(volume.path(), &Pair::parse("foo")?, "1.0.6.10", false)?;
        let registry = Registry::new(volume.path());

        assert_eq!(registry.os_version_of(&Pair::parse("foo")?), "1.0.6.10");
        assert!(registry.is_factory_like(&Pair::parse("foo")?));
        assert_eq!(registry.os_version_of(&Pair::parse("missing")?), UNKNOWN_VERSION);

        fs::write(
            registry.path(&Pair::parse("foo")?, Half::Home).join(FACTORY_SENTINEL),
            "",
        )?;
        assert!(!registry.is_factory_like(&Pair::parse("foo")?));
        Ok(())
    }

    #[test]
    fn test_parse_version_id() {
        let release = "NAME=\"Lux\"\nVERSION=\"1.0 (Beta)\"\nVERSION_ID=\"1.0.6\"\nID=lux\n";
        assert_eq!(parse_version_id(release).as_deref(), Some("1.0.6"));
        assert_eq!(parse_version_id("VERSION_ID=12\n").as_deref(), Some("12"));
        assert_eq!(parse_version_id("NAME=Lux\n"), None);
        assert_eq!(parse_version_id("VERSION_ID=\"\"\n"), None);
    }
}
