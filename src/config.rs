use crate::cli::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Where installed configuration fragments are read from.
pub const CONFIG_DIR: &str = "/etc/btrsnap/conf.d";
/// Directory of restore hooks, relative to the promoted root.
pub const DEFAULT_HOOKS_DIR: &str = "usr/lib/btrsnap/restore.d";
pub const DEFAULT_SHELL: &str = "/bin/bash";
pub const DEFAULT_PURGE_KEEP: usize = 1;

/// One configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Fragment {
    pub partition: Option<PathBuf>,
    pub mount_point: Option<PathBuf>,
    pub hooks_dir: Option<PathBuf>,
    pub shell: Option<String>,
    pub purge_keep: Option<usize>,
}

impl Fragment {
    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: Fragment) -> Fragment {
        Fragment {
            partition: other.partition.or(self.partition),
            mount_point: other.mount_point.or(self.mount_point),
            hooks_dir: other.hooks_dir.or(self.hooks_dir),
            shell: other.shell.or(self.shell),
            purge_keep: other.purge_keep.or(self.purge_keep),
        }
    }
}

/// Settings of a run, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Device holding the btrfs volume.
    pub partition: PathBuf,
    /// Where the top level of the volume gets mounted.
    pub mount_point: PathBuf,
    pub hooks_dir: PathBuf,
    pub shell: String,
    pub purge_keep: usize,
}

impl Config {
    /// Read every `*.toml` fragment of `dir` in file name order, then apply `overrides`.
    ///
    /// A missing directory is the same as an empty one.
    pub fn load(dir: &Path, overrides: Fragment) -> Result<Config> {
        let mut fragment = Fragment::default();
        for path in fragments(dir)? {
            log::debug!("reading configuration from {}", path.display());
            let content = fs::read_to_string(&path)?;
            let parsed = toml::from_str(&content).map_err(|e| Error::Config {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            fragment = fragment.merge(parsed);
        }
        Config::resolve(fragment.merge(overrides))
    }

    fn resolve(fragment: Fragment) -> Result<Config> {
        Ok(Config {
            partition: fragment
                .partition
                .ok_or(Error::ConfigIncomplete("partition"))?,
            mount_point: fragment
                .mount_point
                .ok_or(Error::ConfigIncomplete("mount-point"))?,
            hooks_dir: fragment
                .hooks_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HOOKS_DIR)),
            shell: fragment.shell.unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            purge_keep: fragment.purge_keep.unwrap_or(DEFAULT_PURGE_KEEP),
        })
    }
}

fn fragments(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut paths = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "toml"))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_later_fragments_win() -> Result<()> {
        let dir = TempDir::new("btrsnap-config")?;
        fs::write(
            dir.path().join("10-base.toml"),
            "partition = \"/dev/sda2\"\nmount-point = \"/mnt/btrsnap\"\nshell = \"/bin/sh\"\n",
        )?;
        fs::write(dir.path().join("20-local.toml"), "partition = \"/dev/nvme0n1p3\"\n")?;
        fs::write(dir.path().join("README"), "not a fragment")?;

        let config = Config::load(dir.path(), Fragment::default())?;

        assert_eq!(
            config,
            Config {
                partition: PathBuf::from("/dev/nvme0n1p3"),
                mount_point: PathBuf::from("/mnt/btrsnap"),
                hooks_dir: PathBuf::from(DEFAULT_HOOKS_DIR),
                shell: "/bin/sh".to_string(),
                purge_keep: DEFAULT_PURGE_KEEP,
            }
        );
        Ok(())
    }

    #[test]
    fn test_overrides_win_over_fragments() -> Result<()> {
        let dir = TempDir::new("btrsnap-config")?;
        fs::write(
            dir.path().join("base.toml"),
            "partition = \"/dev/sda2\"\nmount-point = \"/mnt/btrsnap\"\n",
        )?;
        let overrides = Fragment {
            mount_point: Some(PathBuf::from("/tmp/volume")),
            ..Fragment::default()
        };

        let config = Config::load(dir.path(), overrides)?;

        assert_eq!(config.partition, PathBuf::from("/dev/sda2"));
        assert_eq!(config.mount_point, PathBuf::from("/tmp/volume"));
        Ok(())
    }

    #[test]
    fn test_missing_settings() -> Result<()> {
        let dir = TempDir::new("btrsnap-config")?;

        assert!(matches!(
            Config::load(&dir.path().join("absent"), Fragment::default()),
            Err(Error::ConfigIncomplete("partition"))
        ));
        let overrides = Fragment {
            partition: Some(PathBuf::from("/dev/sda2")),
            ..Fragment::default()
        };
        assert!(matches!(
            Config::load(dir.path(), overrides),
            Err(Error::ConfigIncomplete("mount-point"))
        ));
        Ok(())
    }

    #[test]
    fn test_keys_are_kebab_case() -> Result<()> {
        let dir = TempDir::new("btrsnap-config")?;
        fs::write(
            dir.path().join("base.toml"),
            "partition = \"/dev/sda2\"\nmount-point = \"/mnt\"\n\
             hooks-dir = \"etc/hooks\"\npurge-keep = 3\n",
        )?;

        let config = Config::load(dir.path(), Fragment::default())?;

        assert_eq!(config.hooks_dir, PathBuf::from("etc/hooks"));
        assert_eq!(config.purge_keep, 3);
        Ok(())
    }

    #[test]
    fn test_unknown_keys_are_rejected() -> Result<()> {
        let dir = TempDir::new("btrsnap-config")?;
        fs::write(dir.path().join("typo.toml"), "partiton = \"/dev/sda2\"\n")?;

        assert!(matches!(
            Config::load(dir.path(), Fragment::default()),
            Err(Error::Config { .. })
        ));
        Ok(())
    }
}
