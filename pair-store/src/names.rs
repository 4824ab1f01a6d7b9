//! Naming of snapshot pairs and of the subvolumes they are made of.
//!
//! A pair named `foo` is stored as the two subvolumes `foo-@` (root) and
//! `foo-@home` (home). The live system is the unnamed pair `@` / `@home`.

use crate::{Error, Result};
use std::fmt;

/// Subvolume name of the live root.
pub const LIVE_ROOT: &str = "@";
/// Subvolume name of the live home.
pub const LIVE_HOME: &str = "@home";
/// Suffix of the root half of a named pair.
pub const ROOT_SUFFIX: &str = "-@";
/// Suffix of the home half of a named pair.
pub const HOME_SUFFIX: &str = "-@home";
/// The factory pair, which can never be deleted.
pub const FACTORY: &str = "factory";
/// Prefix of the pairs saved automatically by a restore.
pub const BACKUP_PREFIX: &str = "saved-";

/// One of the two halves of a pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Half {
    Root,
    Home,
}

impl Half {
    pub const BOTH: [Half; 2] = [Half::Root, Half::Home];
}

/// A snapshot pair identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pair {
    /// The pair currently booted, `@` / `@home`.
    Live,
    Named(String),
}

impl Pair {
    /// Interpret an operator supplied name. `@` and the empty name designate the live system.
    ///
    /// Names that would resolve outside the top of the volume, such as
    /// `../foo` or `./factory`, are rejected.
    pub fn parse(name: &str) -> Result<Pair> {
        let reason = if name == "." || name == ".." {
            "the name is a relative directory"
        } else if name.contains('/') {
            "the name contains a '/'"
        } else {
            return Ok(match name {
                "" | LIVE_ROOT => Pair::Live,
                name => Pair::Named(name.to_string()),
            });
        };
        Err(Error::InvalidName {
            name: name.to_string(),
            reason,
        })
    }

    /// Whether this is the reserved `factory` pair.
    pub fn is_factory(&self) -> bool {
        matches!(self, Pair::Named(name) if name == FACTORY)
    }

    /// A pair that is about to be created under `name`.
    ///
    /// Unlike [`Pair::parse`], the name must be valid for a new pair.
    pub fn new_named(name: &str) -> Result<Pair> {
        validate_name(name)?;
        Ok(Pair::Named(name.to_string()))
    }

    /// The backup pair a restore at `timestamp` saves the live system to.
    pub fn backup(timestamp: u64) -> Pair {
        Pair::Named(format!("{}{}", BACKUP_PREFIX, timestamp))
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Pair::Live)
    }

    /// The timestamp of a backup pair, `None` for any other pair.
    pub fn backup_timestamp(&self) -> Option<u64> {
        match self {
            Pair::Named(name) => name.strip_prefix(BACKUP_PREFIX)?.parse().ok(),
            Pair::Live => None,
        }
    }

    pub fn half(&self, half: Half) -> PairRef<'_> {
        PairRef { pair: self, half }
    }

    pub fn root(&self) -> PairRef<'_> {
        self.half(Half::Root)
    }

    pub fn home(&self) -> PairRef<'_> {
        self.half(Half::Home)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pair::Live => f.write_str(LIVE_ROOT),
            Pair::Named(name) => f.write_str(name),
        }
    }
}

/// One half of a pair, which is one subvolume on the backing volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairRef<'a> {
    pub pair: &'a Pair,
    pub half: Half,
}

impl PairRef<'_> {
    /// The subvolume name, relative to the top of the backing volume.
    pub fn subvolume(&self) -> String {
        match (self.pair, self.half) {
            (Pair::Live, Half::Root) => LIVE_ROOT.to_string(),
            (Pair::Live, Half::Home) => LIVE_HOME.to_string(),
            (Pair::Named(name), Half::Root) => format!("{}{}", name, ROOT_SUFFIX),
            (Pair::Named(name), Half::Home) => format!("{}{}", name, HOME_SUFFIX),
        }
    }
}

impl fmt::Display for PairRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subvolume())
    }
}

/// Check that `name` can be used for a new pair.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("the name is empty")
    } else if name == "." || name == ".." {
        Some("the name is a relative directory")
    } else if name.contains('/') {
        Some("the name contains a '/'")
    } else if name.chars().any(char::is_whitespace) {
        Some("the name contains whitespace")
    } else if name.ends_with('@') || name.ends_with(HOME_SUFFIX) {
        Some("the name ends like a subvolume")
    } else if name.starts_with(BACKUP_PREFIX) {
        Some("the name uses the prefix reserved for automatic backups")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subvolume_names() -> Result<()> {
        let foo = Pair::parse("foo")?;
        assert_eq!(foo.root().subvolume(), "foo-@");
        assert_eq!(foo.home().subvolume(), "foo-@home");
        assert_eq!(Pair::Live.root().subvolume(), "@");
        assert_eq!(Pair::Live.home().subvolume(), "@home");
        Ok(())
    }

    #[test]
    fn test_live_system_aliases() -> Result<()> {
        assert!(Pair::parse("@")?.is_live());
        assert!(Pair::parse("")?.is_live());
        assert!(!Pair::parse("factory")?.is_live());
        assert!(Pair::parse("factory")?.is_factory());
        Ok(())
    }

    #[test]
    fn test_parse_rejects_paths() {
        for invalid in [".", "..", "./factory", "../x", "a/b", "/abs"] {
            assert!(
                matches!(Pair::parse(invalid), Err(Error::InvalidName { .. })),
                "{:?} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn test_backup_timestamp() -> Result<()> {
        assert_eq!(Pair::backup(1700000000).to_string(), "saved-1700000000");
        assert_eq!(Pair::backup(42).backup_timestamp(), Some(42));
        assert_eq!(Pair::parse("saved-later")?.backup_timestamp(), None);
        assert_eq!(Pair::parse("foo")?.backup_timestamp(), None);
        Ok(())
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("foo").is_ok());
        assert!(validate_name("v1.0.6-beta").is_ok());

        for invalid in ["", ".", "..", "a/b", "a b", "foo@", "foo-@home", "saved-12"] {
            assert!(
                matches!(validate_name(invalid), Err(Error::InvalidName { .. })),
                "{:?} should be rejected",
                invalid
            );
        }
    }
}
