//! Promotion of a snapshot pair to the live system.
//!
//! A restore walks `Idle -> BackingUp -> Promoting -> RepairingBoot -> Idle`.
//! A failure in any step moves the engine to `Failed` and is returned as
//! [`Error::Fatal`]: nothing is rolled back, the operator gets the stage the
//! volume was left in.

use crate::names::{Half, Pair};
use crate::{Error, Result, Store};
use root_env::{run_hooks, HookOutcome, Host};
use std::fmt;
use std::fs;
use std::path::Path;

/// Boot mount table, relative to a root half.
pub const BOOT_TABLE: &str = "etc/fstab";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchState {
    Idle,
    BackingUp,
    Promoting,
    RepairingBoot,
    Failed,
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchState::Idle => write!(f, "idle"),
            SwitchState::BackingUp => write!(f, "backing up the live system"),
            SwitchState::Promoting => write!(f, "promoting the target pair"),
            SwitchState::RepairingBoot => write!(f, "repairing the boot configuration"),
            SwitchState::Failed => write!(f, "failed"),
        }
    }
}

/// What a successful restore did.
#[derive(Debug)]
pub struct SwitchReport {
    /// Name of the pair the previous live system was saved to.
    pub backup: String,
    /// Subvolume id now booted by default.
    pub default_subvolume: u64,
    /// Whether the boot table of the new root had to be rewritten.
    pub uuid_rewritten: bool,
    pub hooks: Vec<HookOutcome>,
}

pub struct SwitchOver<'a> {
    store: &'a Store,
    host: &'a dyn Host,
    hooks_dir: &'a Path,
    state: SwitchState,
}

impl<'a> SwitchOver<'a> {
    pub fn new(store: &'a Store, host: &'a dyn Host, hooks_dir: &'a Path) -> Self {
        Self {
            store,
            host,
            hooks_dir,
            state: SwitchState::Idle,
        }
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    /// Make `target` the live system, saving the current one as `saved-<timestamp>`.
    pub fn restore(&mut self, target: &str, timestamp: u64) -> Result<SwitchReport> {
        let store = self.store;
        let registry = store.registry();

        let target = Pair::parse(target)?;
        if target.is_live() {
            return Err(Error::InvalidName {
                name: target.to_string(),
                reason: "the live system cannot be restored onto itself",
            });
        }
        registry.assert_exists(&target)?;
        registry.assert_exists(&Pair::Live)?;

        // Two restores within the same second would collide: refuse before touching anything.
        let backup = Pair::backup(timestamp);
        registry.assert_absent(&backup)?;

        self.transition(SwitchState::BackingUp);
        for half in Half::BOTH {
            let result = store
                .engine()
                .rename(&registry.path(&Pair::Live, half), &registry.path(&backup, half));
            self.check(result)?;
        }

        self.transition(SwitchState::Promoting);
        for half in Half::BOTH {
            let result = store
                .engine()
                .snapshot(&registry.path(&target, half), &registry.path(&Pair::Live, half));
            self.check(result)?;
        }

        self.transition(SwitchState::RepairingBoot);
        if !registry.exists(&Pair::Live) {
            return Err(self.fail("the live pair is missing after promotion".to_string()));
        }

        let live_root = registry.path(&Pair::Live, Half::Root);
        let id = self.check(store.engine().subvolume_id(&live_root))?;
        self.check(store.engine().set_default(id, store.volume()))?;
        log::info!("subvolume {} is now booted by default", id);

        let hooks = match run_hooks(self.host, &live_root, self.hooks_dir) {
            Ok(hooks) => hooks,
            Err(e) => {
                log::warn!("boot hooks could not run: {}", e);
                vec![]
            }
        };

        let uuid = self.check(store.engine().filesystem_uuid(store.volume()))?;
        let uuid_rewritten = self.check(repair_boot_table(&live_root, &uuid))?;

        self.transition(SwitchState::Idle);
        Ok(SwitchReport {
            backup: backup.to_string(),
            default_subvolume: id,
            uuid_rewritten,
            hooks,
        })
    }

    fn transition(&mut self, next: SwitchState) {
        log::info!("restore: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Turn the failure of a step into a fatal error, recording the stage.
    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.fail(e.to_string()))
    }

    fn fail(&mut self, reason: String) -> Error {
        let stage = self.state;
        log::error!("restore failed while {}: {}", stage, reason);
        self.state = SwitchState::Failed;
        Error::Fatal { stage, reason }
    }
}

impl Store {
    /// Make the pair `target` the live system.
    pub fn restore(&self, host: &dyn Host, target: &str, hooks_dir: &Path) -> Result<SwitchReport> {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        SwitchOver::new(self, host, hooks_dir).restore(target, timestamp)
    }
}

/// Point the boot table of `root` at the filesystem `uuid`.
///
/// Returns whether the file was rewritten.
fn repair_boot_table(root: &Path, uuid: &str) -> Result<bool> {
    let table = root.join(BOOT_TABLE);
    let content = match fs::read_to_string(&table) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("no boot table at {}", table.display());
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    let old = match root_uuid(&content) {
        Some(old) => old,
        None => {
            log::warn!("{} does not mount anything by UUID", table.display());
            return Ok(false);
        }
    };
    if old.eq_ignore_ascii_case(uuid) {
        log::debug!("boot table already uses UUID {}", uuid);
        return Ok(false);
    }

    log::info!("replacing UUID {} with {} in {}", old, uuid, table.display());
    fs::write(&table, content.replace(old, uuid))?;
    Ok(true)
}

/// The UUID the boot table mounts `/` from, or else the first UUID it mentions.
fn root_uuid(content: &str) -> Option<&str> {
    let uuids = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let uuid = fields.next()?.strip_prefix("UUID=")?;
            let uuid = uuid.trim_matches('"');
            Some((uuid, fields.next()))
        })
        .filter(|(uuid, _)| !uuid.is_empty())
        .collect::<Vec<_>>();

    uuids
        .iter()
        .find(|(_, mount_point)| *mount_point == Some("/"))
        .or_else(|| uuids.first())
        .map(|(uuid, _)| *uuid)
}
