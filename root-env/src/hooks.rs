use crate::{Command, Host, Mounts, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// How a single hook ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookStatus {
    Succeeded,
    /// Exited with a non-zero code.
    Failed(i32),
    /// Killed by a signal.
    Killed,
    /// Could not be started at all.
    NotStarted(String),
}

/// The result of one hook run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookOutcome {
    /// Path of the hook, as seen from inside the root.
    pub script: PathBuf,
    pub status: HookStatus,
}

impl HookOutcome {
    pub fn is_success(&self) -> bool {
        self.status == HookStatus::Succeeded
    }
}

/// Run every hook found in `hooks_dir` (relative to `root`) inside `root`.
///
/// Hooks run in file name order with `/sys`, `/dev` and `/proc` bound into the
/// root. A failing hook is logged and does not stop the others: callers get one
/// outcome per hook and decide what to make of them. Only mount failures are
/// returned as errors.
pub fn run_hooks(host: &dyn Host, root: &Path, hooks_dir: &Path) -> Result<Vec<HookOutcome>> {
    let relative = hooks_dir.strip_prefix("/").unwrap_or(hooks_dir);
    let scripts = list_hooks(&root.join(relative));
    if scripts.is_empty() {
        log::debug!("no hook to run in {}", root.join(relative).display());
        return Ok(vec![]);
    }

    let bound = Mounts::default().apply(host, root)?;

    let outcomes = scripts
        .into_iter()
        .map(|name| {
            let script = Path::new("/").join(relative).join(name);
            log::info!("running hook {}", script.display());

            let status = match host.run_chrooted(root, &Command::new(script.as_os_str())) {
                Ok(status) if status.success() => HookStatus::Succeeded,
                Ok(status) => status
                    .code()
                    .map_or(HookStatus::Killed, HookStatus::Failed),
                Err(e) => HookStatus::NotStarted(e.to_string()),
            };
            if status != HookStatus::Succeeded {
                log::warn!("hook {} did not succeed: {:?}", script.display(), status);
            }

            HookOutcome { script, status }
        })
        .collect();

    bound.cleanup()?;

    Ok(outcomes)
}

/// File names of the regular files in `dir`, sorted.
fn list_hooks(dir: &Path) -> Vec<std::ffi::OsString> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("cannot read hook directory {}: {}", dir.display(), e);
            return vec![];
        }
    };

    let mut names = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name())
        .collect::<Vec<_>>();
    names.sort();
    names
}
