use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use nix::errno::Errno;
use nix::mount::{MntFlags, MsFlags};

pub use command::Command;
pub use hooks::{run_hooks, HookOutcome, HookStatus};
pub use mounts::{Bound, Mounts};

mod command;
mod hooks;
mod mounts;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Root environment related errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A filesystem could not be mounted or bound.
    #[error("failed to mount {}: {source}", target.display())]
    Mount { target: PathBuf, source: io::Error },
    /// A mounted target could not be released.
    #[error("failed to unmount {}: {source}", target.display())]
    Unmount { target: PathBuf, source: io::Error },
    /// The program could not be started inside the root.
    #[error("failed to run {program} in {}: {source}", root.display())]
    Spawn {
        program: String,
        root: PathBuf,
        source: io::Error,
    },
    /// The program ran but exited with a non-zero code.
    #[error("{0} exited with code {1}")]
    ChildExit(String, i32),
}

/// A common result type for our root environment crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `Host` is the set of privileged operations we need from the running system.
///
/// Everything that mounts, unmounts or changes root goes through it, so the
/// orchestration above it can be exercised without privileges.
pub trait Host {
    /// Mount `source` on `target` with the given filesystem type and options.
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fstype: &str,
        data: Option<&str>,
    ) -> io::Result<()>;
    /// Bind `source` on `target`.
    fn bind(&self, source: &Path, target: &Path) -> io::Result<()>;
    fn unmount(&self, target: &Path) -> io::Result<()>;
    /// Detach whatever is mounted on `target`, even if busy.
    /// Succeeds when nothing is mounted there.
    fn force_unmount(&self, target: &Path) -> io::Result<()>;
    /// Run `command` with `root` as its root directory and wait for it.
    fn run_chrooted(&self, root: &Path, command: &Command) -> io::Result<ExitStatus>;
}

/// The real host, driven through the kernel mount and chroot syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeHost;

impl Host for NativeHost {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fstype: &str,
        data: Option<&str>,
    ) -> io::Result<()> {
        nix::mount::mount(Some(source), target, Some(fstype), MsFlags::empty(), data)?;
        Ok(())
    }

    fn bind(&self, source: &Path, target: &Path) -> io::Result<()> {
        nix::mount::mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )?;
        Ok(())
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        nix::mount::umount(target)?;
        Ok(())
    }

    fn force_unmount(&self, target: &Path) -> io::Result<()> {
        match nix::mount::umount2(target, MntFlags::MNT_FORCE | MntFlags::MNT_DETACH) {
            Ok(()) => Ok(()),
            // Not a mount point, or nothing there at all.
            Err(Errno::EINVAL) | Err(Errno::ENOENT) => Ok(()),
            Err(errno) => Err(errno.into()),
        }
    }

    fn run_chrooted(&self, root: &Path, command: &Command) -> io::Result<ExitStatus> {
        let new_root = root.to_path_buf();
        let mut child = std::process::Command::from(command);
        unsafe {
            child.pre_exec(move || {
                nix::unistd::chroot(&new_root)?;
                nix::unistd::chdir("/")?;
                Ok(())
            });
        }
        child.status()
    }
}

/// The `Chroot` struct provides a simple way to run a program inside
/// a root filesystem with the host kernel interfaces available.
#[derive(Clone, Debug)]
pub struct Chroot {
    /// The path to the root the program runs in
    root: PathBuf,
    /// The mounts bound into `root` while the program runs.
    mounts: Mounts,
    /// The program to run
    command: Command,
}

impl Chroot {
    pub fn new(root: &Path) -> Self {
        Chroot {
            root: root.to_path_buf(),
            mounts: Mounts::empty(),
            command: Command::default(),
        }
    }

    /// Bind `home` on the `/home` directory of the root.
    ///
    /// It must be called before the kernel interfaces are added so it is unbound last.
    pub fn home(mut self, home: &Path) -> Self {
        self.mounts = self.mounts.bind(home, "home");
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.command = command;
        self
    }

    /// Run the program.
    ///
    /// Mounts are always unwound before returning, whatever the program did.
    pub fn run(self, host: &dyn Host) -> Result<()> {
        let mounts = self.mounts.kernel();
        let bound = mounts.apply(host, &self.root)?;

        let program = self.command.program().to_string_lossy().into_owned();
        log::info!("entering {} with {}", self.root.display(), program);

        let status = host
            .run_chrooted(&self.root, &self.command)
            .map_err(|source| Error::Spawn {
                program: program.clone(),
                root: self.root.clone(),
                source,
            });

        bound.cleanup()?;

        if let Some(code) = status?.code() {
            if code != 0 {
                return Err(Error::ChildExit(program, code));
            }
        }

        Ok(())
    }
}
