//! A `Host` that records what it is asked to do instead of touching the system.

use crate::{Command, Host};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// One call made on the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Mount(PathBuf, PathBuf),
    Bind(PathBuf, PathBuf),
    Unmount(PathBuf),
    ForceUnmount(PathBuf),
    Run(PathBuf, OsString),
}

#[derive(Default)]
pub struct RecordingHost {
    events: RefCell<Vec<Event>>,
    mounted: RefCell<Vec<PathBuf>>,
    fail_mount: Cell<bool>,
    fail_bind: RefCell<Option<PathBuf>>,
    fail_unmount: RefCell<Option<PathBuf>>,
    exit_codes: RefCell<HashMap<OsString, i32>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Targets currently mounted, in mount order.
    pub fn mounted(&self) -> Vec<PathBuf> {
        self.mounted.borrow().clone()
    }

    /// Programs run so far, in order.
    pub fn runs(&self) -> Vec<OsString> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Run(_, program) => Some(program.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn fail_mount(&self) {
        self.fail_mount.set(true);
    }

    pub fn fail_bind_on(&self, target: &Path) {
        *self.fail_bind.borrow_mut() = Some(target.to_path_buf());
    }

    pub fn fail_unmount_on(&self, target: &Path) {
        *self.fail_unmount.borrow_mut() = Some(target.to_path_buf());
    }

    /// Make `program` exit with `code` when run.
    pub fn exit_with(&self, program: impl Into<OsString>, code: i32) {
        self.exit_codes.borrow_mut().insert(program.into(), code);
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl Host for RecordingHost {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        _fstype: &str,
        _data: Option<&str>,
    ) -> io::Result<()> {
        self.record(Event::Mount(source.to_path_buf(), target.to_path_buf()));
        if self.fail_mount.get() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        self.mounted.borrow_mut().push(target.to_path_buf());
        Ok(())
    }

    fn bind(&self, source: &Path, target: &Path) -> io::Result<()> {
        self.record(Event::Bind(source.to_path_buf(), target.to_path_buf()));
        if self.fail_bind.borrow().as_deref() == Some(target) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "bind refused"));
        }
        self.mounted.borrow_mut().push(target.to_path_buf());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        self.record(Event::Unmount(target.to_path_buf()));
        if self.fail_unmount.borrow().as_deref() == Some(target) {
            return Err(io::Error::new(io::ErrorKind::Other, "target is busy"));
        }
        let mut mounted = self.mounted.borrow_mut();
        match mounted.iter().rposition(|m| m == target) {
            Some(index) => {
                mounted.remove(index);
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "not mounted")),
        }
    }

    fn force_unmount(&self, target: &Path) -> io::Result<()> {
        self.record(Event::ForceUnmount(target.to_path_buf()));
        self.mounted.borrow_mut().retain(|m| m != target);
        Ok(())
    }

    fn run_chrooted(&self, root: &Path, command: &Command) -> io::Result<ExitStatus> {
        self.record(Event::Run(root.to_path_buf(), command.program().clone()));
        let code = self
            .exit_codes
            .borrow()
            .get(command.program())
            .copied()
            .unwrap_or(0);
        Ok(ExitStatus::from_raw(code << 8))
    }
}
