mod archive;
mod enter;
mod list;
mod pairs;
mod restore;

use crate::cli::archive::{ExportCommand, InjectCommand};
use crate::cli::enter::EnterCommand;
use crate::cli::list::{ListCommand, PurgeCommand};
use crate::cli::pairs::{CreateCommand, DeleteCommand, RenameCommand};
use crate::cli::restore::RestoreCommand;
use crate::config::{Config, Fragment};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI related errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] pair_store::Error),
    /// A required setting was found nowhere
    #[error("missing setting `{0}`, set it in a configuration fragment or on the command line")]
    ConfigIncomplete(&'static str),
    #[error("invalid configuration in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    #[error("this command must be run as root")]
    PrivilegeRequired,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A common result type for our CLI.
pub type Result<T> = std::result::Result<T, Error>;

/// `Handler` is a trait that should be implemented for each of our commands.
///
/// It defines the contract & the input / output of a command execution.
pub trait Handler {
    /// Executes the command handler with the resolved configuration.
    fn handler(&self, config: &Config) -> Result<()>;
}

#[derive(Parser, Debug)]
#[clap(version, author, about, propagate_version = true)]
#[clap(mut_arg("version", |a| a.short('v')))]
pub struct Cli {
    #[clap(flatten)]
    pub(crate) global: GlobalOpts,
    #[clap(subcommand)]
    pub(crate) command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Do not log anything
    #[clap(long, short, global = true)]
    pub quiet: bool,
    /// Device holding the btrfs volume
    #[clap(long, global = true, env = "BTRSNAP_PARTITION")]
    pub partition: Option<PathBuf>,
    /// Where to mount the top level of the volume
    #[clap(long, global = true, env = "BTRSNAP_MOUNT_POINT")]
    pub mount_point: Option<PathBuf>,
    /// Directory of configuration fragments [default: /etc/btrsnap/conf.d]
    #[clap(long, global = true)]
    pub config_dir: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::config::CONFIG_DIR))
    }

    /// Settings given on the command line or in the environment.
    pub fn overrides(&self) -> Fragment {
        Fragment {
            partition: self.partition.clone(),
            mount_point: self.mount_point.clone(),
            ..Fragment::default()
        }
    }
}

impl Cli {
    /// Get the command used by the user.
    ///
    /// Returns `None` for commands which need neither privileges nor a volume.
    pub fn into_handler(self) -> Option<Box<dyn Handler>> {
        match self.command {
            Command::List(cmd) => Some(Box::new(cmd)),
            Command::Purge(cmd) => Some(Box::new(cmd)),
            Command::Create(cmd) => Some(Box::new(cmd)),
            Command::Delete(cmd) => Some(Box::new(cmd)),
            Command::Restore(cmd) => Some(Box::new(cmd)),
            Command::Enter(cmd) => Some(Box::new(cmd)),
            Command::Rename(cmd) => Some(Box::new(cmd)),
            Command::Inject(cmd) => Some(Box::new(cmd)),
            Command::Export(cmd) => Some(Box::new(cmd)),
            Command::Version => None,
        }
    }
}

/// The enumeration of our commands.
///
/// Each of our commands should be listed in this enumeration with the following format :
/// CommandName(CommandHandler)
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the snapshot pairs with their OS version
    List(ListCommand),
    /// Delete old backups made by restore
    Purge(PurgeCommand),
    /// Snapshot a pair, or the live system, into a new pair
    Create(CreateCommand),
    /// Delete a pair
    Delete(DeleteCommand),
    /// Make a pair the live system, saving the current one
    Restore(RestoreCommand),
    /// Open a shell inside a pair
    Enter(EnterCommand),
    /// Rename a pair
    Rename(RenameCommand),
    /// Create a pair from a root and a home archive
    Inject(InjectCommand),
    /// Write a pair as a root and a home archive
    Export(ExportCommand),
    /// Print version information
    Version,
}
