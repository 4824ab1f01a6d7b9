use std::ffi::OsString;

const DEFAULT_SHELL: &str = "/bin/sh";

/// A program and its arguments, resolved inside the chroot.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    arg0: OsString,
    args: Vec<OsString>,
}

impl Command {
    pub fn new(program: impl Into<OsString>) -> Self {
        Command {
            arg0: program.into(),
            args: vec![],
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The program path as seen from inside the root.
    pub fn program(&self) -> &OsString {
        &self.arg0
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::new(DEFAULT_SHELL)
    }
}

impl From<&Command> for std::process::Command {
    fn from(origin: &Command) -> Self {
        let mut command = std::process::Command::new(&origin.arg0);
        command.args(&origin.args);

        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_a_shell() {
        let command = Command::default();
        assert_eq!(command.program(), "/bin/sh");
        assert!(command.args().is_empty());
    }

    #[test]
    fn test_command_keeps_argument_order() {
        let command = Command::new("/usr/bin/env").arg("-i").arg("true");
        let std_command = std::process::Command::from(&command);

        assert_eq!(std_command.get_program(), "/usr/bin/env");
        assert_eq!(
            std_command.get_args().collect::<Vec<_>>(),
            vec!["-i", "true"]
        );
    }
}
