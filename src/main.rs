mod cli;
mod config;
mod helper;

use crate::cli::{Cli, Error, Handler, Result};
use crate::config::Config;
use clap::{ErrorKind, Parser};
use log::LevelFilter;
use std::process::exit;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            exit(exit_code(&e));
        }
    };

    let env = env_logger::Env::default().default_filter_or("info");
    let mut logger = env_logger::Builder::from_env(env);
    if cli.global.quiet {
        logger.filter_level(LevelFilter::Off);
    }
    logger.init();

    let privileged = nix::unistd::geteuid().is_root();
    if let Err(e) = run(cli, privileged) {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

/// Help and version requests succeed, every other parse error is a usage error.
fn exit_code(error: &clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn run(cli: Cli, privileged: bool) -> Result<()> {
    let config_dir = cli.global.config_dir();
    let overrides = cli.global.overrides();
    let handler = match cli.into_handler() {
        Some(handler) => handler,
        None => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    if !privileged {
        return Err(Error::PrivilegeRequired);
    }
    let config = Config::load(&config_dir, overrides)?;
    log::debug!("{:?}", config);

    handler.handler(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("btrsnap").chain(args.iter().copied()))
    }

    #[test]
    fn test_exit_codes_of_parse_errors() {
        let usage_errors: [&[&str]; 4] = [&["frobnicate"], &[], &["create"], &["rename", "a"]];
        for args in usage_errors {
            let err = parse(args).unwrap_err();
            assert_eq!(exit_code(&err), 1, "{:?}", args);
        }

        let requests: [&[&str]; 6] = [
            &["help"],
            &["--help"],
            &["-h"],
            &["-v"],
            &["--version"],
            &["list", "-v"],
        ];
        for args in requests {
            let err = parse(args).unwrap_err();
            assert_eq!(exit_code(&err), 0, "{:?}", args);
        }
    }

    #[test]
    fn test_privilege_is_checked_before_anything_else() {
        let cli = parse(&["list", "--config-dir", "/nonexistent/btrsnap"]).unwrap();
        assert!(matches!(run(cli, false), Err(Error::PrivilegeRequired)));
    }

    #[test]
    fn test_version_needs_no_privilege() {
        let cli = parse(&["version"]).unwrap();
        assert!(run(cli, false).is_ok());
    }
}
