use std::path::{Path, PathBuf};

mod check;
mod parse;
mod repair;
mod terminal;

use anyhow::Context;
use check::Check;
use clap::ArgAction;
use parse::Parse;
use repair::Repair;
use reqnum::Config;
use tracing::instrument;

/// Config file read from the working directory when `--config` is not given.
const DEFAULT_CONFIG: &str = "reqnum.toml";

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to ./reqnum.toml if present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        let config = load_config(self.config.as_deref())?;
        self.command.run(&config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Parse requirement numbers and show their structure
    Parse(Parse),

    /// Repair outline documents and write the repaired rows
    Repair(Repair),

    /// Repair outline documents without writing, reporting what needs review
    Check(Check),
}

impl Command {
    fn run(self, config: &Config) -> anyhow::Result<()> {
        match self {
            Self::Parse(command) => command.run(config),
            Self::Repair(command) => command.run(config),
            Self::Check(command) => command.run(config),
        }
    }
}

#[instrument]
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    let fallback = Path::new(DEFAULT_CONFIG);
    if !fallback.exists() {
        tracing::debug!("no {DEFAULT_CONFIG} found, using default config");
        return Ok(Config::default());
    }

    Config::load(fallback).with_context(|| format!("failed to load config from {DEFAULT_CONFIG}"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["reqnum", "check", "outlines", "-vv", "--config", "x.toml"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref(), Some(Path::new("x.toml")));
        assert!(matches!(cli.command, Command::Check(_)));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["reqnum"]).is_err());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\ndisplay_order_start = 5\n")
            .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.display_order_start(), 5);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let error = load_config(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(error.to_string().starts_with("failed to load config from"));
    }
}
