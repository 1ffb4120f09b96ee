//! `reqnum`: parse, check and repair advancement requirement numbering.

use clap::Parser;

mod cli;
use cli::Cli;

fn main() -> anyhow::Result<()> {
    Cli::parse().run()
}
