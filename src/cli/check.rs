use std::{path::PathBuf, process};

use anyhow::Context;
use clap::Parser;
use reqnum::{Config, OutlineSet, storage::Outcome};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Repair outline documents without writing, reporting what needs review")]
pub struct Check {
    /// Outline documents, or directories to search for them
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Also exit non-zero when any row needs review
    #[arg(long)]
    strict: bool,

    /// Only print outlines with something to report
    #[arg(long, short)]
    quiet: bool,
}

impl Check {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let set = OutlineSet::load(&self.paths).context("failed to load outlines")?;
        if set.is_empty() {
            println!("No outlines found.");
            return Ok(());
        }

        let outcomes = set.repair_all(config);
        for outcome in &outcomes {
            print_outcome(outcome, self.quiet, Stream::Stdout);
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        let flagged: usize = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|report| report.needs_review().count())
            .sum();

        println!(
            "{} outlines, {} failed, {} rows need review",
            outcomes.len(),
            failed,
            flagged
        );

        if failed > 0 {
            process::exit(2);
        }
        if self.strict && flagged > 0 {
            process::exit(1);
        }
        Ok(())
    }
}

/// Where summaries are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

fn emit(stream: Stream, line: &str) {
    match stream {
        Stream::Stdout => println!("{line}"),
        Stream::Stderr => eprintln!("{line}"),
    }
}

/// Print one outline's result: a status line, then each finding that marks a
/// row for review.
pub fn print_outcome(outcome: &Outcome, quiet: bool, stream: Stream) {
    let source = outcome.source.display().to_string().dim();
    match &outcome.result {
        Err(e) => {
            emit(stream, &format!("{} {} {source}", "✗".error(), outcome.key));
            emit(stream, &format!("    {e}"));
        }
        Ok(report) => {
            let review: Vec<_> = report
                .findings
                .iter()
                .filter(|finding| finding.needs_review())
                .collect();
            if review.is_empty() {
                if !quiet {
                    emit(
                        stream,
                        &format!(
                            "{} {} ({} rows) {source}",
                            "✓".success(),
                            outcome.key,
                            report.rows.len()
                        ),
                    );
                }
                return;
            }

            emit(
                stream,
                &format!(
                    "{} {} ({} rows) {source}",
                    "!".warning(),
                    outcome.key,
                    report.rows.len()
                ),
            );
            for finding in review {
                emit(stream, &format!("    {finding}"));
            }
        }
    }
}
