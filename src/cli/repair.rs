use std::{path::PathBuf, process};

use anyhow::Context;
use clap::Parser;
use reqnum::{
    Config, OutlineSet, RepairReport,
    storage::{Format, outline_file},
};
use tracing::instrument;

use super::check::{Stream, print_outcome};

#[derive(Debug, Parser)]
#[command(about = "Repair outline documents and write the repaired rows")]
pub struct Repair {
    /// Outline documents, or directories to search for them
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Write the repaired rows here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (defaults to the output file's extension, else JSON)
    #[arg(long, value_name = "FORMAT")]
    format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Self::Json,
            OutputFormat::Yaml => Self::Yaml,
        }
    }
}

impl Repair {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let set = OutlineSet::load(&self.paths).context("failed to load outlines")?;
        let outcomes = set.repair_all(config);

        for outcome in &outcomes {
            print_outcome(outcome, false, Stream::Stderr);
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        // a failed outline is left out entirely rather than written partially
        let reports: Vec<RepairReport> = outcomes
            .into_iter()
            .filter_map(|outcome| outcome.result.ok())
            .collect();

        let format = self
            .format
            .map(Format::from)
            .or_else(|| self.output.as_deref().and_then(Format::from_path))
            .unwrap_or_default();

        match &self.output {
            Some(path) => {
                outline_file::save(path, &reports, format)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!("wrote {} outlines to {}", reports.len(), path.display());
            }
            None => println!("{}", outline_file::render(&reports, format)?),
        }

        if failed > 0 {
            process::exit(2);
        }
        Ok(())
    }
}
