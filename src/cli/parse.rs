use std::process;

use clap::Parser;
use reqnum::{Component, Config, Identifier, Style, domain::legacy};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Parse requirement numbers and show their structure")]
pub struct Parse {
    /// Requirement numbers to parse
    #[arg(required = true, value_name = "LABEL")]
    labels: Vec<String>,

    /// Print one JSON object per label instead of a table
    #[arg(long)]
    json: bool,
}

impl Parse {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let mut failed = 0;

        for label in &self.labels {
            match Identifier::parse_with(label, config.grammar()) {
                Ok(identifier) if self.json => {
                    println!("{}", serde_json::to_string(&describe(&identifier))?);
                }
                Ok(identifier) => print_table(label, &identifier),
                Err(e) => {
                    failed += 1;
                    tracing::debug!("{e}");
                    eprintln!("{} {}", "✗".error(), e);
                }
            }
        }

        if failed > 0 {
            process::exit(1);
        }
        Ok(())
    }
}

#[derive(Debug, serde::Serialize)]
struct Description {
    canonical: String,
    legacy: String,
    lossless_legacy: bool,
    base: u32,
    option: Option<char>,
    components: Vec<String>,
    depth: usize,
    parent: Option<String>,
    needs_review: bool,
}

fn describe(identifier: &Identifier) -> Description {
    Description {
        canonical: identifier.to_string(),
        legacy: identifier.format(Style::LegacyConcatenated),
        lossless_legacy: legacy::is_lossless(identifier),
        base: identifier.base_number().get(),
        option: identifier.option_letter(),
        components: identifier
            .components()
            .iter()
            .map(|component| match component {
                Component::Letter { letter, .. } => letter.to_string(),
                Component::Index { value, .. } => value.to_string(),
            })
            .collect(),
        depth: identifier.nesting_depth(),
        parent: identifier.parent_identifier().map(|parent| parent.to_string()),
        needs_review: identifier.needs_review(),
    }
}

fn print_table(label: &str, identifier: &Identifier) {
    let description = describe(identifier);
    let heading = if description.needs_review {
        description.canonical.warning()
    } else {
        description.canonical.success()
    };

    println!("{heading} {}", format!("(from '{label}')").dim());
    println!("  base:       {}", description.base);
    if let Some(option) = description.option {
        println!("  option:     {option}");
    }
    if !description.components.is_empty() {
        println!("  components: {}", description.components.join(" "));
    }
    println!("  depth:      {}", description.depth);
    println!(
        "  parent:     {}",
        description.parent.as_deref().unwrap_or("-")
    );
    let lossy = if description.lossless_legacy {
        String::new()
    } else {
        " (lossy)".warning()
    };
    println!("  legacy:     {}{lossy}", description.legacy);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_option_identifier() {
        let identifier: Identifier = "6A(a)(1)".parse().unwrap();
        let description = describe(&identifier);

        assert_eq!(description.canonical, "6A(a)(1)");
        assert_eq!(description.legacy, "6A1a");
        assert!(!description.lossless_legacy);
        assert_eq!(description.option, Some('A'));
        assert_eq!(description.components, ["a", "1"]);
        assert_eq!(description.depth, 3);
        assert_eq!(description.parent.as_deref(), Some("6A(a)"));
    }
}
