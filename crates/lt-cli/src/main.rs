//! # layertree CLI
//!
//! Inspect and convert persisted layer-tree template blobs.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use lt_core::{Document, LayerId, Outcome};
use serde_json::{Value, json};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "layertree")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Enable verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a canonical document into compact form
    Pack {
        /// Input file (stdin when omitted or `-`)
        input: Option<PathBuf>,
    },

    /// Expand any recognized shape into a canonical document
    Unpack {
        /// Input file (stdin when omitted or `-`)
        input: Option<PathBuf>,
    },

    /// Report which historical format a payload has
    Classify {
        /// Input file (stdin when omitted or `-`)
        input: Option<PathBuf>,
    },

    /// Reconcile a template onto a hosting canvas root
    Assemble {
        /// Input file (stdin when omitted or `-`)
        input: Option<PathBuf>,

        /// Id of the hosting canvas root
        #[arg(long, env = "LAYERTREE_HOST", default_value = "ROOT")]
        host: String,

        /// Exit with an error instead of emitting a fabricated placeholder
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let output = match cli.command {
        Commands::Pack { input } => {
            let doc: Document = serde_json::from_value(read_json(input.as_deref())?)
                .context("input is not a canonical document")?;
            doc.validate().context("document is structurally invalid")?;
            lt_core::pack(&doc)?.into_value()
        }
        Commands::Unpack { input } => {
            let doc = lt_core::unpack(&read_json(input.as_deref())?)?;
            serde_json::to_value(&doc)?
        }
        Commands::Classify { input } => {
            let c = lt_core::classify(&read_json(input.as_deref())?);
            json!({
                "format": format!("{:?}", c.format),
                "evidence": format!("{:?}", c.evidence),
                "heuristic": c.is_heuristic(),
            })
        }
        Commands::Assemble {
            input,
            host,
            strict,
        } => {
            let raw = read_json(input.as_deref())?;
            let reconciled = lt_core::assemble(&raw, LayerId::intern(&host));
            if let Outcome::Fallback(reason) = &reconciled.outcome {
                if strict {
                    bail!("template could not be attached: {reason:?}");
                }
                log::warn!("emitting placeholder: {reason:?}");
            }
            for repair in &reconciled.repairs {
                log::info!("repair: {repair:?}");
            }
            json!({
                "document": reconciled.document,
                "topLevel": reconciled.top_level,
            })
        }
    };

    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(())
}

fn read_json(path: Option<&Path>) -> Result<Value> {
    let text = match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("input is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn every_input_argument_is_documented() {
        let cli = Cli::command();
        for sub in cli.get_subcommands() {
            let input = sub
                .get_arguments()
                .find(|a| a.get_id() == "input")
                .unwrap_or_else(|| panic!("`{}` takes no input", sub.get_name()));
            assert!(input.get_help().is_some(), "`{}` input has no help", sub.get_name());
        }
    }
}
