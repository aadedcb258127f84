//! Parse-only debugging aid: `deckjuggler inspect`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use deckjuggler::{Diagnostic, parse_deck};
use serde::Serialize;

use crate::cli::common::OutputFormat;
use crate::cli::utils::print_diagnostics;

/// Arguments for `deckjuggler inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Deck file to parse.
    #[arg(long)]
    pub deck: PathBuf,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct CardSummary {
    line_no: usize,
    kind: &'static str,
    etype: Option<&'static str>,
    original_name: Option<i64>,
    value_count: usize,
}

pub fn handle(args: InspectArgs) -> Result<()> {
    let mut diags: Vec<Diagnostic> = Vec::new();
    let cards = parse_deck(&args.deck, &mut diags)?;

    let summaries: Vec<CardSummary> = cards
        .iter()
        .map(|c| CardSummary {
            line_no: c.line_no,
            kind: c.kind.name(),
            etype: c.etype.map(|e| e.name()),
            original_name: c.original_name,
            value_count: c.values.len(),
        })
        .collect();

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Text => {
            for s in &summaries {
                println!(
                    "line {:>5}  {:<10} etype={:<12} name={:<8} values={}",
                    s.line_no,
                    s.kind,
                    s.etype.unwrap_or("-"),
                    s.original_name
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    s.value_count
                );
            }
        }
    }

    print_diagnostics(&diags);
    Ok(())
}
