//! Deck-wide number survey: `deckjuggler numbers`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use deckjuggler::{Diagnostic, collect_numbers, parse_deck, range_summary, sequential_index};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::cli::common::OutputFormat;
use crate::cli::utils::print_diagnostics;

/// Arguments for `deckjuggler numbers`.
#[derive(Args, Debug)]
pub struct NumbersArgs {
    /// Deck file to survey.
    #[arg(long)]
    pub deck: PathBuf,
    /// Also print the sequential-index rename table, in map-file syntax.
    #[arg(long)]
    pub sequential: bool,
    /// Output format (applies to the number survey only).
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct KindSummary {
    kind: &'static str,
    ranges: Vec<(i64, i64)>,
    count: usize,
}

pub fn handle(args: NumbersArgs) -> Result<()> {
    let mut diags: Vec<Diagnostic> = Vec::new();
    let cards = parse_deck(&args.deck, &mut diags)?;
    let numbers = collect_numbers(&cards);

    let summaries: Vec<KindSummary> = numbers
        .iter()
        .map(|(kind, values)| {
            let set: BTreeSet<i64> = values.iter().copied().collect();
            KindSummary {
                kind: kind.name(),
                ranges: range_summary(&set),
                count: values.len(),
            }
        })
        .collect();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            for s in &summaries {
                let ranges: Vec<String> = s
                    .ranges
                    .iter()
                    .map(|(lo, hi)| {
                        if lo == hi {
                            format!("{lo}")
                        } else {
                            format!("{lo}--{hi}")
                        }
                    })
                    .collect();
                println!("{:<14} count={:<5} ranges={}", s.kind, s.count, ranges.join(", "));
            }
        }
    }

    if args.sequential {
        let rules = sequential_index(&cards);
        print!("{}", rules.format_rename_map());
    }

    print_diagnostics(&diags);
    Ok(())
}
