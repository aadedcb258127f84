//! The main pipeline command: `deckjuggler renumber`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use deckjuggler::{Diagnostic, apply, compile_map, parse_deck};

use crate::cli::utils::{print_diagnostics, write_output};

/// Arguments for `deckjuggler renumber`.
#[derive(Args, Debug)]
pub struct RenumberArgs {
    /// Deck file to renumber.
    #[arg(long)]
    pub deck: PathBuf,
    /// Map file describing the rename/change rules.
    #[arg(long)]
    pub map: PathBuf,
    /// Output path (`-` for stdout).
    #[arg(short = 'o', long = "out")]
    pub out: PathBuf,
    /// Re-fold any output line exceeding 79 visible columns.
    #[arg(long)]
    pub wrap: bool,
}

pub fn handle(args: RenumberArgs) -> Result<()> {
    let mut diags: Vec<Diagnostic> = Vec::new();
    let mut cards = parse_deck(&args.deck, &mut diags)?;
    let rules = compile_map(&args.map, &mut diags)?;

    let mut text = String::new();
    for card in &mut cards {
        apply(card, &rules, &mut diags);
        text.push_str(&card.emit(args.wrap, &mut diags));
    }

    write_output(&args.out, &text)?;
    print_diagnostics(&diags);
    println!(
        "Renumbered {} cards from {} -> {}",
        cards.len(),
        args.deck.display(),
        args.out.display()
    );
    Ok(())
}
