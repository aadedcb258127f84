//! Core library entrypoint: parses line-oriented simulator input decks,
//! applies a compiled renumbering map, and re-emits byte-accurate text.

pub mod card;
pub mod diag;
pub mod kinds;
pub mod lexer;
pub mod maprules;
pub mod numbering;
pub mod rewrite;

pub use card::{Card, TemplatePiece, Value, ValueEntry};
pub use diag::{Diagnostic, DiagnosticKind};
pub use kinds::{CardKind, DataCardKind, ElementKind, ParameterKind, ValueKind};
pub use lexer::RawCard;
pub use maprules::{ChangeRule, Range, RenameRule, Rules, compile_map};
pub use numbering::{collect_numbers, range_summary, sequential_index};
pub use rewrite::apply;

use anyhow::{Context, Result};
use std::path::Path;

/// Read `path`, lex it into raw line-groups, and decompose every group
/// into a [`Card`]. Diagnostics from both stages land in `sink`, in the
/// order they were produced; only the read itself can fail outright.
pub fn parse_deck(path: &Path, sink: &mut Vec<Diagnostic>) -> Result<Vec<Card>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading deck {}", path.display()))?;
    Ok(parse_deck_str(&text, sink))
}

/// Same as [`parse_deck`], operating on an in-memory deck (used by the
/// `renumber`/`inspect`/`numbers` commands when reading from stdin, and
/// by every test in this crate).
pub fn parse_deck_str(text: &str, sink: &mut Vec<Diagnostic>) -> Vec<Card> {
    let (raw_cards, mut lex_diags) = lexer::lex(text);
    sink.append(&mut lex_diags);
    raw_cards
        .iter()
        .map(|raw| card::decompose(raw, sink))
        .collect()
}
