//! Command-line interface wiring for the `deckjuggler` binary.
//!
//! This module owns the clap definitions and delegates execution to
//! specialized submodules that encapsulate each command family.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod common;
pub mod inspect;
pub mod numbers;
pub mod renumber;
pub mod utils;

/// Parsed CLI entrypoint for the `deckjuggler` binary.
#[derive(Parser, Debug)]
#[command(
    name = "deckjuggler",
    version,
    about = "Format-preserving renumbering tool for line-oriented simulator input decks"
)]
pub struct Cli {
    /// Top-level command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// High-level command families made available to end users.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse, rewrite and emit a deck against a map file.
    Renumber(renumber::RenumberArgs),
    /// Parse a deck and print per-card classification (debugging aid).
    Inspect(inspect::InspectArgs),
    /// Survey the distinct cell/surface/material/... numbers in a deck.
    Numbers(numbers::NumbersArgs),
}

/// Execute the requested command.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Renumber(args) => renumber::handle(args),
        Command::Inspect(args) => inspect::handle(args),
        Command::Numbers(args) => numbers::handle(args),
    }
}
