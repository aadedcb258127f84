//! Convenience helpers shared across command handlers.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use deckjuggler::Diagnostic;

/// Persist a string either to a file or stdout when `-` is provided.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str() == "-" {
        io::stdout().write_all(content.as_bytes())?;
        return Ok(());
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Echo every diagnostic to stderr in addition to the `log::warn!` line
/// [`deckjuggler::diag::report`] already emitted, so a non-logging
/// invocation still sees them summarized on exit.
pub fn print_diagnostics(diags: &[Diagnostic]) {
    if diags.is_empty() {
        return;
    }
    eprintln!("{} diagnostic(s):", diags.len());
    for d in diags {
        eprintln!("  {d}");
    }
}
