//! Explicit diagnostic sink shared by the lexer, decomposer, map-file
//! compiler and rewrite engine. Every diagnostic is non-fatal (§7) and
//! carries the line number of the card or map line that produced it.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiagnosticKind {
    #[error("tab character in input")]
    TabCharacter,
    #[error("malformed map-file line skipped: {0}")]
    MalformedMapLine(String),
    #[error("unsupported form, card left unchanged: {0}")]
    UnsupportedForm(String),
    #[error("FILL and LAT both present; FILL value was not parsed")]
    FillLatConflict,
    #[error("no break point available; line left over the wrap width")]
    WrapImpossible,
    #[error("non-injective rename: {old_a} and {old_b} both map to {new}")]
    NonInjectiveRename { old_a: i64, old_b: i64, new: i64 },
    #[error("material {from} crosses the void boundary to {to}; value left unchanged")]
    VoidMaterialCrossover { from: i64, to: i64 },
}

/// A single non-fatal diagnostic, anchored to the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(line: usize, kind: DiagnosticKind) -> Self {
        Self { line, kind }
    }

    /// Emit this diagnostic through `log::warn!`, echoing it for an
    /// operator watching the driver's output, in addition to whatever
    /// the caller does with the returned value.
    pub fn warn(self) -> Self {
        log::warn!("line {}: {}", self.line, self.kind);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

/// Append a diagnostic to `sink`, logging it along the way.
pub fn report(sink: &mut Vec<Diagnostic>, line: usize, kind: DiagnosticKind) {
    sink.push(Diagnostic::new(line, kind).warn());
}
