//! Shared clap helper types for CLI commands.

use clap::ValueEnum;

/// Output format shared by `inspect` and `numbers`: a human-readable
/// table by default, or a `serde_json`-rendered document for scripting.
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
