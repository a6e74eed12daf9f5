//! Subcommand implementations.

pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod serve;

use ragline_config::AppConfig;
use ragline_core::message::ConversationTurn;
use ragline_pipeline::Answer;
use std::path::Path;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

pub(crate) fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    Ok(AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Fail early with setup help when the default provider has no key.
///
/// Local backends such as Ollama run without one.
pub(crate) fn require_api_key(config: &AppConfig) -> CliResult<()> {
    if config.default_provider == "ollama"
        || config.provider_api_key(&config.default_provider).is_some()
    {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    RAGLINE_API_KEY=sk-...");
    eprintln!("    OPENAI_API_KEY=sk-...");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// Read a JSON array of `{role, content}` turns.
pub(crate) fn read_history(path: &Path) -> CliResult<Vec<ConversationTurn>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read history file {}: {e}", path.display()))?;
    let turns = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse history file {}: {e}", path.display()))?;
    Ok(turns)
}

/// Render an answer followed by its sources, one per line.
pub(crate) fn format_answer(answer: &Answer) -> String {
    let mut out = answer.text.clone();
    if !answer.sources.is_empty() {
        out.push_str("\n\nSources:");
        for source in &answer.sources {
            out.push_str("\n  - ");
            out.push_str(source);
        }
    }
    out
}
