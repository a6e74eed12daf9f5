//! `ragline ask`: Answer a single question.

use std::path::Path;

use tracing::debug;

use super::{format_answer, load_config, read_history, require_api_key};

pub async fn run(
    config_path: Option<&Path>,
    question: &str,
    history_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    require_api_key(&config)?;

    let history = match history_path {
        Some(path) => {
            let turns = read_history(path)?;
            debug!(path = %path.display(), turns = turns.len(), "Loaded history");
            turns
        }
        None => Vec::new(),
    };

    let orchestrator = ragline_gateway::build_orchestrator(&config).await?;
    let answer = orchestrator.process_query(question, &history).await?;
    println!("{}", format_answer(&answer));

    Ok(())
}
