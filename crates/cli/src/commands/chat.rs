//! `ragline chat`: Interactive conversation.
//!
//! The conversation lives here, not in the pipeline: each question is sent
//! with every earlier turn, and a turn pair is recorded only once the
//! question has been answered.

use std::io::Write;
use std::path::Path;

use ragline_core::message::{ConversationTurn, Message};
use ragline_pipeline::Answer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use super::{format_answer, load_config, require_api_key};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    require_api_key(&config)?;

    let orchestrator = ragline_gateway::build_orchestrator(&config).await?;
    let settings = orchestrator.settings();

    println!();
    println!("  Ragline Chat");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", settings.completion_model);
    println!("  Index:     {}", settings.index_name);
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question == "exit" || question == "quit" {
            break;
        }
        if !question.is_empty() {
            match orchestrator.process_query(question, &history).await {
                Ok(answer) => {
                    println!();
                    for line in format_answer(&answer).lines() {
                        println!("  Assistant > {line}");
                    }
                    println!();
                    record_turn(&mut history, question, &answer);
                    debug!(turns = history.len(), "Recorded turn");
                }
                Err(e) => {
                    warn!(kind = %e.kind(), stage = %e.stage(), "Query failed; history unchanged");
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn record_turn(history: &mut Vec<ConversationTurn>, question: &str, answer: &Answer) {
    history.push(Message::user(question));
    history.push(Message::assistant(answer.text.as_str()));
}
