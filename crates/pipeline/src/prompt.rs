//! Message builders for the two completion calls a query makes.

use crate::context::AssembledPrompt;
use ragline_core::message::Message;

/// Messages asking the model to rewrite a follow-up as a standalone question.
pub fn refine_messages(system_prompt: &str, history_log: &str, query: &str) -> Vec<Message> {
    let user = format!(
        "Conversation so far:\n{history_log}\n\nFollow-up question: {query}\nStandalone question:"
    );
    vec![Message::system(system_prompt), Message::user(user)]
}

/// Messages asking the model to answer from the assembled prompt.
pub fn answer_messages(system_prompt: &str, prompt: &AssembledPrompt) -> Vec<Message> {
    vec![
        Message::system(system_prompt),
        Message::user(render_answer_prompt(prompt)),
    ]
}

/// Render the user turn for answer generation.
///
/// The history section is omitted when the log is empty.
pub fn render_answer_prompt(prompt: &AssembledPrompt) -> String {
    let mut out = format!("Context:\n{}", prompt.context);
    if !prompt.history_log.is_empty() {
        out.push_str("\n\nConversation so far:\n");
        out.push_str(&prompt.history_log);
    }
    out.push_str("\n\nQuestion: ");
    out.push_str(&prompt.query);
    out.push_str("\nAnswer:");
    out
}
