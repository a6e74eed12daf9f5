//! Context assembly: fits retrieved passages and conversation history into
//! their character budgets.
//!
//! Two sections are assembled independently:
//!
//! 1. **Context** (retrieved passages): the longest prefix, in index order,
//!    whose `"\n\n---\n\n"` join fits the budget
//! 2. **History** (prior turns): the longest most-recent suffix whose
//!    `"{role}: {content}\n"` log fits the budget
//!
//! # Determinism
//!
//! Assembly is a pure function of its inputs. No random or time-dependent
//! logic is used, and lengths are counted in characters rather than bytes.

use crate::context::budget::TokenBudget;
use ragline_core::index::RetrievedPassage;
use ragline_core::message::ConversationTurn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Separator placed between included passages.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

// ── Types ─────────────────────────────────────────────────────────────────

/// The prompt pieces handed to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledPrompt {
    /// Included passages joined by [`PASSAGE_SEPARATOR`].
    pub context: String,
    /// Formatted history log, oldest first. Empty when there is no history.
    pub history_log: String,
    /// The user's original query, verbatim.
    pub query: String,
}

/// Output of [`ContextAssembler::assemble`].
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub prompt: AssembledPrompt,
    /// Every distinct source across all retrieved passages, included or not.
    pub sources: BTreeSet<String>,
    pub metadata: AssemblyMetadata,
}

/// What the assembler kept and what it cut.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    pub max_context_chars: usize,
    pub max_history_chars: usize,
    /// Per-section statistics (`context`, `history`).
    pub sections: Vec<SectionStats>,
    /// One record per section that lost content.
    pub drops: Vec<DropInfo>,
}

/// Statistics for a single section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionStats {
    pub name: String,
    /// Characters in the rendered section.
    pub chars: usize,
    pub items_included: usize,
    pub items_total: usize,
}

/// Content removed from a section during budget enforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropInfo {
    pub section: String,
    pub items_dropped: usize,
    pub chars_dropped: usize,
    /// A single passage was cut mid-text rather than dropped whole.
    pub truncated: bool,
    pub reason: String,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless; create one and reuse it.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_context_chars: usize,
    max_history_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler with explicit character budgets.
    pub fn new(max_context_chars: usize, max_history_chars: usize) -> Self {
        Self {
            max_context_chars,
            max_history_chars,
        }
    }

    /// Create an assembler from a token budget.
    pub fn from_budget(budget: &TokenBudget) -> Self {
        Self::new(budget.max_context_chars(), budget.max_history_chars())
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    pub fn max_history_chars(&self) -> usize {
        self.max_history_chars
    }

    /// Assemble the prompt for `query`.
    ///
    /// Passages must be in index order (most similar first) and history
    /// oldest first; both orders are preserved in the output.
    pub fn assemble(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
        history: &[ConversationTurn],
    ) -> AssembledContext {
        let (context, context_stats, context_drop) = self.render_context(passages);
        let (history_log, history_stats, history_drop) = self.render_history(history);

        let sources = passages
            .iter()
            .filter_map(|p| p.source.clone())
            .collect();

        AssembledContext {
            prompt: AssembledPrompt {
                context,
                history_log,
                query: query.to_string(),
            },
            sources,
            metadata: AssemblyMetadata {
                max_context_chars: self.max_context_chars,
                max_history_chars: self.max_history_chars,
                sections: vec![context_stats, history_stats],
                drops: context_drop.into_iter().chain(history_drop).collect(),
            },
        }
    }

    /// The history log that fits the history budget.
    pub fn truncate_history(&self, history: &[ConversationTurn]) -> String {
        self.render_history(history).0
    }

    /// The passage join that fits the context budget.
    pub fn truncate_context(&self, passages: &[RetrievedPassage]) -> String {
        self.render_context(passages).0
    }

    // ── Section renderers ─────────────────────────────────────────────

    fn render_history(&self, history: &[ConversationTurn]) -> (String, SectionStats, Option<DropInfo>) {
        let section = "history";
        let budget = self.max_history_chars;

        // Newest first; stop at the first turn that would overflow.
        let mut used = 0;
        let mut kept: Vec<String> = Vec::new();
        for turn in history.iter().rev() {
            let line = turn.history_line();
            let line_chars = line.chars().count();
            if used + line_chars > budget {
                break;
            }
            used += line_chars;
            kept.push(line);
        }
        kept.reverse();

        let log = kept.concat().trim_end().to_string();
        let dropped = history.len() - kept.len();
        let chars_dropped: usize = history[..dropped]
            .iter()
            .map(|t| t.history_line().chars().count())
            .sum();

        (
            log.clone(),
            SectionStats {
                name: section.into(),
                chars: log.chars().count(),
                items_included: kept.len(),
                items_total: history.len(),
            },
            maybe_drop(
                section,
                dropped,
                chars_dropped,
                false,
                "Oldest turns dropped",
            ),
        )
    }

    fn render_context(&self, passages: &[RetrievedPassage]) -> (String, SectionStats, Option<DropInfo>) {
        let section = "context";
        let budget = self.max_context_chars;
        let sep_chars = PASSAGE_SEPARATOR.chars().count();
        let lengths: Vec<usize> = passages.iter().map(|p| p.text.chars().count()).collect();

        // Grow the prefix until its join first exceeds the budget.
        let mut included = passages.len();
        let mut joined_len = 0;
        for (i, len) in lengths.iter().enumerate() {
            joined_len += len + if i > 0 { sep_chars } else { 0 };
            if joined_len > budget {
                included = i;
                break;
            }
        }

        let (context, truncated) = if included == 0 && !passages.is_empty() {
            // A lone passage larger than the budget is cut to fit.
            let cut: String = passages[0].text.chars().take(budget).collect();
            (cut, true)
        } else {
            let texts: Vec<&str> = passages[..included].iter().map(|p| p.text.as_str()).collect();
            (texts.join(PASSAGE_SEPARATOR), false)
        };

        let context_chars = context.chars().count();
        let items_included = if truncated && context_chars > 0 { 1 } else { included };
        let total_chars: usize = lengths.iter().sum();
        let kept_chars: usize = if truncated {
            context_chars
        } else {
            lengths[..included].iter().sum()
        };
        let reason = if truncated {
            "Oversized passage truncated, lower-ranked passages dropped"
        } else {
            "Lower-ranked passages dropped"
        };

        let drop = if truncated {
            Some(DropInfo {
                section: section.into(),
                items_dropped: passages.len() - items_included,
                chars_dropped: total_chars - kept_chars,
                truncated: true,
                reason: reason.into(),
            })
        } else {
            maybe_drop(
                section,
                passages.len() - included,
                total_chars - kept_chars,
                false,
                reason,
            )
        };

        (
            context,
            SectionStats {
                name: section.into(),
                chars: context_chars,
                items_included,
                items_total: passages.len(),
            },
            drop,
        )
    }
}

fn maybe_drop(
    section: &str,
    items_dropped: usize,
    chars_dropped: usize,
    truncated: bool,
    reason: &str,
) -> Option<DropInfo> {
    if items_dropped > 0 {
        Some(DropInfo {
            section: section.into(),
            items_dropped,
            chars_dropped,
            truncated,
            reason: reason.into(),
        })
    } else {
        None
    }
}
