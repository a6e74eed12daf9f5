//! The query pipeline: the heart of Ragline.
//!
//! A query follows a **Refine → Retrieve → Assemble → Generate** sequence:
//!
//! 1. **Receive** a query and the caller's conversation history
//! 2. **Refine** a follow-up into a standalone question (optional)
//! 3. **Retrieve** the nearest passages from the vector index
//! 4. **Assemble** passages and history under fixed character budgets
//! 5. **Generate** a grounded answer via the completion provider
//!
//! The orchestrator keeps no per-query state, so a single instance serves
//! concurrent queries.

pub mod context;
pub mod orchestrator;
pub mod prompt;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{
    AssembledContext, AssembledPrompt, AssemblyMetadata, ContextAssembler, DropInfo,
    SectionStats, TokenBudget,
};
pub use orchestrator::{Answer, PipelineSettings, QueryOrchestrator, QueryOutcome};
