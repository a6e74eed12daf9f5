//! Context-window budgeting and prompt assembly.
//!
//! | Section | Source | Trim Strategy |
//! |---------|--------|---------------|
//! | Context | Retrieved passages | Lowest-ranked dropped, lone oversized passage cut |
//! | History | Prior turns | Oldest turns dropped |

pub mod assembler;
pub mod budget;

pub use assembler::{
    AssembledContext, AssembledPrompt, AssemblyMetadata, ContextAssembler, DropInfo,
    PASSAGE_SEPARATOR, SectionStats,
};
pub use budget::TokenBudget;
