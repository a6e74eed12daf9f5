//! Embedding and completion providers for Ragline.
//!
//! All backends implement the `ragline_core` capability traits.
//! The router selects the correct backend based on configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderHandle, ProviderRouter, build_from_config};
