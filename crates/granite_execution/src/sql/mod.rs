//! SQL frontend: identifier resolution and statement-to-plan translation.
//! Parsing itself is the `sqlparser` crate's job.

pub mod identifier_context;
pub mod translator;

pub use identifier_context::{IdentifierContext, IdentifierContextProxy};
pub use translator::{SqlTranslator, TranslationState};
