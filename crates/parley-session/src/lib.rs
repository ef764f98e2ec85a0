//! Conversation state for Parley.
//!
//! [`ConversationStore`] owns the ordered message log of one conversation and
//! refuses appends that would break its role and tool-linkage rules.

/// The message log and its invariants.
pub mod store;

pub use store::{Checkpoint, ClearMode, ConversationStore};
