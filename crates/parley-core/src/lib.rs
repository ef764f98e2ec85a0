//! Core types and error definitions for Parley.
//!
//! This crate provides the foundational types shared across all Parley crates:
//! the error taxonomy, conversation messages, and tool-call references.
//!
//! # Main types
//!
//! - [`ParleyError`]: Unified error enum for every Parley subsystem.
//! - [`ParleyResult`]: Convenience alias for `Result<T, ParleyError>`.
//! - [`Role`]: Message role (system, user, assistant, tool).
//! - [`Message`]: A single entry of a conversation.
//! - [`ToolCallRef`]: A tool invocation requested by the assistant.

/// Error taxonomy.
pub mod error;
/// Conversation messages and tool-call references.
pub mod message;

pub use error::{ParleyError, ParleyResult};
pub use message::{Message, Role, ToolCallRef};
