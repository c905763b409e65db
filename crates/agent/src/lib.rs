//! Arthur agent: wires configuration, the intent model and the knowledge
//! base into a chat runtime that keeps a conversation transcript.
//!
//! - `bootstrap` builds an [`bootstrap::Application`] from configuration
//! - `runtime` handles chat turns
//! - `conversation` is the transcript model with JSON export/import
//! - `telemetry` installs the tracing subscriber

pub mod bootstrap;
pub mod conversation;
pub mod runtime;
pub mod telemetry;
