//! Interactive retrieval-augmented chat.
//!
//! The session reads one line at a time, looks for in-band directives,
//! optionally augments the line with retrieved passages or web results, and
//! sends the conversation to the active backend.
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: in-band directive parsing
//! - [`session`]: the conversation state machine
//! - [`identity`]: the operator's name for the system prompt

mod commands;
mod config;
mod identity;
mod session;

pub use commands::{
    Directive, append_file, extract_search_count, file_path, help_text, parse_directives,
    paste_clipboard, strip_web,
};
pub use config::{ChatArgs, ChatConfig, SessionConfig};
pub use identity::{name_from_gitconfig, operator_name};
pub use session::{ChatSession, Operator, TurnOutcome};
