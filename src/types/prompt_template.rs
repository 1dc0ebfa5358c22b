use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Text framing applied to a conversation before it is sent to a backend
/// that has no native notion of roles.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptTemplate {
    /// Send the messages unchanged.
    #[default]
    None,

    /// `<|im_start|>{role}\n{content}<|im_end|>` framing.
    ChatML,

    /// `### Instruction:` / `### Input:` / `### Response:` framing.
    Alpaca,
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptTemplate::None => write!(f, "none"),
            PromptTemplate::ChatML => write!(f, "ChatML"),
            PromptTemplate::Alpaca => write!(f, "Alpaca"),
        }
    }
}

impl FromStr for PromptTemplate {
    type Err = Error;

    /// Accepts "none", "chatml" and "alpaca" (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(PromptTemplate::None),
            "chatml" => Ok(PromptTemplate::ChatML),
            "alpaca" => Ok(PromptTemplate::Alpaca),
            _ => Err(Error::configuration(
                format!("Unknown prompt template: {s} (expected ChatML or Alpaca)"),
                None,
            )),
        }
    }
}
