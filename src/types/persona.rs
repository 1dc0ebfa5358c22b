use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chat::help_text;
use crate::{Error, Result};

/// Placeholder in a persona's system prompt that is replaced by the command help.
pub const PROMPT_COMMANDS_PLACEHOLDER: &str = "{possible_prompt_commands}";

/// A named system-prompt profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Short name shown in the persona menu.
    pub name: String,

    /// One-line description shown in the persona menu.
    #[serde(default)]
    pub description: String,

    /// Model the persona is written for.
    #[serde(alias = "preferred_backend_identifier")]
    pub preferred_model: String,

    /// The system prompt installed when the persona is selected.
    pub system_prompt: String,
}

impl Persona {
    /// The persona every session starts with unless told otherwise.
    pub fn basic() -> Self {
        Self {
            name: "basic".to_string(),
            description: "Basic chatbot".to_string(),
            preferred_model: "phi3:mini".to_string(),
            system_prompt: format!(
                "You are a helpful chatbot assistant. Possible chatbot prompt commands: {}",
                help_text()
            ),
        }
    }

    fn expand_placeholders(mut self) -> Self {
        if self.system_prompt.contains(PROMPT_COMMANDS_PLACEHOLDER) {
            self.system_prompt = self
                .system_prompt
                .replace(PROMPT_COMMANDS_PLACEHOLDER, help_text());
        }
        self
    }
}

/// The personas compiled into the binary.
pub fn builtin_personas() -> Vec<Persona> {
    vec![Persona::basic()]
}

/// Loads additional personas from a JSON array on disk.
///
/// Every `{possible_prompt_commands}` token in a system prompt is replaced with
/// the command help text.
pub fn load_personas<P: AsRef<Path>>(path: P) -> Result<Vec<Persona>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| {
        Error::configuration(
            format!("Additional chatbots file not found: {}", path.display()),
            Some(Box::new(err)),
        )
    })?;
    let personas: Vec<Persona> = serde_json::from_reader(BufReader::new(file)).map_err(|err| {
        Error::configuration(
            format!("Malformed chatbots file {}: {err}", path.display()),
            Some(Box::new(err)),
        )
    })?;
    Ok(personas
        .into_iter()
        .map(Persona::expand_placeholders)
        .collect())
}
