//! Configuration types for the chat application.
//!
//! `ChatArgs` is what `arrrg` parses off the command line.  `ChatConfig` is the
//! validated, defaulted form the binary wires collaborators from.
//! `SessionConfig` is the per-turn snapshot the session owns and the directive
//! handlers reassign.

use std::path::PathBuf;

use arrrg_derive::CommandLine;

use crate::backend::DEFAULT_OPENAI_MODEL;
use crate::search::DEFAULT_WEB_RESULTS;
use crate::{Error, PromptTemplate, Result};

const DEFAULT_CHROMA_HOST: &str = "localhost";
const DEFAULT_CHROMA_PORT: u16 = 8000;
const DEFAULT_OPENAI_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_SEARCH_RESULTS: usize = 1;

/// Command-line arguments for the ragchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    #[arrrg(optional, "ChromaDB host (default: localhost)", "HOST")]
    pub chroma_host: Option<String>,

    #[arrrg(optional, "ChromaDB port (default: 8000)", "PORT")]
    pub chroma_port: Option<u16>,

    #[arrrg(optional, "ChromaDB collection to load at startup", "NAME")]
    pub collection: Option<String>,

    #[arrrg(flag, "Use an OpenAI-compatible server instead of Ollama")]
    pub use_openai: bool,

    #[arrrg(optional, "OpenAI-compatible server URL (default: http://127.0.0.1:8080)", "URL")]
    pub openai_url: Option<String>,

    #[arrrg(optional, "Ollama server URL (default: http://localhost:11434)", "URL")]
    pub ollama_url: Option<String>,

    /// Kept as text so the struct can derive `Eq`.
    #[arrrg(optional, "Sampling temperature (default: 0)", "TEMP")]
    pub temperature: Option<String>,

    #[arrrg(flag, "The model does not support the system role")]
    pub disable_system_role: bool,

    #[arrrg(optional, "Prompt template: ChatML or Alpaca", "TEMPLATE")]
    pub prompt_template: Option<String>,

    #[arrrg(optional, "JSON file with additional chatbot personas", "PATH")]
    pub additional_chatbots: Option<String>,

    #[arrrg(flag, "Print retrieval and prompt diagnostics")]
    pub verbose: bool,

    #[arrrg(optional, "Embedding model for vector database queries", "MODEL")]
    pub embeddings_model: Option<String>,

    #[arrrg(optional, "System prompt that replaces the persona's", "PROMPT")]
    pub system_prompt: Option<String>,

    #[arrrg(optional, "Default number of passages for /search (default: 1)", "N")]
    pub search_results: Option<usize>,

    /// Kept as text so the struct can derive `Eq`.
    #[arrrg(optional, "Maximum distance of a retrieved passage, 0 to disable", "DIST")]
    pub distance_threshold: Option<String>,

    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Process-level configuration resolved from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub chroma_host: String,
    pub chroma_port: u16,
    pub collection: Option<String>,
    pub use_openai: bool,
    pub openai_url: String,
    pub ollama_url: String,
    pub temperature: f32,

    /// True unless the operator said the model rejects the system role.
    pub system_role: bool,

    pub prompt_template: PromptTemplate,
    pub additional_chatbots: Option<PathBuf>,
    pub verbose: bool,
    pub embeddings_model: Option<String>,

    /// Overrides the persona's system prompt.
    pub system_prompt: Option<String>,

    pub search_results: usize,
    pub distance_threshold: f64,
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Ollama at localhost:11434, ChromaDB at localhost:8000
    /// - Temperature 0, no prompt template, system role supported
    /// - One passage per search, no distance threshold
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            chroma_host: DEFAULT_CHROMA_HOST.to_string(),
            chroma_port: DEFAULT_CHROMA_PORT,
            collection: None,
            use_openai: false,
            openai_url: DEFAULT_OPENAI_URL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            temperature: 0.0,
            system_role: true,
            prompt_template: PromptTemplate::None,
            additional_chatbots: None,
            verbose: false,
            embeddings_model: None,
            system_prompt: None,
            search_results: DEFAULT_SEARCH_RESULTS,
            distance_threshold: 0.0,
            use_color: true,
        }
    }

    /// Sets the collection loaded at startup.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Talks to an OpenAI-compatible server at `url`.
    pub fn with_openai(mut self, url: impl Into<String>) -> Self {
        self.use_openai = true;
        self.openai_url = url.into();
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Marks the model as lacking the system role.
    pub fn without_system_role(mut self) -> Self {
        self.system_role = false;
        self
    }

    /// Sets the prompt template.
    pub fn with_prompt_template(mut self, template: PromptTemplate) -> Self {
        self.prompt_template = template;
        self
    }

    /// Sets the persona file.
    pub fn with_additional_chatbots(mut self, path: impl Into<PathBuf>) -> Self {
        self.additional_chatbots = Some(path.into());
        self
    }

    /// Enables verbose diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the embedding model.
    pub fn with_embeddings_model(mut self, model: impl Into<String>) -> Self {
        self.embeddings_model = Some(model.into());
        self
    }

    /// Sets the system prompt override.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the default passage count for `/search`.
    pub fn with_search_results(mut self, n: usize) -> Self {
        self.search_results = n;
        self
    }

    /// Sets the distance threshold.
    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The system prompt that replaces the persona's at startup, if any.
    ///
    /// An OpenAI-compatible server without a system role starts with no
    /// system prompt at all unless one is given on the command line.
    pub fn initial_system_prompt(&self) -> Option<String> {
        match &self.system_prompt {
            Some(prompt) => Some(prompt.clone()),
            None if self.use_openai && !self.system_role => Some(String::new()),
            None => None,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::configuration(format!("--{flag} expects a number, got {value:?}"), None))
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let defaults = ChatConfig::new();
        let temperature = match args.temperature {
            Some(t) => parse_number::<f32>("temperature", &t)?,
            None => defaults.temperature,
        };
        let distance_threshold = match args.distance_threshold {
            Some(d) => parse_number::<f64>("distance-threshold", &d)?,
            None => defaults.distance_threshold,
        };
        if distance_threshold < 0.0 || !distance_threshold.is_finite() {
            return Err(Error::configuration(
                "--distance-threshold must be a non-negative number",
                None,
            ));
        }
        let prompt_template = match args.prompt_template {
            Some(t) => t.parse::<PromptTemplate>()?,
            None => defaults.prompt_template,
        };

        Ok(ChatConfig {
            chroma_host: args.chroma_host.unwrap_or(defaults.chroma_host),
            chroma_port: args.chroma_port.unwrap_or(defaults.chroma_port),
            collection: args.collection.filter(|c| !c.is_empty()),
            use_openai: args.use_openai,
            openai_url: args.openai_url.unwrap_or(defaults.openai_url),
            ollama_url: args.ollama_url.unwrap_or(defaults.ollama_url),
            temperature,
            system_role: !args.disable_system_role,
            prompt_template,
            additional_chatbots: args.additional_chatbots.map(PathBuf::from),
            verbose: args.verbose,
            embeddings_model: args.embeddings_model.filter(|m| !m.is_empty()),
            system_prompt: args.system_prompt,
            search_results: args.search_results.unwrap_or(defaults.search_results),
            distance_threshold,
            use_color: !args.no_color,
        })
    }
}

/// The settings one turn runs with.
///
/// Each field is reassigned only by its directive handler, and always as a
/// whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// The model every request goes to.
    pub model: String,

    /// Index into the session's persona list.
    pub persona: usize,

    /// The collection `/search` queries.
    pub collection: Option<String>,

    pub temperature: f32,
    pub prompt_template: PromptTemplate,
    pub verbose: bool,

    /// False when the system message must be folded into the first user turn.
    pub system_role: bool,

    /// Passages per `/search` when no count is given.
    pub search_results: usize,

    /// Maximum passage distance; 0 disables filtering.
    pub distance_threshold: f64,

    /// Results per `/web` lookup.
    pub web_results: usize,

    /// Ask the backend for a streamed reply.
    pub stream: bool,
}

impl SessionConfig {
    /// Snapshots `config` for a session talking to `model`.
    pub fn new(config: &ChatConfig, model: impl Into<String>) -> Self {
        let model = model.into();
        let system_role = config.system_role && !crate::backend::model_lacks_system_role(&model);
        Self {
            model,
            persona: 0,
            collection: config.collection.clone(),
            temperature: config.temperature,
            prompt_template: config.prompt_template,
            verbose: config.verbose,
            system_role,
            search_results: config.search_results,
            distance_threshold: config.distance_threshold,
            web_results: DEFAULT_WEB_RESULTS,
            stream: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(&ChatConfig::new(), DEFAULT_OPENAI_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.chroma_host, "localhost");
        assert_eq!(config.chroma_port, 8000);
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.openai_url, "http://127.0.0.1:8080");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.search_results, 1);
        assert_eq!(config.distance_threshold, 0.0);
        assert!(config.system_role);
        assert!(config.use_color);
        assert!(!config.use_openai);
        assert_eq!(config.prompt_template, PromptTemplate::None);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            chroma_host: Some("vectors".to_string()),
            chroma_port: Some(9000),
            collection: Some("docs".to_string()),
            use_openai: true,
            temperature: Some("0.7".to_string()),
            disable_system_role: true,
            prompt_template: Some("chatml".to_string()),
            additional_chatbots: Some("chatbots.json".to_string()),
            search_results: Some(4),
            distance_threshold: Some("0.35".to_string()),
            no_color: true,
            ..ChatArgs::default()
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.chroma_host, "vectors");
        assert_eq!(config.chroma_port, 9000);
        assert_eq!(config.collection.as_deref(), Some("docs"));
        assert!(config.use_openai);
        assert_eq!(config.temperature, 0.7);
        assert!(!config.system_role);
        assert_eq!(config.prompt_template, PromptTemplate::ChatML);
        assert_eq!(config.additional_chatbots, Some(PathBuf::from("chatbots.json")));
        assert_eq!(config.search_results, 4);
        assert_eq!(config.distance_threshold, 0.35);
        assert!(!config.use_color);
    }

    #[test]
    fn bad_numbers_are_configuration_errors() {
        let args = ChatArgs {
            temperature: Some("warm".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).unwrap_err().is_configuration());

        let args = ChatArgs {
            distance_threshold: Some("-1".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).unwrap_err().is_configuration());

        let args = ChatArgs {
            prompt_template: Some("vicuna".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).unwrap_err().is_configuration());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_collection("docs")
            .with_openai("http://gpu:8080")
            .with_temperature(0.2)
            .without_system_role()
            .with_prompt_template(PromptTemplate::Alpaca)
            .with_additional_chatbots("personas.json")
            .with_verbose(true)
            .with_embeddings_model("all-minilm")
            .with_system_prompt("Be brief.")
            .with_search_results(3)
            .with_distance_threshold(0.5)
            .without_color();
        assert_eq!(config.collection.as_deref(), Some("docs"));
        assert!(config.use_openai);
        assert_eq!(config.openai_url, "http://gpu:8080");
        assert!(!config.system_role);
        assert_eq!(config.prompt_template, PromptTemplate::Alpaca);
        assert_eq!(config.embeddings_model.as_deref(), Some("all-minilm"));
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(config.search_results, 3);
        assert_eq!(config.distance_threshold, 0.5);
        assert!(!config.use_color);
    }

    #[test]
    fn openai_without_system_role_starts_without_system_prompt() {
        let config = ChatConfig::new()
            .with_openai("http://127.0.0.1:8080")
            .without_system_role();
        assert_eq!(config.initial_system_prompt(), Some(String::new()));

        let config = config.with_system_prompt("Be brief.");
        assert_eq!(config.initial_system_prompt(), Some("Be brief.".to_string()));

        let config = ChatConfig::new().without_system_role();
        assert_eq!(config.initial_system_prompt(), None);
    }

    #[test]
    fn session_config_snapshot() {
        let config = ChatConfig::new().with_verbose(true).with_search_results(2);
        let session = SessionConfig::new(&config, "phi3:mini");
        assert_eq!(session.model, "phi3:mini");
        assert_eq!(session.persona, 0);
        assert!(session.verbose);
        assert!(session.system_role);
        assert_eq!(session.search_results, 2);
        assert_eq!(session.web_results, 10);
        assert!(session.stream);
    }

    #[test]
    fn gemma_model_disables_system_role() {
        let session = SessionConfig::new(&ChatConfig::new(), "gemma:7b");
        assert!(!session.system_role);
    }
}
