// Public modules
pub mod message;
pub mod persona;
pub mod prompt_template;
pub mod retrieval;

// Re-exports
pub use message::{Message, Role};
pub use persona::{PROMPT_COMMANDS_PLACEHOLDER, Persona, builtin_personas, load_personas};
pub use prompt_template::PromptTemplate;
pub use retrieval::{RetrievalResult, WebSearchResult};
