// Public modules
pub mod aggregator;
pub mod backend;
pub mod chat;
pub mod clipboard;
pub mod error;
pub mod history;
pub mod rag;
pub mod render;
pub mod search;
pub mod store;
pub mod template;
pub mod types;

mod observability;
mod sse;

// Re-exports
pub use aggregator::{SPINNER_FRAMES, Spinner, consume};
pub use backend::{ChatBackend, ChatOptions, ChatResponse, ChunkStream, ModelInfo};
pub use clipboard::{Clipboard, SystemClipboard};
pub use error::{Error, Result};
pub use history::Conversation;
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use search::{DuckDuckGo, WebSearch};
pub use store::{Chroma, CollectionHandle, Embedder, QueryInput, VectorStore};
pub use template::{apply as apply_template, merge_system_into_first_user};
pub use types::*;
