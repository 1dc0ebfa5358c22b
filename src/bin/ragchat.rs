//! Interactive chat with local or OpenAI-compatible models.
//!
//! Lines are sent to the model as they are typed; in-band directives pull in
//! files, clipboard text, vector store passages, or web results first.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local Ollama server
//! ragchat
//!
//! # Load a ChromaDB collection and embed queries with a local model
//! ragchat --collection docs --embeddings-model nomic-embed-text
//!
//! # Use an OpenAI-compatible server
//! ragchat --use-openai --openai-url http://127.0.0.1:8080
//! ```

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use ragchat::backend::{DEFAULT_OPENAI_MODEL, Ollama, OllamaEmbedder, OpenAiCompatible};
use ragchat::chat::{ChatArgs, ChatConfig, ChatSession, Operator, SessionConfig, operator_name};
use ragchat::{
    ChatBackend, Chroma, DuckDuckGo, Persona, PlainTextRenderer, Renderer, SystemClipboard,
    VectorStore, builtin_personas, load_personas,
};

/// Reads operator input through rustyline.
struct Terminal {
    editor: DefaultEditor,
}

impl Operator for Terminal {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Some(line)
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => None,
            Err(err) => {
                eprintln!("Error reading input: {err}");
                None
            }
        }
    }

    fn choose(&mut self, title: &str, options: &[String], default: usize) -> Option<usize> {
        println!("{title}");
        for (index, option) in options.iter().enumerate() {
            println!("{index}: {option}");
        }
        let line = self
            .editor
            .readline(&format!("Enter number (default {default}): "))
            .ok()?;
        let line = line.trim();
        if line.is_empty() {
            return Some(default);
        }
        match line.parse::<usize>() {
            Ok(choice) if choice < options.len() => Some(choice),
            _ => {
                eprintln!("Invalid choice: {line}");
                None
            }
        }
    }
}

fn personas(config: &ChatConfig, renderer: &mut dyn Renderer) -> Vec<Persona> {
    let mut personas = builtin_personas();
    if let Some(path) = &config.additional_chatbots {
        match load_personas(path) {
            Ok(more) => personas.extend(more),
            Err(err) => renderer.print_error(&err.to_string()),
        }
    }
    personas
}

fn backend(config: &ChatConfig) -> ragchat::Result<Box<dyn ChatBackend>> {
    if config.use_openai {
        Ok(Box::new(OpenAiCompatible::with_base_url(&config.openai_url)?))
    } else {
        Ok(Box::new(Ollama::with_base_url(&config.ollama_url)?))
    }
}

/// Main entry point for the ragchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("ragchat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let personas = personas(&config, &mut renderer);
    let model = if config.use_openai {
        DEFAULT_OPENAI_MODEL.to_string()
    } else {
        personas[0].preferred_model.clone()
    };
    let session_config = SessionConfig::new(&config, model);
    let mut session = ChatSession::new(backend(&config)?, personas, session_config)
        .with_clipboard(Box::new(SystemClipboard))
        .with_operator_name(operator_name())
        .with_system_prompt(config.initial_system_prompt());
    if config.use_openai && !config.system_role {
        renderer.print_info("The selected model does not support the 'system' role.");
    }

    match DuckDuckGo::new() {
        Ok(web) => session = session.with_web_search(Box::new(web)),
        Err(err) => renderer.print_error(&err.to_string()),
    }

    let store = Chroma::new(&config.chroma_host, config.chroma_port)?;
    match store.list_collections().await {
        Ok(_) => session = session.with_store(Box::new(store)),
        Err(err) => renderer.print_error(&err.to_string()),
    }

    if let Some(model) = &config.embeddings_model {
        session = session.with_embedder(Box::new(OllamaEmbedder::new(&config.ollama_url, model.clone())?));
    }

    let mut terminal = Terminal {
        editor: DefaultEditor::new()?,
    };

    if !config.use_openai
        && let Err(err) = session
            .activate_preferred_model(&mut terminal, &mut renderer)
            .await
    {
        renderer.print_error(&err.to_string());
    }

    if let Some(name) = &config.collection
        && let Err(err) = session.load_collection(name, &mut renderer).await
    {
        renderer.print_error(&err.to_string());
    }

    renderer.print_info(&format!(
        "ragchat (model: {}, chatbot: {})",
        session.model(),
        session.persona().name
    ));
    renderer.print_info("Type quit, exit, or bye to leave.");

    session.run(&mut terminal, &mut renderer).await;
    Ok(())
}
