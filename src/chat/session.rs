//! Core chat session management.
//!
//! `ChatSession` owns the conversation and the per-turn settings and composes
//! the directive parser, the retrieval pipeline, the prompt templates and the
//! reply aggregator into one turn.  Nothing that goes wrong inside a turn
//! escapes it: the error is rendered as one line and the session waits for
//! the next input.

use std::fs;

use crate::chat::commands::{self, Directive};
use crate::chat::config::SessionConfig;
use crate::observability::{SESSION_DIRECTIVES, SESSION_TURN_ERRORS, SESSION_TURNS};
use crate::rag::{self, RetrievalOptions};
use crate::template::{apply, merge_system_into_first_user};
use crate::{
    ChatBackend, ChatOptions, Clipboard, CollectionHandle, Conversation, Embedder, Error, Message,
    ModelInfo, Persona, PromptTemplate, Renderer, Result, Role, VectorStore, WebSearch,
    builtin_personas, consume,
};

/// The person at the keyboard.
pub trait Operator {
    /// Reads one line of input; `None` means end of input.
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    /// Asks for one of `options`; `None` means no choice was made.
    fn choose(&mut self, title: &str, options: &[String], default: usize) -> Option<usize>;
}

/// What a line of input led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The line was blank.
    Skipped,
    /// A directive was handled and nothing was sent.
    Handled,
    /// The backend replied with this text.
    Replied(String),
    /// The turn failed; the error has been rendered.
    Failed,
    /// The operator ended the session.
    Exit,
}

/// A chat session with one backend and optional retrieval collaborators.
pub struct ChatSession {
    backend: Box<dyn ChatBackend>,
    store: Option<Box<dyn VectorStore>>,
    collection: Option<CollectionHandle>,
    embedder: Option<Box<dyn Embedder>>,
    web: Option<Box<dyn WebSearch>>,
    clipboard: Option<Box<dyn Clipboard>>,
    personas: Vec<Persona>,
    operator_name: Option<String>,
    system_prompt: Option<String>,
    conversation: Conversation,
    config: SessionConfig,
}

impl ChatSession {
    /// Creates a session; an empty persona list falls back to the built-ins.
    pub fn new(backend: Box<dyn ChatBackend>, personas: Vec<Persona>, config: SessionConfig) -> Self {
        let personas = if personas.is_empty() {
            builtin_personas()
        } else {
            personas
        };
        let mut config = config;
        if config.persona >= personas.len() {
            config.persona = 0;
        }
        let mut session = Self {
            backend,
            store: None,
            collection: None,
            embedder: None,
            web: None,
            clipboard: None,
            personas,
            operator_name: None,
            system_prompt: None,
            conversation: Conversation::new(),
            config,
        };
        session.reset();
        session
    }

    /// Attaches a vector store for `/search` and `/collection`.
    pub fn with_store(mut self, store: Box<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attaches an embedding model for `/search` queries.
    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Attaches a web search provider for `/web`.
    pub fn with_web_search(mut self, web: Box<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    /// Attaches a clipboard for `/cb`.
    pub fn with_clipboard(mut self, clipboard: Box<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// Names the operator in the system prompt.
    pub fn with_operator_name(mut self, name: Option<String>) -> Self {
        self.operator_name = name.filter(|n| !n.trim().is_empty());
        self.reset();
        self
    }

    /// Replaces the persona's system prompt until the next persona switch.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self.reset();
        self
    }

    /// The conversation so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The active settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The active model.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// The personas on offer.
    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    /// The active persona.
    pub fn persona(&self) -> &Persona {
        &self.personas[self.config.persona]
    }

    /// The loaded collection, if any.
    pub fn collection(&self) -> Option<&CollectionHandle> {
        self.collection.as_ref()
    }

    /// Reads lines from `operator` until end of input or an exit phrase.
    pub async fn run(&mut self, operator: &mut dyn Operator, renderer: &mut dyn Renderer) {
        loop {
            let Some(line) = operator.read_line(&renderer.input_prompt()) else {
                renderer.print_info("Goodbye!");
                return;
            };
            if self.handle_input(&line, operator, renderer).await == TurnOutcome::Exit {
                return;
            }
        }
    }

    /// Processes one line of input.
    pub async fn handle_input(
        &mut self,
        line: &str,
        operator: &mut dyn Operator,
        renderer: &mut dyn Renderer,
    ) -> TurnOutcome {
        if line.trim().is_empty() {
            return TurnOutcome::Skipped;
        }
        SESSION_TURNS.click();
        match self.turn(line, operator, renderer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                SESSION_TURN_ERRORS.click();
                renderer.print_error(&e.to_string());
                TurnOutcome::Failed
            }
        }
    }

    async fn turn(
        &mut self,
        line: &str,
        operator: &mut dyn Operator,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnOutcome> {
        let directives = commands::parse_directives(line);
        SESSION_DIRECTIVES.count(directives.len() as u64);

        let mut input = line.to_string();
        for directive in directives {
            match directive {
                Directive::Exit => {
                    renderer.print_info("Goodbye!");
                    return Ok(TurnOutcome::Exit);
                }
                Directive::Reset => {
                    self.reset();
                    renderer.print_info("Conversation reset.");
                }
                Directive::File => input = read_file(&input)?,
                Directive::Verbose => {
                    self.config.verbose = !self.config.verbose;
                    renderer.print_diagnostic(&format!("Verbose mode: {}", self.config.verbose));
                }
                Directive::Search => input = self.augment_with_store(&input, operator, renderer).await,
                Directive::Web => input = self.augment_with_web(&input, renderer).await,
                Directive::Model => self.select_model(operator, renderer).await?,
                Directive::Collection => self.select_collection(operator, renderer).await?,
                Directive::Chatbot => self.select_persona(operator, renderer).await?,
                Directive::Clipboard => input = self.paste_clipboard(&input, renderer)?,
            }
            if directive.stops_turn() {
                return Ok(TurnOutcome::Handled);
            }
        }

        let reply = self.send(input, renderer).await?;
        Ok(TurnOutcome::Replied(reply))
    }

    /// Reverts the conversation to the active persona's system message.
    pub fn reset(&mut self) {
        let system = self.system_message();
        self.conversation.reset(system);
    }

    fn system_message(&self) -> Option<Message> {
        let mut prompt = match &self.system_prompt {
            Some(prompt) => prompt.clone(),
            None => self.persona().system_prompt.clone(),
        };
        if self.config.system_role
            && let Some(name) = &self.operator_name
        {
            prompt.push_str(&format!("\nYou are talking with {name}"));
        }
        (!prompt.is_empty()).then(|| Message::system(prompt))
    }

    /// The messages as they go over the wire for the active model.
    ///
    /// The system merge applies to every backend; template framing only to
    /// backends that take it from the client.  The history is left untouched.
    pub fn outgoing_messages(&self) -> Vec<Message> {
        let messages = if self.config.system_role {
            self.conversation.messages().to_vec()
        } else {
            merge_system_into_first_user(self.conversation.messages())
        };
        apply(&messages, self.prompt_template())
    }

    fn prompt_template(&self) -> PromptTemplate {
        if self.backend.uses_prompt_template() {
            self.config.prompt_template
        } else {
            PromptTemplate::None
        }
    }

    async fn send(&mut self, input: String, renderer: &mut dyn Renderer) -> Result<String> {
        let rollback = self.conversation.len();
        self.conversation.append(Role::User, input)?;
        match self.request(renderer).await {
            Ok(reply) => {
                renderer.print_response(&reply);
                self.conversation.append(Role::Assistant, reply.clone())?;
                Ok(reply)
            }
            Err(e) => {
                self.conversation.truncate(rollback);
                Err(e)
            }
        }
    }

    async fn request(&self, renderer: &mut dyn Renderer) -> Result<String> {
        let messages = self.outgoing_messages();
        let options = ChatOptions::new(self.config.model.clone())
            .with_temperature(self.config.temperature)
            .with_stream(self.config.stream);
        if self.config.verbose && self.prompt_template() != PromptTemplate::None {
            renderer.print_diagnostic(&format!(
                "Using {} backend with prompt template: {}",
                self.backend.name(),
                self.config.prompt_template
            ));
        }
        let response = self.backend.chat(&messages, &options).await?;
        consume(response, renderer).await
    }

    async fn augment_with_store(
        &mut self,
        input: &str,
        operator: &mut dyn Operator,
        renderer: &mut dyn Renderer,
    ) -> String {
        let (top_k, question) = commands::extract_search_count(input, self.config.search_results);
        if self.store.is_none() {
            renderer.print_error("No vector database available.");
            return question;
        }
        if self.collection.is_none() {
            renderer.print_error("No ChromaDB collection loaded.");
            if let Err(e) = self.select_collection(operator, renderer).await {
                renderer.print_error(&e.to_string());
            }
        }
        let (Some(store), Some(collection)) = (&self.store, &self.collection) else {
            return question;
        };
        let options = RetrievalOptions {
            top_k,
            threshold: self.config.distance_threshold,
            verbose: self.config.verbose,
        };
        let context = rag::retrieve(
            store.as_ref(),
            collection,
            &question,
            self.embedder.as_deref(),
            &options,
            renderer,
        )
        .await;
        if context.is_empty() {
            return question;
        }
        let augmented = rag::augment_with_context(&question, &context);
        if self.config.verbose {
            renderer.print_diagnostic(&augmented);
        }
        augmented
    }

    async fn augment_with_web(&self, input: &str, renderer: &mut dyn Renderer) -> String {
        let question = commands::strip_web(input);
        let Some(web) = &self.web else {
            renderer.print_error("No web search provider available.");
            return question;
        };
        let context = rag::web_context(web.as_ref(), &question, self.config.web_results, renderer).await;
        if context.is_empty() {
            return question;
        }
        let augmented = rag::augment_with_web(&question, &context);
        if self.config.verbose {
            renderer.print_diagnostic(&augmented);
        }
        augmented
    }

    fn paste_clipboard(&self, input: &str, renderer: &mut dyn Renderer) -> Result<String> {
        let Some(clipboard) = &self.clipboard else {
            return Ok(input.to_string());
        };
        let text = clipboard.read_text()?;
        renderer.print_diagnostic("Clipboard content added to user input.");
        Ok(commands::paste_clipboard(input, &text))
    }

    /// Uses the active persona's preferred model when the backend has it and
    /// asks the operator otherwise.
    pub async fn activate_preferred_model(
        &mut self,
        operator: &mut dyn Operator,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let preferred = self.persona().preferred_model.clone();
        let models = self.backend.list_models().await?;
        if models.iter().any(|m| m.name == preferred) {
            self.set_model(&preferred, renderer);
            return Ok(());
        }
        renderer.print_error(&format!("Model {preferred} not found."));
        self.choose_model(&models, operator, renderer)
    }

    /// Lets the operator pick a model from the backend's list.
    pub async fn select_model(
        &mut self,
        operator: &mut dyn Operator,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let models = self.backend.list_models().await?;
        self.choose_model(&models, operator, renderer)
    }

    fn choose_model(
        &mut self,
        models: &[ModelInfo],
        operator: &mut dyn Operator,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        if models.is_empty() {
            return Err(Error::backend_unavailable(
                format!("{} lists no models", self.backend.name()),
                None,
            ));
        }
        let preferred = &self.persona().preferred_model;
        let default = models
            .iter()
            .position(|m| &m.name == preferred)
            .unwrap_or(0);
        let labels: Vec<String> = models.iter().map(ModelInfo::label).collect();
        let Some(choice) = operator.choose("Available models:", &labels, default) else {
            return Ok(());
        };
        let model = models
            .get(choice)
            .ok_or_else(|| Error::user_input(format!("There is no model number {choice}.")))?;
        let name = model.name.clone();
        self.set_model(&name, renderer);
        Ok(())
    }

    /// Switches the model; models without a system role turn it off for good.
    pub fn set_model(&mut self, model: &str, renderer: &mut dyn Renderer) {
        if crate::backend::model_lacks_system_role(model) && self.config.system_role {
            self.config.system_role = false;
            renderer.print_info(
                "The selected model does not support the 'system' role. \
                 Merging the system message with the first user message.",
            );
        }
        self.config.model = model.to_string();
        if self.config.verbose {
            renderer.print_diagnostic(&format!("Selected model: {model}"));
        }
    }

    /// Lets the operator pick a collection from the store.
    pub async fn select_collection(
        &mut self,
        operator: &mut dyn Operator,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let Some(store) = &self.store else {
            return Err(Error::store_unavailable("no vector database configured", None));
        };
        let names = store.list_collections().await?;
        if names.is_empty() {
            renderer.print_error("No collections found.");
            return Ok(());
        }
        let Some(choice) = operator.choose("Available collections:", &names, 0) else {
            return Ok(());
        };
        let name = names
            .get(choice)
            .ok_or_else(|| Error::user_input(format!("There is no collection number {choice}.")))?
            .clone();
        self.load_collection(&name, renderer).await
    }

    /// Loads the named collection, creating it when absent.
    pub async fn load_collection(&mut self, name: &str, renderer: &mut dyn Renderer) -> Result<()> {
        let Some(store) = &self.store else {
            return Err(Error::store_unavailable("no vector database configured", None));
        };
        let handle = store.get_or_create_collection(name).await?;
        renderer.print_info(&format!("Collection {} loaded.", handle.name));
        self.config.collection = Some(handle.name.clone());
        self.collection = Some(handle);
        Ok(())
    }

    async fn select_persona(
        &mut self,
        operator: &mut dyn Operator,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let labels: Vec<String> = self
            .personas
            .iter()
            .map(|p| format!("{} - {}", p.name, p.description))
            .collect();
        let Some(choice) = operator.choose("Available chatbots:", &labels, 0) else {
            return Ok(());
        };
        self.switch_persona(choice, renderer).await
    }

    /// Activates a persona and restarts the conversation under its prompt.
    ///
    /// The persona's preferred model becomes active when the backend lists
    /// it.  Switching to the active persona again changes nothing further.
    pub async fn switch_persona(&mut self, index: usize, renderer: &mut dyn Renderer) -> Result<()> {
        let Some(persona) = self.personas.get(index) else {
            return Err(Error::user_input(format!("There is no chatbot number {index}.")));
        };
        let preferred = persona.preferred_model.clone();
        self.config.persona = index;
        self.system_prompt = None;

        if self.config.model != preferred {
            match self.backend.list_models().await {
                Ok(models) if models.iter().any(|m| m.name == preferred) => {
                    self.set_model(&preferred, renderer);
                }
                Ok(_) => {}
                Err(e) => {
                    if self.config.verbose {
                        renderer.print_diagnostic(&format!("Could not list models: {e}"));
                    }
                }
            }
        }

        self.reset();
        renderer.print_info("Conversation reset.");
        Ok(())
    }
}

/// Appends the file named after `/file` to the input.
fn read_file(input: &str) -> Result<String> {
    let Some(path) = commands::file_path(input) else {
        return Err(Error::user_input("/file needs the path of a file to load."));
    };
    let contents = fs::read_to_string(path)
        .map_err(|_| Error::user_input(format!("File not found: {path}. Please try again.")))?;
    Ok(commands::append_file(input, &contents))
}
