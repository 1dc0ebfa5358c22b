//! Retrieval augmentation.
//!
//! Passages come back from the vector store most-relevant first.  They are
//! filtered by distance, formatted, and then reversed so the best passage ends
//! up closest to the question that follows it in the prompt.

use crate::observability::{
    RETRIEVAL_DISCARDS, RETRIEVAL_EMBEDDING_FALLBACKS, RETRIEVAL_ERRORS, RETRIEVAL_QUERIES,
    WEB_SEARCH_ERRORS, WEB_SEARCHES,
};
use crate::{
    CollectionHandle, Embedder, QueryInput, Renderer, RetrievalResult, VectorStore, WebSearch,
    WebSearchResult,
};

/// Knobs for one retrieval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalOptions {
    /// How many passages to ask the store for.
    pub top_k: usize,
    /// Maximum accepted distance; 0 disables filtering.
    pub threshold: f64,
    /// Report discards and fallbacks through the renderer.
    pub verbose: bool,
}

/// Formats one passage as `[title\n]document[\nURL: url][\nFile Path: path]`.
pub fn format_result(result: &RetrievalResult) -> String {
    let mut formatted = String::new();
    if let Some(title) = result.title() {
        formatted.push_str(title);
        formatted.push('\n');
    }
    formatted.push_str(&result.document);
    if let Some(url) = result.url() {
        formatted.push_str("\nURL: ");
        formatted.push_str(url);
    }
    if let Some(file_path) = result.file_path() {
        formatted.push_str("\nFile Path: ");
        formatted.push_str(file_path);
    }
    formatted.trim().to_string()
}

/// Filters, formats and reverses passages into one context block.
///
/// With `threshold > 0` every passage whose distance is strictly greater is
/// dropped and, in verbose mode, reported.
pub fn format_results(
    results: &[RetrievalResult],
    options: &RetrievalOptions,
    renderer: &mut dyn Renderer,
) -> String {
    let mut passages: Vec<String> = Vec::with_capacity(results.len());
    for result in results {
        if options.threshold > 0.0 && result.distance > options.threshold {
            RETRIEVAL_DISCARDS.click();
            if options.verbose {
                renderer.print_diagnostic(&format!(
                    "Skipping answer with distance: {}",
                    result.distance
                ));
            }
            continue;
        }
        passages.push(format_result(result));
    }
    passages.reverse();
    passages.join("\n\n")
}

/// Queries `collection` for `query` and returns the formatted context.
///
/// An embedder, when present, turns the query into a vector; if it fails the
/// query is sent as text instead.  A store failure is reported and yields an
/// empty context.
pub async fn retrieve(
    store: &dyn VectorStore,
    collection: &CollectionHandle,
    query: &str,
    embedder: Option<&dyn Embedder>,
    options: &RetrievalOptions,
    renderer: &mut dyn Renderer,
) -> String {
    RETRIEVAL_QUERIES.click();
    let input = match embedder {
        Some(embedder) => match embedder.encode(query).await {
            Ok(embedding) => QueryInput::Embedding(embedding),
            Err(e) => {
                RETRIEVAL_EMBEDDING_FALLBACKS.click();
                if options.verbose {
                    renderer.print_diagnostic(&format!(
                        "Embedding with {} failed, querying by text: {e}",
                        embedder.model()
                    ));
                }
                QueryInput::Text(query.to_string())
            }
        },
        None => QueryInput::Text(query.to_string()),
    };
    match store.query(collection, input, options.top_k).await {
        Ok(results) => format_results(&results, options, renderer),
        Err(e) => {
            RETRIEVAL_ERRORS.click();
            renderer.print_error(&format!(
                "Could not query collection {}: {e}",
                collection.name
            ));
            String::new()
        }
    }
}

/// Wraps a question with retrieved passages.
pub fn augment_with_context(question: &str, context: &str) -> String {
    format!(
        "Question: {question}\n\n\
         Answer truthfully using the text below; say 'I don't know' if absent.\n\n\
         {context}\n\n\
         Answer truthfully using the text above; say 'I don't know' if absent.\n\
         Question: {question}"
    )
}

/// Renders a provider summary and ranked results as one context block.
pub fn format_web_context(summary: &str, results: &[WebSearchResult]) -> String {
    let mut context = summary.to_string();
    if !results.is_empty() {
        context.push_str("\n\nSearch results:\n");
        for (i, result) in results.iter().enumerate() {
            context.push_str(&format!(
                "{}. {}\n{}\n{}\n\n",
                i + 1,
                result.title,
                result.body,
                result.url
            ));
        }
    }
    context
}

/// Looks `query` up on the web and returns the formatted context.
///
/// A provider failure is reported and yields an empty context.
pub async fn web_context(
    search: &dyn WebSearch,
    query: &str,
    max_results: usize,
    renderer: &mut dyn Renderer,
) -> String {
    WEB_SEARCHES.click();
    let summary = match search.chat(query).await {
        Ok(summary) => summary,
        Err(e) => {
            WEB_SEARCH_ERRORS.click();
            renderer.print_error(&format!("Web search failed: {e}"));
            return String::new();
        }
    };
    let results = match search.text_search(query, max_results).await {
        Ok(results) => results,
        Err(e) => {
            WEB_SEARCH_ERRORS.click();
            renderer.print_error(&format!("Web search failed: {e}"));
            Vec::new()
        }
    };
    format_web_context(&summary, &results)
}

/// Wraps a question with web search context.
pub fn augment_with_web(question: &str, context: &str) -> String {
    format!(
        "Question: {question}\n\n\
         {context}\n\n\
         Answer truthfully using the web search results above; say 'I don't know' if absent.\n\
         Cite some useful links from the search results to support your answer."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Result};

    #[derive(Default)]
    struct Diagnostics {
        lines: Vec<String>,
        errors: Vec<String>,
    }

    impl Renderer for Diagnostics {
        fn print_info(&mut self, _: &str) {}
        fn print_diagnostic(&mut self, text: &str) {
            self.lines.push(text.to_string());
        }
        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }
        fn print_progress(&mut self, _: &str) {}
        fn print_response(&mut self, _: &str) {}
    }

    fn options(threshold: f64, verbose: bool) -> RetrievalOptions {
        RetrievalOptions {
            top_k: 3,
            threshold,
            verbose,
        }
    }

    fn three() -> Vec<RetrievalResult> {
        vec![
            RetrievalResult::new("r1", 0.1),
            RetrievalResult::new("r2", 0.5),
            RetrievalResult::new("r3", 0.9),
        ]
    }

    #[test]
    fn full_format() {
        let result = RetrievalResult::new("  body  ", 0.0)
            .with_metadata("title", "Title")
            .with_metadata("url", "https://example.com")
            .with_metadata("filePath", "/docs/a.md");
        assert_eq!(
            format_result(&result),
            "Title\n  body  \nURL: https://example.com\nFile Path: /docs/a.md"
        );
        assert_eq!(format_result(&RetrievalResult::new(" bare \n", 0.0)), "bare");
    }

    #[test]
    fn reversed_most_relevant_last() {
        let mut renderer = Diagnostics::default();
        let context = format_results(&three(), &options(0.0, false), &mut renderer);
        assert_eq!(context, "r3\n\nr2\n\nr1");
    }

    #[test]
    fn zero_threshold_keeps_everything() {
        let mut renderer = Diagnostics::default();
        let results = vec![RetrievalResult::new("far", 1000.0)];
        assert_eq!(format_results(&results, &options(0.0, true), &mut renderer), "far");
        assert!(renderer.lines.is_empty());
    }

    #[test]
    fn threshold_drops_strictly_greater() {
        let mut renderer = Diagnostics::default();
        let context = format_results(&three(), &options(0.5, true), &mut renderer);
        assert_eq!(context, "r2\n\nr1");
        assert_eq!(renderer.lines, vec!["Skipping answer with distance: 0.9"]);
    }

    #[test]
    fn threshold_quiet_when_not_verbose() {
        let mut renderer = Diagnostics::default();
        let _ = format_results(&three(), &options(0.2, false), &mut renderer);
        assert!(renderer.lines.is_empty());
    }

    #[test]
    fn context_augmentation_text() {
        assert_eq!(
            augment_with_context("Q?", "CTX"),
            "Question: Q?\n\nAnswer truthfully using the text below; say 'I don't know' if absent.\n\nCTX\n\nAnswer truthfully using the text above; say 'I don't know' if absent.\nQuestion: Q?"
        );
    }

    #[test]
    fn web_context_numbering() {
        let results = vec![
            WebSearchResult {
                title: "A".to_string(),
                body: "a body".to_string(),
                url: "https://a".to_string(),
            },
            WebSearchResult {
                title: "B".to_string(),
                body: "b body".to_string(),
                url: "https://b".to_string(),
            },
        ];
        assert_eq!(
            format_web_context("Summary.", &results),
            "Summary.\n\nSearch results:\n1. A\na body\nhttps://a\n\n2. B\nb body\nhttps://b\n\n"
        );
        assert_eq!(format_web_context("Only summary", &[]), "Only summary");
    }

    #[test]
    fn web_augmentation_text() {
        assert_eq!(
            augment_with_web("Q?", "CTX"),
            "Question: Q?\n\nCTX\n\nAnswer truthfully using the web search results above; say 'I don't know' if absent.\nCite some useful links from the search results to support your answer."
        );
    }

    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl Embedder for FailingEmbedder {
        fn model(&self) -> &str {
            "all-minilm"
        }
        async fn encode(&self, _: &str) -> Result<Vec<f32>> {
            Err(Error::backend_unavailable("no embedder", None))
        }
    }

    struct TextOnlyStore;

    #[async_trait::async_trait]
    impl VectorStore for TextOnlyStore {
        async fn list_collections(&self) -> Result<Vec<String>> {
            Ok(vec!["docs".to_string()])
        }
        async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
            Ok(CollectionHandle::new("1", name))
        }
        async fn query(
            &self,
            _: &CollectionHandle,
            input: QueryInput,
            _: usize,
        ) -> Result<Vec<RetrievalResult>> {
            match input {
                QueryInput::Text(text) => Ok(vec![RetrievalResult::new(format!("hit for {text}"), 0.1)]),
                QueryInput::Embedding(_) => Err(Error::store_unavailable("unexpected embedding", None)),
            }
        }
    }

    #[tokio::test]
    async fn embedder_failure_falls_back_to_text() {
        let mut renderer = Diagnostics::default();
        let context = retrieve(
            &TextOnlyStore,
            &CollectionHandle::new("1", "docs"),
            "rust",
            Some(&FailingEmbedder),
            &options(0.0, true),
            &mut renderer,
        )
        .await;
        assert_eq!(context, "hit for rust");
        assert!(renderer.lines[0].starts_with("Embedding with all-minilm failed"));
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty() {
        struct Down;

        #[async_trait::async_trait]
        impl VectorStore for Down {
            async fn list_collections(&self) -> Result<Vec<String>> {
                Err(Error::store_unavailable("down", None))
            }
            async fn get_or_create_collection(&self, _: &str) -> Result<CollectionHandle> {
                Err(Error::store_unavailable("down", None))
            }
            async fn query(
                &self,
                _: &CollectionHandle,
                _: QueryInput,
                _: usize,
            ) -> Result<Vec<RetrievalResult>> {
                Err(Error::store_unavailable("down", None))
            }
        }

        let mut renderer = Diagnostics::default();
        let context = retrieve(
            &Down,
            &CollectionHandle::new("1", "docs"),
            "q",
            None,
            &options(0.0, false),
            &mut renderer,
        )
        .await;
        assert!(context.is_empty());
        assert_eq!(renderer.errors.len(), 1);
    }
}
