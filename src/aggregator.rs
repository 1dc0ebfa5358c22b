//! Turns a backend reply into one piece of text.
//!
//! Streamed replies are drained chunk by chunk while a spinner advances on
//! every chunk; complete replies pass straight through.  Either way the caller
//! gets the trimmed text.

use std::time::Instant;

use futures::StreamExt;

use crate::observability::{STREAM_CHUNKS, STREAM_DURATION};
use crate::{ChatResponse, Error, Renderer, Result};

/// Braille spinner frames, drawn in order.
pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// A cycling progress indicator.
#[derive(Debug, Clone, Default)]
pub struct Spinner {
    index: usize,
}

impl Spinner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current frame and moves to the next one.
    pub fn advance(&mut self) -> &'static str {
        let frame = SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()];
        self.index = self.index.wrapping_add(1);
        frame
    }
}

/// Collects a reply into its full text.
///
/// A stream error aborts collection; the partial text is dropped and the error
/// is returned as [`Error::Streaming`].
///
/// ```
/// # tokio_test::block_on(async {
/// use ragchat::{ChatResponse, PlainTextRenderer, consume};
///
/// let mut renderer = PlainTextRenderer::with_color(false);
/// let reply = ChatResponse::Complete("  Hello!\n".to_string());
/// assert_eq!(consume(reply, &mut renderer).await.unwrap(), "Hello!");
/// # });
/// ```
pub async fn consume(response: ChatResponse, renderer: &mut dyn Renderer) -> Result<String> {
    let mut stream = match response {
        ChatResponse::Complete(text) => return Ok(text.trim().to_string()),
        ChatResponse::Stream(stream) => stream,
    };

    let start = Instant::now();
    let mut spinner = Spinner::new();
    let mut text = String::new();
    renderer.print_progress(spinner.advance());
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                STREAM_CHUNKS.click();
                text.push_str(&chunk);
                renderer.print_progress(spinner.advance());
            }
            Err(e) if e.is_streaming() => return Err(e),
            Err(e) => {
                return Err(Error::streaming(
                    format!("reply stream failed: {e}"),
                    Some(Box::new(e)),
                ));
            }
        }
    }
    STREAM_DURATION.add(start.elapsed().as_secs_f64());
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[derive(Default)]
    struct Frames(Vec<String>);

    impl Renderer for Frames {
        fn print_info(&mut self, _: &str) {}
        fn print_diagnostic(&mut self, _: &str) {}
        fn print_error(&mut self, _: &str) {}
        fn print_progress(&mut self, frame: &str) {
            self.0.push(frame.to_string());
        }
        fn print_response(&mut self, _: &str) {}
    }

    fn streamed(chunks: Vec<Result<String>>) -> ChatResponse {
        ChatResponse::Stream(Box::pin(stream::iter(chunks)))
    }

    #[test]
    fn spinner_wraps_around() {
        let mut spinner = Spinner::new();
        let frames: Vec<&str> = (0..11).map(|_| spinner.advance()).collect();
        assert_eq!(frames[0], "⠋");
        assert_eq!(frames[9], "⠏");
        assert_eq!(frames[10], "⠋");
    }

    #[tokio::test]
    async fn complete_reply_is_trimmed() {
        let mut renderer = Frames::default();
        let text = consume(ChatResponse::Complete("  hi \n".to_string()), &mut renderer)
            .await
            .unwrap();
        assert_eq!(text, "hi");
        assert!(renderer.0.is_empty());
    }

    #[tokio::test]
    async fn chunks_concatenate_in_order_and_spin() {
        let mut renderer = Frames::default();
        let response = streamed(vec![
            Ok("Hel".to_string()),
            Ok("lo".to_string()),
            Ok(" world\n".to_string()),
        ]);
        let text = consume(response, &mut renderer).await.unwrap();
        assert_eq!(text, "Hello world");
        assert_eq!(renderer.0, vec!["⠋", "⠙", "⠹", "⠸"]);
    }

    #[tokio::test]
    async fn stream_error_aborts() {
        let mut renderer = Frames::default();
        let response = streamed(vec![
            Ok("partial".to_string()),
            Err(Error::connection("reset by peer", None)),
            Ok("never".to_string()),
        ]);
        let err = consume(response, &mut renderer).await.unwrap_err();
        assert!(err.is_streaming());
    }
}
