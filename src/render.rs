//! Terminal output for the chat session.
//!
//! The session never writes to the terminal itself; everything the operator
//! sees goes through a [`Renderer`] so tests can record it and `--no-color`
//! can strip the styling.

use std::io::{self, Stdout, Write};

/// ANSI escape code for dim text (used for diagnostics).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for yellow text (used for the input prompt).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Label written in front of every reply.
const BOT_LABEL: &str = "Bot: ";

/// Label of the operator's input prompt.
const YOU_LABEL: &str = "You: ";

/// Sink for everything the session shows the operator.
pub trait Renderer: Send {
    /// The text shown when asking for the next line of input.
    fn input_prompt(&self) -> String {
        YOU_LABEL.to_string()
    }

    /// Print a status line such as "Conversation reset.".
    fn print_info(&mut self, info: &str);

    /// Print verbose-mode detail: discarded passages, augmented prompts.
    fn print_diagnostic(&mut self, text: &str);

    /// Print a single-line error.
    fn print_error(&mut self, error: &str);

    /// Redraw the spinner while a reply is streaming.
    fn print_progress(&mut self, frame: &str);

    /// Print the finished reply.
    fn print_response(&mut self, text: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    fn style(&self, color: &str, text: &str) -> String {
        if self.use_color {
            format!("{color}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn input_prompt(&self) -> String {
        format!("\n{}", self.style(ANSI_YELLOW, YOU_LABEL))
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
        self.flush();
    }

    fn print_diagnostic(&mut self, text: &str) {
        println!("{}", self.style(ANSI_DIM, text));
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("{}", self.style(ANSI_RED, error));
    }

    fn print_progress(&mut self, frame: &str) {
        print!("\r{BOT_LABEL}{frame}");
        self.flush();
    }

    fn print_response(&mut self, text: &str) {
        println!("\r{BOT_LABEL}{text}");
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
        assert_eq!(renderer.input_prompt(), "\n\x1b[33mYou: \x1b[0m");
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
        assert_eq!(renderer.style(ANSI_RED, "boom"), "boom");
        assert_eq!(renderer.input_prompt(), "\nYou: ");
    }
}
