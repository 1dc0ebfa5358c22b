//! In-band directive parsing for the chat application.
//!
//! Directives may appear anywhere in a line of input.  Exit and reset phrases
//! must make up the whole line; every other directive is a `/token` found by
//! substring.  Detection runs once on the raw line, before any rewriting, so
//! text pulled in from a file or the clipboard can never trigger a directive.

use std::sync::LazyLock;

use regex::Regex;

/// A directive found in a line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// End the session.
    Exit,

    /// Drop every turn and keep only the persona's system message.
    Reset,

    /// Append the contents of a file to the input.
    File,

    /// Toggle verbose diagnostics.
    Verbose,

    /// Augment the input with passages from the vector store.
    Search,

    /// Augment the input with web search results.
    Web,

    /// Pick a different model.
    Model,

    /// Pick a different vector store collection.
    Collection,

    /// Pick a different persona.
    Chatbot,

    /// Splice the clipboard contents into the input.
    Clipboard,
}

impl Directive {
    /// True for directives that end the turn before anything is sent.
    pub fn stops_turn(self) -> bool {
        !matches!(
            self,
            Directive::File | Directive::Search | Directive::Web | Directive::Clipboard
        )
    }
}

enum Matcher {
    /// The whole trimmed line, case-insensitively, with or without a leading `/`.
    Phrase(&'static [&'static str]),
    /// A token anywhere in the line.
    Token(&'static str),
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Phrase(phrases) => {
                let line = line.trim().to_lowercase();
                let bare = line.strip_prefix('/').unwrap_or(&line);
                phrases.contains(&bare)
            }
            Matcher::Token(token) => line.contains(token),
        }
    }
}

struct Rule {
    matcher: Matcher,
    directive: Directive,
}

const FILE_TOKEN: &str = "/file";
const SEARCH_TOKEN: &str = "/search";
const WEB_TOKEN: &str = "/web";
const CLIPBOARD_TOKEN: &str = "/cb";

/// Directive rules in priority order.
const RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::Phrase(&["quit", "exit", "bye"]),
        directive: Directive::Exit,
    },
    Rule {
        matcher: Matcher::Phrase(&["reset", "clear", "restart"]),
        directive: Directive::Reset,
    },
    Rule {
        matcher: Matcher::Token(FILE_TOKEN),
        directive: Directive::File,
    },
    Rule {
        matcher: Matcher::Token("/verbose"),
        directive: Directive::Verbose,
    },
    Rule {
        matcher: Matcher::Token(SEARCH_TOKEN),
        directive: Directive::Search,
    },
    Rule {
        matcher: Matcher::Token(WEB_TOKEN),
        directive: Directive::Web,
    },
    Rule {
        matcher: Matcher::Token("/model"),
        directive: Directive::Model,
    },
    Rule {
        matcher: Matcher::Token("/collection"),
        directive: Directive::Collection,
    },
    Rule {
        matcher: Matcher::Token("/chatbot"),
        directive: Directive::Chatbot,
    },
    Rule {
        matcher: Matcher::Token(CLIPBOARD_TOKEN),
        directive: Directive::Clipboard,
    },
];

static SEARCH_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/search(?:\s+(\d+))?").expect("Invalid search regex"));

/// A directive token standing as its own word.
static DIRECTIVE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s(?:/file|/verbose|/search|/web|/model|/collection|/chatbot|/cb)(?:\s|$)")
        .expect("Invalid directive regex")
});

/// Finds the directives in `line`, in priority order.
///
/// An exit or reset phrase is returned alone.  `/search` and `/web` never both
/// appear; `/search` wins.
pub fn parse_directives(line: &str) -> Vec<Directive> {
    let mut directives = Vec::new();
    for rule in RULES {
        if !rule.matcher.matches(line) {
            continue;
        }
        if let Matcher::Phrase(_) = rule.matcher {
            return vec![rule.directive];
        }
        if rule.directive == Directive::Web && directives.contains(&Directive::Search) {
            continue;
        }
        directives.push(rule.directive);
    }
    directives
}

/// The path following `/file`, up to the next directive word or end of line.
///
/// A directive token inside a path component (`/home/me/website`) does not
/// end the path; only a token standing as its own word does.
pub fn file_path(line: &str) -> Option<&str> {
    let start = line.find(FILE_TOKEN)? + FILE_TOKEN.len();
    let rest = &line[start..];
    let end = DIRECTIVE_WORD
        .find(rest)
        .map(|word| word.start())
        .unwrap_or(rest.len());
    Some(rest[..end].trim()).filter(|path| !path.is_empty())
}

/// Removes the `/file` token and appends `contents` after a newline.
pub fn append_file(line: &str, contents: &str) -> String {
    format!("{}\n{contents}", remove_token(line, FILE_TOKEN))
}

/// Removes `/web` from the line.
pub fn strip_web(line: &str) -> String {
    remove_token(line, WEB_TOKEN)
}

/// Replaces every `/cb` with the clipboard text on its own lines.
///
/// Augmentation may have repeated the question, so each copy gets the paste.
pub fn paste_clipboard(line: &str, clipboard: &str) -> String {
    line.replace(CLIPBOARD_TOKEN, &format!("\n{clipboard}\n"))
}

/// Pulls the result count out of a `/search [n]` directive.
///
/// Returns the count (or `default` when none follows the token) and the line
/// with the directive removed.  `"tell me /search 3 about X"` yields
/// `(3, "tell me about X")`.
pub fn extract_search_count(line: &str, default: usize) -> (usize, String) {
    let Some(captures) = SEARCH_COUNT.captures(line) else {
        return (default, line.trim().to_string());
    };
    let count = captures
        .get(1)
        .and_then(|n| n.as_str().parse::<usize>().ok())
        .unwrap_or(default);
    let Some(whole) = captures.get(0) else {
        return (default, line.trim().to_string());
    };
    (count, join_around(line, whole.start(), whole.end()))
}

/// Removes the first occurrence of `token`, rejoining both sides with one space.
fn remove_token(line: &str, token: &str) -> String {
    match line.find(token) {
        Some(start) => join_around(line, start, start + token.len()),
        None => line.trim().to_string(),
    }
}

fn join_around(line: &str, start: usize, end: usize) -> String {
    let before = line[..start].trim();
    let after = line[end..].trim();
    match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (_, true) => before.to_string(),
        _ => format!("{before} {after}"),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Possible prompt commands:
  /file <path>          Read the file and append its content to the input
  /search [n]           Query the vector database and add n passages (RAG)
  /web                  Search the web with DuckDuckGo and add the results
  /model                Change the model
  /chatbot              Change the chatbot personality
  /collection           Change the vector database collection
  /cb                   Replace /cb with the clipboard content
  /verbose              Toggle verbose mode on or off
  reset, clear, restart Reset the conversation
  quit, exit, bye       Exit the chatbot"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_phrases_match_whole_line() {
        for line in ["quit", "/exit", "  BYE ", "/Quit"] {
            assert_eq!(parse_directives(line), vec![Directive::Exit], "{line}");
        }
        assert!(parse_directives("please quit now").is_empty());
    }

    #[test]
    fn reset_phrases_match_whole_line() {
        for line in ["reset", "/clear", "Restart"] {
            assert_eq!(parse_directives(line), vec![Directive::Reset], "{line}");
        }
        assert!(parse_directives("clear the table").is_empty());
    }

    #[test]
    fn tokens_match_anywhere_in_priority_order() {
        assert_eq!(
            parse_directives("/cb explain this /file a.txt"),
            vec![Directive::File, Directive::Clipboard]
        );
        assert_eq!(parse_directives("switch /model"), vec![Directive::Model]);
        assert_eq!(parse_directives("/verbose"), vec![Directive::Verbose]);
        assert_eq!(parse_directives("/collection"), vec![Directive::Collection]);
        assert_eq!(parse_directives("/chatbot"), vec![Directive::Chatbot]);
        assert!(parse_directives("plain question").is_empty());
    }

    #[test]
    fn search_beats_web() {
        assert_eq!(
            parse_directives("/web rust /search 2"),
            vec![Directive::Search]
        );
        assert_eq!(parse_directives("rust news /web"), vec![Directive::Web]);
    }

    #[test]
    fn stops_turn() {
        assert!(Directive::Model.stops_turn());
        assert!(Directive::Reset.stops_turn());
        assert!(!Directive::Search.stops_turn());
        assert!(!Directive::Clipboard.stops_turn());
    }

    #[test]
    fn search_count_extracted_and_removed() {
        assert_eq!(
            extract_search_count("tell me /search 3 about X", 1),
            (3, "tell me about X".to_string())
        );
        assert_eq!(
            extract_search_count("/search what is rust", 2),
            (2, "what is rust".to_string())
        );
        assert_eq!(
            extract_search_count("what is rust /search", 2),
            (2, "what is rust".to_string())
        );
    }

    #[test]
    fn search_count_overflow_uses_default() {
        assert_eq!(
            extract_search_count("/search 99999999999999999999999 q", 4),
            (4, "q".to_string())
        );
    }

    #[test]
    fn file_path_stops_at_next_token() {
        assert_eq!(file_path("summarize /file notes.txt"), Some("notes.txt"));
        assert_eq!(
            file_path("/file /tmp/a b.txt /search 2"),
            Some("/tmp/a b.txt")
        );
        assert_eq!(file_path("/file"), None);
        assert_eq!(file_path("no token"), None);
    }

    #[test]
    fn file_path_keeps_components_that_contain_tokens() {
        assert_eq!(
            file_path("summarize /file /home/me/website/notes.txt"),
            Some("/home/me/website/notes.txt")
        );
        assert_eq!(file_path("/file /data/cbor/x.txt"), Some("/data/cbor/x.txt"));
        assert_eq!(
            file_path("/file /srv/models/collections/a.md /cb"),
            Some("/srv/models/collections/a.md")
        );
    }

    #[test]
    fn append_file_removes_token() {
        assert_eq!(
            append_file("summarize /file notes.txt", "line one"),
            "summarize notes.txt\nline one"
        );
    }

    #[test]
    fn web_and_clipboard_rewrites() {
        assert_eq!(strip_web("/web rust 2024 edition"), "rust 2024 edition");
        assert_eq!(paste_clipboard("explain /cb please", "x = 1"), "explain \nx = 1\n please");
    }

    #[test]
    fn clipboard_pasted_into_every_copy() {
        let pasted = paste_clipboard("Question: why /cb\n\nctx\n\nQuestion: why /cb", "x");
        assert!(!pasted.contains(CLIPBOARD_TOKEN));
        assert_eq!(pasted.matches("\nx\n").count(), 2);
    }

    #[test]
    fn help_text_lists_directives() {
        let help = help_text();
        for token in ["/file", "/search", "/web", "/model", "/chatbot", "/collection", "/cb", "/verbose", "reset", "quit"] {
            assert!(help.contains(token), "{token}");
        }
    }
}
