//! Prompt templates for backends without structured roles.
//!
//! Both functions here take a borrowed message slice and return a fresh
//! vector; the session's history is never rewritten in place.

use crate::{Message, PromptTemplate, Role};

const CHATML_START: &str = "<|im_start|>";
const CHATML_END: &str = "<|im_end|>";

const ALPACA_INSTRUCTION: &str = "### Instruction:\n";
const ALPACA_INPUT: &str = "### Input:\n";
const ALPACA_RESPONSE: &str = "### Response:\n";

/// Folds a leading system message into the first user message.
///
/// Given `[system S, user U, ...]` this returns `[user "S\nU", ...]`.  The
/// fold only happens when a system message sits at index 0 and another
/// message follows it; otherwise the messages are returned unchanged.
pub fn merge_system_into_first_user(messages: &[Message]) -> Vec<Message> {
    match messages {
        [system, first, rest @ ..] if system.role == Role::System => {
            let mut merged = Vec::with_capacity(messages.len() - 1);
            merged.push(Message::new(
                first.role,
                format!("{}\n{}", system.content, first.content),
            ));
            merged.extend_from_slice(rest);
            merged
        }
        _ => messages.to_vec(),
    }
}

/// Renders the messages in the requested template.
pub fn apply(messages: &[Message], template: PromptTemplate) -> Vec<Message> {
    match template {
        PromptTemplate::None => messages.to_vec(),
        PromptTemplate::ChatML => chatml(messages),
        PromptTemplate::Alpaca => alpaca(messages),
    }
}

fn chatml(messages: &[Message]) -> Vec<Message> {
    let mut framed: Vec<Message> = messages
        .iter()
        .map(|m| {
            Message::new(
                m.role,
                format!("{CHATML_START}{}\n{}{CHATML_END}", m.role, m.content),
            )
        })
        .collect();
    framed.push(Message::assistant(format!("{CHATML_START}assistant\n")));
    framed
}

fn alpaca(messages: &[Message]) -> Vec<Message> {
    let mut framed: Vec<Message> = messages
        .iter()
        .map(|m| match m.role {
            Role::System => Message::new(m.role, format!("{ALPACA_INSTRUCTION}{}", m.content)),
            Role::User => Message::new(m.role, format!("{ALPACA_INPUT}{}", m.content)),
            Role::Assistant => m.clone(),
        })
        .collect();
    framed.push(Message::assistant(ALPACA_RESPONSE));
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn none_is_passthrough() {
        let messages = vec![Message::system("S"), Message::user("U")];
        assert_eq!(apply(&messages, PromptTemplate::None), messages);
    }

    #[test]
    fn chatml_frames_each_message_and_primes_assistant() {
        let messages = vec![Message::system("S"), Message::user("U")];
        let framed = apply(&messages, PromptTemplate::ChatML);
        assert_eq!(
            contents(&framed),
            vec![
                "<|im_start|>system\nS<|im_end|>",
                "<|im_start|>user\nU<|im_end|>",
                "<|im_start|>assistant\n",
            ]
        );
        assert_eq!(framed[0].role, Role::System);
        assert_eq!(framed[1].role, Role::User);
        assert_eq!(framed[2].role, Role::Assistant);
    }

    #[test]
    fn chatml_does_not_touch_input() {
        let messages = vec![Message::user("U")];
        let _ = apply(&messages, PromptTemplate::ChatML);
        assert_eq!(messages, vec![Message::user("U")]);
    }

    #[test]
    fn alpaca_frames_instruction_input_and_response() {
        let messages = vec![
            Message::system("S"),
            Message::user("U1"),
            Message::assistant("A1"),
            Message::user("U2"),
        ];
        let framed = apply(&messages, PromptTemplate::Alpaca);
        assert_eq!(
            contents(&framed),
            vec![
                "### Instruction:\nS",
                "### Input:\nU1",
                "A1",
                "### Input:\nU2",
                "### Response:\n",
            ]
        );
    }

    #[test]
    fn merge_folds_system_into_first_user() {
        let messages = vec![Message::system("S"), Message::user("U"), Message::user("U2")];
        let merged = merge_system_into_first_user(&messages);
        assert_eq!(merged, vec![Message::user("S\nU"), Message::user("U2")]);
        assert_eq!(merged.len(), messages.len() - 1);
    }

    #[test]
    fn merge_without_system_is_identity() {
        let messages = vec![Message::user("U"), Message::assistant("A")];
        assert_eq!(merge_system_into_first_user(&messages), messages);
    }

    #[test]
    fn merge_with_lone_system_is_identity() {
        let messages = vec![Message::system("S")];
        assert_eq!(merge_system_into_first_user(&messages), messages);
    }
}
