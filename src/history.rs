//! Conversation history.
//!
//! A [`Conversation`] is the ordered list of messages sent to the backend on
//! every turn.  It holds at most one system message, and that message is always
//! the first element.

use crate::{Error, Message, Result, Role};

/// The ordered message history of a chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a conversation seeded with an optional system message.
    pub fn with_system(system: Option<Message>) -> Self {
        let mut conversation = Self::new();
        conversation.reset(system);
        conversation
    }

    /// Appends a message.
    ///
    /// A system message is only accepted as the first element of an empty
    /// conversation; anywhere else it fails with [`Error::InvalidRole`].
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Result<()> {
        if role == Role::System && !self.messages.is_empty() {
            return Err(Error::invalid_role(role.as_str()));
        }
        self.messages.push(Message::new(role, content));
        Ok(())
    }

    /// Appends a message whose role arrives as text.
    pub fn append_str(&mut self, role: &str, content: impl Into<String>) -> Result<()> {
        let role = role.parse::<Role>()?;
        self.append(role, content)
    }

    /// Replaces the history with either nothing or the given system message.
    ///
    /// A message that is not a system message is discarded.
    pub fn reset(&mut self, system: Option<Message>) {
        self.messages.clear();
        if let Some(system) = system.filter(|m| m.role == Role::System) {
            self.messages.push(system);
        }
    }

    /// Drops every message after the first `len`.
    ///
    /// Used to roll back a turn whose backend call failed.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// The system message, if any.
    pub fn system(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.role == Role::System)
    }

    /// The messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_order() {
        let mut conversation = Conversation::with_system(Some(Message::system("S")));
        conversation.append(Role::User, "U").unwrap();
        conversation.append(Role::Assistant, "A").unwrap();
        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[test]
    fn append_rejects_unknown_role() {
        let mut conversation = Conversation::new();
        let err = conversation.append_str("narrator", "hi").unwrap_err();
        assert!(err.is_invalid_role());
        assert!(conversation.is_empty());
    }

    #[test]
    fn append_rejects_late_system_message() {
        let mut conversation = Conversation::new();
        conversation.append(Role::User, "U").unwrap();
        assert!(conversation.append(Role::System, "S").unwrap_err().is_invalid_role());
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn system_message_accepted_first() {
        let mut conversation = Conversation::new();
        conversation.append_str("system", "S").unwrap();
        assert_eq!(conversation.system(), Some(&Message::system("S")));
    }

    #[test]
    fn reset_leaves_empty_or_single_system() {
        let mut conversation = Conversation::with_system(Some(Message::system("S")));
        conversation.append(Role::User, "U").unwrap();
        conversation.append(Role::Assistant, "A").unwrap();

        conversation.reset(Some(Message::system("S")));
        assert_eq!(conversation.messages(), &[Message::system("S")]);

        conversation.append(Role::User, "U").unwrap();
        conversation.reset(None);
        assert!(conversation.is_empty());
    }

    #[test]
    fn reset_ignores_non_system_seed() {
        let mut conversation = Conversation::new();
        conversation.reset(Some(Message::user("not a system prompt")));
        assert!(conversation.is_empty());
    }

    #[test]
    fn truncate_rolls_back() {
        let mut conversation = Conversation::new();
        conversation.append(Role::User, "U").unwrap();
        let len = conversation.len();
        conversation.append(Role::User, "U2").unwrap();
        conversation.truncate(len);
        assert_eq!(conversation.messages(), &[Message::user("U")]);
    }
}
