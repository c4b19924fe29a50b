//! Wire format: one `key:value` line per message.

use std::fmt;

use crate::error::{RendezvousError, RendezvousResult};

/// Key of lifecycle events (`event:die`).
pub const EVENT: &str = "event";
/// Key of text the supervisor shows to the operator.
pub const MESSAGEBOX: &str = "messagebox";
/// Key of text the supervisor writes to its log.
pub const LOG: &str = "log";
/// Event telling the child to shut down.
pub const DIE: &str = "die";

/// Meaning of a message, derived from its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `messagebox:<text>`
    MessageBox,
    /// `log:<text>`
    Log,
    /// `event:<name>`
    Event,
    /// Any other key.
    Unknown,
}

/// A single rendezvous message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousMessage {
    key: String,
    value: String,
}

impl RendezvousMessage {
    /// Build a message.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::InvalidKey`] if the key is empty or contains
    /// `:` or a line break.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> RendezvousResult<Self> {
        let key = key.into();
        if key.is_empty() || key.contains([':', '\n', '\r']) {
            return Err(RendezvousError::InvalidKey { key });
        }
        Ok(Self {
            key,
            value: value.into(),
        })
    }

    /// `event:die`, sent to a child before it is killed.
    #[must_use]
    pub fn die() -> Self {
        Self::event(DIE)
    }

    /// `event:<name>`.
    #[must_use]
    pub fn event(name: impl Into<String>) -> Self {
        Self {
            key: EVENT.to_owned(),
            value: name.into(),
        }
    }

    /// `messagebox:<text>`.
    #[must_use]
    pub fn message_box(text: impl Into<String>) -> Self {
        Self {
            key: MESSAGEBOX.to_owned(),
            value: text.into(),
        }
    }

    /// Parse one line. A trailing `\n` or `\r\n` is ignored.
    ///
    /// The line is split at the first `:`; the value may contain further colons.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::MalformedLine`] if there is no `:` or the key
    /// is empty.
    pub fn parse(line: &str) -> RendezvousResult<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        match line.split_once(':') {
            Some((key, value)) if !key.is_empty() => Ok(Self {
                key: key.to_owned(),
                value: value.to_owned(),
            }),
            _ => Err(RendezvousError::MalformedLine {
                line: line.to_owned(),
            }),
        }
    }

    /// Message key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Message value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Interpretation of the key.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self.key.as_str() {
            MESSAGEBOX => MessageKind::MessageBox,
            LOG => MessageKind::Log,
            EVENT => MessageKind::Event,
            _ => MessageKind::Unknown,
        }
    }

    /// Whether this is `event:die`.
    #[must_use]
    pub fn is_die(&self) -> bool {
        self.kind() == MessageKind::Event && self.value == DIE
    }

    /// Encode as a terminated line. Line breaks inside the value become spaces.
    #[must_use]
    pub fn to_line(&self) -> String {
        let value = self.value.replace(['\r', '\n'], " ");
        format!("{}:{value}\n", self.key)
    }
}

impl fmt::Display for RendezvousMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_at_first_colon() {
        let msg = RendezvousMessage::parse("log:started at 12:00\n").unwrap();
        assert_eq!(msg.key(), "log");
        assert_eq!(msg.value(), "started at 12:00");
        assert_eq!(msg.kind(), MessageKind::Log);
    }

    #[test]
    fn test_parse_crlf_and_empty_value() {
        let msg = RendezvousMessage::parse("event:\r\n").unwrap();
        assert_eq!(msg.key(), "event");
        assert_eq!(msg.value(), "");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            RendezvousMessage::parse("no separator\n"),
            Err(RendezvousError::MalformedLine { .. })
        ));
        assert!(RendezvousMessage::parse(":value").is_err());
        assert!(RendezvousMessage::parse("").is_err());
    }

    #[test]
    fn test_die() {
        let die = RendezvousMessage::die();
        assert_eq!(die.to_line(), "event:die\n");
        assert!(die.is_die());
        assert!(!RendezvousMessage::event("pause").is_die());
        assert!(RendezvousMessage::parse("event:die").unwrap().is_die());
    }

    #[test]
    fn test_new_validates_key() {
        assert!(RendezvousMessage::new("custom", "x").is_ok());
        assert!(RendezvousMessage::new("", "x").is_err());
        assert!(RendezvousMessage::new("a:b", "x").is_err());
        assert_eq!(
            RendezvousMessage::new("custom", "x").unwrap().kind(),
            MessageKind::Unknown
        );
    }

    #[test]
    fn test_to_line_flattens_line_breaks() {
        let msg = RendezvousMessage::message_box("first\nsecond");
        assert_eq!(msg.to_line(), "messagebox:first second\n");
    }
}
