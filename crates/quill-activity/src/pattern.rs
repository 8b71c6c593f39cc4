//! Command patterns.
//!
//! A [`CommandPattern`] is a whitespace-separated template matched
//! structurally against inbound messages:
//!
//! - a plain token is a **literal** and must match positionally
//!   (case-insensitive unless [`case_sensitive`](CommandPattern::case_sensitive)),
//! - `{name}` captures any single word,
//! - `@{name}` captures a mention, `#{name}` a hashtag, `${name}` a
//!   cashtag — these consume the message's structured entities, not raw
//!   text, so `"@bob"` typed as plain text never satisfies `@{user}`.
//!
//! ```
//! use quill_activity::CommandPattern;
//!
//! let pattern = CommandPattern::parse("/assign @{assignee} #{label}").unwrap();
//! assert_eq!(pattern.len(), 3);
//! ```

use std::collections::HashMap;

use quill_core::{InboundMessage, MessageEntity};

/// A malformed pattern template.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("malformed placeholder `{0}`")]
    MalformedPlaceholder(String),
    #[error("duplicate placeholder name `{0}`")]
    DuplicateName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternToken {
    Literal(String),
    Word(String),
    Mention(String),
    Hashtag(String),
    Cashtag(String),
}

/// A value captured by one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Word(String),
    Mention { user_id: i64, text: String },
    Hashtag(String),
    Cashtag(String),
}

/// Placeholder captures from a successful match, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(HashMap<String, ArgValue>);

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    /// The captured word for `{name}`.
    pub fn word(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ArgValue::Word(w)) => Some(w),
            _ => None,
        }
    }

    /// The mentioned user id for `@{name}`.
    pub fn mention(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(ArgValue::Mention { user_id, .. }) => Some(*user_id),
            _ => None,
        }
    }

    /// The tag value (without the sigil) for `#{name}`.
    pub fn hashtag(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ArgValue::Hashtag(v)) => Some(v),
            _ => None,
        }
    }

    /// The tag value (without the sigil) for `${name}`.
    pub fn cashtag(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ArgValue::Cashtag(v)) => Some(v),
            _ => None,
        }
    }
}

/// A parsed, matchable command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPattern {
    tokens: Vec<PatternToken>,
    case_sensitive: bool,
    source: String,
}

impl CommandPattern {
    /// Parses a template. Literals are matched case-insensitively unless
    /// [`case_sensitive`](Self::case_sensitive) is set afterwards.
    pub fn parse(template: &str) -> Result<Self, PatternError> {
        let mut tokens = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for raw in template.split_whitespace() {
            let token = match placeholder(raw) {
                Some((sigil, name)) => {
                    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        return Err(PatternError::MalformedPlaceholder(raw.to_string()));
                    }
                    if names.contains(&name) {
                        return Err(PatternError::DuplicateName(name.to_string()));
                    }
                    names.push(name);
                    let name = name.to_string();
                    match sigil {
                        "" => PatternToken::Word(name),
                        "@" => PatternToken::Mention(name),
                        "#" => PatternToken::Hashtag(name),
                        "$" => PatternToken::Cashtag(name),
                        _ => unreachable!(),
                    }
                }
                None if raw.contains('{') || raw.contains('}') => {
                    return Err(PatternError::MalformedPlaceholder(raw.to_string()));
                }
                None => PatternToken::Literal(raw.to_string()),
            };
            tokens.push(token);
        }

        if tokens.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(Self {
            tokens,
            case_sensitive: false,
            source: template.to_string(),
        })
    }

    /// Requires literal tokens to match with exact case.
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Number of tokens in the template.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The template this pattern was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Matches the template against a message.
    ///
    /// Every template token must consume exactly one message token, in
    /// order, and the whole message must be consumed. Returns the captured
    /// placeholder values on success.
    pub fn matches(&self, message: &InboundMessage) -> Option<Arguments> {
        let words: Vec<&str> = message.text.split_whitespace().collect();
        if words.len() != self.tokens.len() {
            return None;
        }

        let mut args = HashMap::new();
        for (token, word) in self.tokens.iter().zip(&words) {
            match token {
                PatternToken::Literal(expected) => {
                    let hit = if self.case_sensitive {
                        expected == word
                    } else {
                        expected.eq_ignore_ascii_case(word)
                    };
                    if !hit {
                        return None;
                    }
                }
                PatternToken::Word(name) => {
                    args.insert(name.clone(), ArgValue::Word((*word).to_string()));
                }
                PatternToken::Mention(name) => {
                    let entity = message.entities.iter().find_map(|e| match e {
                        MessageEntity::Mention { user_id, text } if text == word => {
                            Some(ArgValue::Mention {
                                user_id: *user_id,
                                text: text.clone(),
                            })
                        }
                        _ => None,
                    })?;
                    args.insert(name.clone(), entity);
                }
                PatternToken::Hashtag(name) => {
                    let value = word.strip_prefix('#')?;
                    message.entities.iter().find(
                        |e| matches!(e, MessageEntity::Hashtag { value: v } if v == value),
                    )?;
                    args.insert(name.clone(), ArgValue::Hashtag(value.to_string()));
                }
                PatternToken::Cashtag(name) => {
                    let value = word.strip_prefix('$')?;
                    message.entities.iter().find(
                        |e| matches!(e, MessageEntity::Cashtag { value: v } if v == value),
                    )?;
                    args.insert(name.clone(), ArgValue::Cashtag(value.to_string()));
                }
            }
        }
        Some(Arguments(args))
    }
}

/// Splits `@{name}` style tokens into (sigil, name); `None` for literals.
fn placeholder(raw: &str) -> Option<(&str, &str)> {
    for sigil in ["", "@", "#", "$"] {
        if let Some(rest) = raw.strip_prefix(sigil)
            && let Some(inner) = rest.strip_prefix('{')
            && let Some(name) = inner.strip_suffix('}')
        {
            return Some((sigil, name));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str, entities: Vec<MessageEntity>) -> InboundMessage {
        InboundMessage {
            message_id: "m1".to_string(),
            stream_id: "s1".to_string(),
            text: text.to_string(),
            entities,
        }
    }

    #[test]
    fn literals_match_case_insensitively_by_default() {
        let pattern = CommandPattern::parse("/echo hello").unwrap();
        assert!(pattern.matches(&message("/Echo HELLO", vec![])).is_some());

        let strict = CommandPattern::parse("/echo hello").unwrap().case_sensitive();
        assert!(strict.matches(&message("/Echo hello", vec![])).is_none());
        assert!(strict.matches(&message("/echo hello", vec![])).is_some());
    }

    #[test]
    fn word_placeholder_captures_any_token() {
        let pattern = CommandPattern::parse("/deploy {env}").unwrap();
        let args = pattern.matches(&message("/deploy staging", vec![])).unwrap();
        assert_eq!(args.word("env"), Some("staging"));
    }

    #[test]
    fn mention_placeholder_requires_the_entity() {
        let pattern = CommandPattern::parse("/assign @{assignee}").unwrap();

        // Plain text that merely looks like a mention does not count.
        assert!(pattern.matches(&message("/assign @bob", vec![])).is_none());

        let args = pattern
            .matches(&message(
                "/assign @bob",
                vec![MessageEntity::Mention {
                    user_id: 42,
                    text: "@bob".to_string(),
                }],
            ))
            .unwrap();
        assert_eq!(args.mention("assignee"), Some(42));
    }

    #[test]
    fn tag_placeholders_consume_entities() {
        let pattern = CommandPattern::parse("/watch #{topic} ${ticker}").unwrap();
        let args = pattern
            .matches(&message(
                "/watch #infra $ACME",
                vec![
                    MessageEntity::Hashtag {
                        value: "infra".to_string(),
                    },
                    MessageEntity::Cashtag {
                        value: "ACME".to_string(),
                    },
                ],
            ))
            .unwrap();
        assert_eq!(args.hashtag("topic"), Some("infra"));
        assert_eq!(args.cashtag("ticker"), Some("ACME"));
    }

    #[test]
    fn length_mismatch_never_matches() {
        let pattern = CommandPattern::parse("/echo {what}").unwrap();
        assert!(pattern.matches(&message("/echo", vec![])).is_none());
        assert!(pattern.matches(&message("/echo one two", vec![])).is_none());
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert_eq!(CommandPattern::parse("   "), Err(PatternError::Empty));
        assert_eq!(
            CommandPattern::parse("/x {bad name"),
            Err(PatternError::MalformedPlaceholder("{bad".to_string()))
        );
        assert_eq!(
            CommandPattern::parse("/x @{}"),
            Err(PatternError::MalformedPlaceholder("@{}".to_string()))
        );
        assert_eq!(
            CommandPattern::parse("/x {a} {a}"),
            Err(PatternError::DuplicateName("a".to_string()))
        );
    }
}
