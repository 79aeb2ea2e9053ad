//! Prompt message types.
//!
//! A prompt is an ordered list of role-tagged messages. A message's content is
//! either plain text or a list of typed parts, which is what multimodal
//! requests need:
//!
//! ```json
//! {"role": "user", "content": [
//!     {"type": "text", "text": "What is on the canvas?"},
//!     {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,...", "detail": "auto"}}
//! ]}
//! ```
//!
//! The serde layout matches the hosted chat-completions wire format directly.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the assistant's behaviour
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

/// Resolution hint for image parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    High,
    #[default]
    Auto,
}

/// An image reference, usually a `data:` URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default)]
    pub detail: ImageDetail,
}

/// One typed part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>, detail: ImageDetail) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail,
            },
        }
    }
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of this content, ignoring image parts.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether any part carries an image.
    pub fn has_image(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Parts(parts) => parts
                .iter()
                .any(|p| matches!(p, ContentPart::ImageUrl { .. })),
        }
    }
}

/// A single role-tagged message in a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl PromptMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message made of typed parts.
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }

    /// The text of this message, ignoring image parts.
    pub fn text(&self) -> String {
        self.content.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_serializes_as_string() {
        let msg = PromptMessage::user("Hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "Hello"}));
    }

    #[test]
    fn image_part_wire_format() {
        let msg = PromptMessage::user_parts(vec![
            ContentPart::text("Describe this"),
            ContentPart::image("data:image/jpeg;base64,AAAA", ImageDetail::High),
        ]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["detail"], "high");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn text_of_parts_skips_images() {
        let content = MessageContent::Parts(vec![
            ContentPart::text("first"),
            ContentPart::image("data:,", ImageDetail::Auto),
            ContentPart::text("second"),
        ]);
        assert_eq!(content.text(), "first\nsecond");
        assert!(content.has_image());
        assert!(!MessageContent::Text("plain".into()).has_image());
    }

    #[test]
    fn parts_deserialize_from_wire() {
        let json = r#"{"role":"user","content":[{"type":"image_url","image_url":{"url":"x"}}]}"#;
        let msg: PromptMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::User);
        match msg.content {
            MessageContent::Parts(parts) => match &parts[0] {
                ContentPart::ImageUrl { image_url } => {
                    assert_eq!(image_url.detail, ImageDetail::Auto)
                }
                _ => panic!("Wrong part"),
            },
            _ => panic!("Expected parts"),
        }
    }
}
