use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Dislike,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Display name of the commenter.
    pub author: String,
    pub text: String,
}

/// File contents. Small files keep their raw bytes; larger ones are held
/// as a `data:` URL. Both read back through `bytes` and `data_url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaPayload {
    Blob(#[serde(with = "base64_bytes")] Vec<u8>),
    DataUrl(String),
}

impl MediaPayload {
    /// Files above `inline_limit` bytes become a data URL.
    pub fn encode(mime_type: &str, bytes: Vec<u8>, inline_limit: usize) -> Self {
        if bytes.len() > inline_limit {
            MediaPayload::DataUrl(format!("data:{mime_type};base64,{}", STANDARD.encode(&bytes)))
        } else {
            MediaPayload::Blob(bytes)
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, MediaPayload::Blob(_))
    }

    pub fn bytes(&self) -> Result<Vec<u8>, ModelError> {
        match self {
            MediaPayload::Blob(bytes) => Ok(bytes.clone()),
            MediaPayload::DataUrl(url) => {
                let (header, data) = url
                    .strip_prefix("data:")
                    .and_then(|rest| rest.split_once(','))
                    .ok_or_else(|| ModelError::Payload("not a data URL".into()))?;
                if !header.ends_with(";base64") {
                    return Err(ModelError::Payload("data URL is not base64".into()));
                }
                STANDARD.decode(data).map_err(|e| ModelError::Payload(e.to_string()))
            }
        }
    }

    pub fn data_url(&self, mime_type: &str) -> String {
        match self {
            MediaPayload::Blob(bytes) => format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)),
            MediaPayload::DataUrl(url) => url.clone(),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

/// Uploaded photo or video. `id` is assigned by the store on insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Owner email.
    pub user_id: String,
    pub owner_name: String,
    pub name: String,
    pub mime_type: String,
    pub payload: MediaPayload,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub likes: BTreeSet<String>,
    #[serde(default)]
    pub dislikes: BTreeSet<String>,
}

impl Media {
    pub fn is_visible_to(&self, email: &str) -> bool {
        self.visibility == Visibility::Public || self.user_id == email
    }

    /// Record a reaction. An email sits in at most one of `likes` and
    /// `dislikes`; repeating a reaction changes nothing.
    pub fn react(&mut self, email: &str, reaction: Reaction) {
        let (add, remove) = match reaction {
            Reaction::Like => (&mut self.likes, &mut self.dislikes),
            Reaction::Dislike => (&mut self.dislikes, &mut self.likes),
        };
        remove.remove(email);
        add.insert(email.to_string());
    }

    pub fn add_comment(&mut self, author: &str, text: &str) -> Result<(), ModelError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ModelError::validation("comment is empty"));
        }
        self.comments.push(Comment { author: author.to_string(), text: text.to_string() });
        Ok(())
    }

    pub fn set_details(&mut self, details: &str) {
        self.details = details.trim().to_string();
    }

    pub fn data_url(&self) -> String {
        self.payload.data_url(&self.mime_type)
    }
}
