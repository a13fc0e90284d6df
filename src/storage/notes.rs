//! Saved notes.

use serde::{Deserialize, Serialize};

use super::store::Record;
use crate::telegram::MessageId;

/// Collection name of the notes.
pub const NOTES_COLLECTION: &str = "NOTES";

/// What a note holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteContent {
    /// Id of a copy kept in Saved Messages.
    Message(MessageId),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    #[serde(rename = "_id")]
    pub name: String,
    pub content: NoteContent,
}

impl NoteRecord {
    /// Creates a note; the name is stored lower-cased.
    #[must_use]
    pub fn new(name: &str, content: NoteContent) -> Self {
        Self {
            name: normalize_name(name),
            content,
        }
    }
}

impl Record for NoteRecord {
    type Key = str;

    fn key(&self) -> &str {
        &self.name
    }
}

/// Canonical form of a note name.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
