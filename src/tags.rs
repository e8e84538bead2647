use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

pub const TAG_SEPARATOR: char = '|';

/// Ordered tag names; a tag's position is its integer id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagDictionary(Vec<String>);

impl TagDictionary {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ConfigError::Dictionary(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&bytes)
            .map_err(|e| ConfigError::Dictionary(format!("{}: {}", path.display(), e)))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How the tag column of a metadata row is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowSchema {
    /// Dictionary indices, e.g. `0|3|3`.
    #[default]
    Compact,
    /// Tag names, e.g. `lien|notice`.
    Expanded,
}

impl std::str::FromStr for RowSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "expanded" => Ok(Self::Expanded),
            other => Err(format!("unknown row schema '{}'", other)),
        }
    }
}

/// A tag ready for display: its name plus a CSS-safe class token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTag {
    pub name: String,
    pub class: String,
}

impl ResolvedTag {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let class = class_token(&name);
        Self { name, class }
    }
}

/// Result of expanding a condensed tag field in the offline tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub value: String,
    /// The raw tokens that were not valid dictionary indices.
    pub invalid: Vec<String>,
}

/// Shared tag codec used by both the offline expander and the runtime loader.
///
/// The dictionary is optional: at runtime a failed dictionary load leaves
/// tokens unresolved instead of failing the page.
#[derive(Debug, Clone, Default)]
pub struct TagCodec {
    dictionary: Option<TagDictionary>,
}

impl TagCodec {
    pub fn new(dictionary: TagDictionary) -> Self {
        Self {
            dictionary: Some(dictionary),
        }
    }

    /// A codec with no dictionary; every token passes through unchanged.
    pub fn unresolved() -> Self {
        Self { dictionary: None }
    }

    pub fn has_dictionary(&self) -> bool {
        self.dictionary.is_some()
    }

    fn lookup(&self, token: &str) -> Option<&str> {
        let index = token.parse::<usize>().ok()?;
        self.dictionary.as_ref()?.get(index)
    }

    /// Offline expansion of `0|1|5` into `name|name|INVALID_TAG_5`.
    ///
    /// Order and duplicates are preserved. An empty field stays empty.
    pub fn expand_indices(&self, field: &str) -> Expansion {
        if field.is_empty() {
            return Expansion {
                value: String::new(),
                invalid: Vec::new(),
            };
        }

        let mut invalid = Vec::new();
        let names: Vec<String> = field
            .split(TAG_SEPARATOR)
            .map(str::trim)
            .map(|token| match self.lookup(token) {
                Some(name) => name.to_string(),
                None => {
                    warn!(index = token, "Invalid tag index");
                    invalid.push(token.to_string());
                    invalid_placeholder(token)
                }
            })
            .collect();

        Expansion {
            value: names.join(&TAG_SEPARATOR.to_string()),
            invalid,
        }
    }

    /// Runtime decoding of a tag column into display names.
    ///
    /// Under `Compact`, numeric tokens are looked up; tokens that are not a
    /// valid index (already a name, out of range, or no dictionary loaded)
    /// are kept verbatim. Under `Expanded` every token is taken as a name.
    pub fn decode(&self, field: &str, schema: RowSchema) -> Vec<String> {
        if field.trim().is_empty() {
            return Vec::new();
        }
        field
            .split(TAG_SEPARATOR)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|token| match schema {
                RowSchema::Expanded => token.to_string(),
                RowSchema::Compact => self.lookup(token).unwrap_or(token).to_string(),
            })
            .collect()
    }
}

pub fn invalid_placeholder(token: &str) -> String {
    format!("INVALID_TAG_{}", token)
}

/// Lower-cased class token: runs of non-alphanumerics collapse into one `-`.
pub fn class_token(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "tag-");
    }
    out
}
