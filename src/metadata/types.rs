use serde::{Deserialize, Serialize};

/// Join key between a result entry and the metadata table.
pub type DocId = String;

/// Side-loaded metadata for one document.
///
/// `description` is trusted markup: it only ever comes from the packaged
/// metadata resource and is inserted into the page unescaped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Display names in source order, duplicates kept.
    pub tags: Vec<String>,
    pub description: String,
    /// Page count, or empty.
    pub length: String,
    /// Free-form, possibly empty.
    pub date: String,
}

/// Lifecycle of the index. Moves out of `NotLoaded` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    NotLoaded,
    Ready,
    Failed,
}

/// Normalizes document ids on both sides of the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdConvention {
    /// Provenance prefix added by the offline tool, e.g. `EFTA`.
    pub prefix: String,
    /// File extension on link targets, e.g. `.pdf`.
    pub extension: String,
}

impl Default for IdConvention {
    fn default() -> Self {
        Self {
            prefix: "EFTA".to_string(),
            extension: ".pdf".to_string(),
        }
    }
}

impl IdConvention {
    /// Strip the prefix if present. Used for table ids and href-derived ids.
    pub fn normalize<'a>(&self, id: &'a str) -> &'a str {
        let id = id.trim();
        if self.prefix.is_empty() {
            return id;
        }
        id.strip_prefix(self.prefix.as_str()).unwrap_or(id)
    }

    /// Derive a document id from a link target: last path segment, without
    /// query/fragment, extension and prefix.
    pub fn from_href(&self, href: &str) -> Option<DocId> {
        let path = href.split(['?', '#']).next().unwrap_or(href);
        let file = path.rsplit('/').next().unwrap_or(path);
        let file = if self.extension.is_empty() {
            file
        } else {
            file.strip_suffix(self.extension.as_str()).unwrap_or(file)
        };
        let id = self.normalize(file);
        (!id.is_empty()).then(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_href() {
        let ids = IdConvention::default();
        assert_eq!(ids.from_href("/files/id123.pdf"), Some("id123".to_string()));
        assert_eq!(
            ids.from_href("https://host/a/EFTA00042.pdf?page=2#top"),
            Some("00042".to_string())
        );
        assert_eq!(ids.from_href("doc-7"), Some("doc-7".to_string()));
        assert_eq!(ids.from_href("/files/"), None);
        assert_eq!(ids.from_href("/files/EFTA.pdf"), None);
    }

    #[test]
    fn test_normalize_without_prefix() {
        let ids = IdConvention {
            prefix: String::new(),
            extension: ".pdf".to_string(),
        };
        assert_eq!(ids.normalize("EFTA1"), "EFTA1");
        assert_eq!(IdConvention::default().normalize(" EFTA1 "), "1");
    }
}
