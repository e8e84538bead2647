pub mod watcher;

use std::sync::Arc;

use tracing::debug;

use crate::config::EnricherConfig;
use crate::dom::{Document, NodeId, Selector, SelectorError};
use crate::metadata::types::{DocId, MetadataRecord};
use crate::metadata::MetadataIndex;
use crate::tags::ResolvedTag;

// Class names of inserted elements. `TAGS_CLASS` doubles as the
// "already enhanced" marker.
pub const TAGS_CLASS: &str = "enhanced-tags";
pub const CHIP_CLASS: &str = "tag-chip";
pub const LENGTH_CLASS: &str = "enhanced-length";
pub const DATE_CLASS: &str = "enhanced-date";
pub const SEPARATOR_CLASS: &str = "enhanced-separator";
pub const DESCRIPTION_CLASS: &str = "enhanced-description";

const UNIT_SINGULAR: &str = "page";
const UNIT_PLURAL: &str = "pages";

/// What `enhance` did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enhancement {
    Enhanced,
    AlreadyEnhanced,
    NoId,
    NotIndexed,
    NoExcerpt,
}

/// Selectors for the host page contract.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub entry: Selector,
    pub link: Selector,
    pub excerpt: Selector,
    marker: Selector,
}

impl Selectors {
    pub fn new(entry: &str, link: &str, excerpt: &str) -> Result<Self, SelectorError> {
        Ok(Self {
            entry: Selector::parse(entry)?,
            link: Selector::parse(link)?,
            excerpt: Selector::parse(excerpt)?,
            marker: Selector::parse(&format!(".{}", TAGS_CLASS))?,
        })
    }

    pub fn from_config(config: &EnricherConfig) -> Result<Self, SelectorError> {
        Self::new(
            &config.entry_selector,
            &config.link_selector,
            &config.excerpt_selector,
        )
    }
}

/// Decorates result entries with metadata from the index, at most once each.
pub struct EnrichmentEngine {
    index: Arc<MetadataIndex>,
    selectors: Selectors,
}

impl EnrichmentEngine {
    pub fn new(index: Arc<MetadataIndex>, selectors: Selectors) -> Self {
        Self { index, selectors }
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    pub fn is_entry(&self, doc: &Document, node: NodeId) -> bool {
        doc.matches(node, &self.selectors.entry)
    }

    /// Document id from the entry's primary link.
    pub fn document_id(&self, doc: &Document, entry: NodeId) -> Option<DocId> {
        let link = doc.query_selector(entry, &self.selectors.link)?;
        let href = doc.attribute(link, "href")?;
        self.index.ids().from_href(href)
    }

    /// Augment one entry. Mutations stay inside the entry's subtree.
    pub fn enhance(&self, doc: &mut Document, entry: NodeId) -> Enhancement {
        if doc.query_selector(entry, &self.selectors.marker).is_some() {
            return Enhancement::AlreadyEnhanced;
        }
        let Some(doc_id) = self.document_id(doc, entry) else {
            return Enhancement::NoId;
        };
        let Some(record) = self.index.get(&doc_id) else {
            debug!(doc_id = %doc_id, "No metadata for entry");
            return Enhancement::NotIndexed;
        };
        let Some(excerpt) = doc.query_selector(entry, &self.selectors.excerpt) else {
            debug!(doc_id = %doc_id, "Entry has no excerpt element");
            return Enhancement::NoExcerpt;
        };

        let blocks = build_blocks(doc, record);
        doc.append_children(excerpt, blocks);
        debug!(doc_id = %doc_id, tags = record.tags.len(), "Entry enhanced");
        Enhancement::Enhanced
    }

    /// Enhance every entry currently in the document. Returns how many were
    /// newly enhanced.
    pub fn enhance_all(&self, doc: &mut Document) -> usize {
        let entries = doc.query_selector_all(doc.body(), &self.selectors.entry);
        let total = entries.len();
        let enhanced = entries
            .into_iter()
            .filter(|&e| self.enhance(doc, e) == Enhancement::Enhanced)
            .count();
        debug!(total, enhanced, "Enhanced all entries");
        enhanced
    }
}

/// Length line text: `1 page`, `3 pages`, or the raw value if not numeric.
pub fn format_length(length: &str) -> Option<String> {
    let length = length.trim();
    if length.is_empty() {
        return None;
    }
    if length.parse::<f64>().is_ok_and(f64::is_finite) {
        let unit = if length == "1" { UNIT_SINGULAR } else { UNIT_PLURAL };
        Some(format!("{} {}", length, unit))
    } else {
        Some(length.to_string())
    }
}

/// Tag chips, length, date, separator and description, in that order.
fn build_blocks(doc: &mut Document, record: &MetadataRecord) -> Vec<NodeId> {
    let mut blocks = Vec::new();

    let tags = doc.create_element_with_class("div", TAGS_CLASS);
    for name in &record.tags {
        let tag = ResolvedTag::new(name.as_str());
        let chip = doc.create_element_with_class("span", &format!("{} {}", CHIP_CLASS, tag.class));
        let text = doc.create_text(tag.name);
        doc.append_child(chip, text);
        doc.append_child(tags, chip);
    }
    blocks.push(tags);

    if let Some(line) = format_length(&record.length) {
        blocks.push(text_block(doc, LENGTH_CLASS, line));
    }
    if !record.date.trim().is_empty() {
        blocks.push(text_block(doc, DATE_CLASS, record.date.trim().to_string()));
    }

    blocks.push(doc.create_element_with_class("hr", SEPARATOR_CLASS));

    let description = doc.create_element_with_class("div", DESCRIPTION_CLASS);
    let markup = doc.create_markup(record.description.as_str());
    doc.append_child(description, markup);
    blocks.push(description);

    blocks
}

fn text_block(doc: &mut Document, class: &str, text: String) -> NodeId {
    let block = doc.create_element_with_class("div", class);
    let text = doc.create_text(text);
    doc.append_child(block, text);
    block
}
