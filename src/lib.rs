//! Enriches rendered search-result entries with side-loaded document
//! metadata (tags, description, page count, date).
//!
//! The metadata ships as a gzip-compressed delimited table plus a JSON tag
//! dictionary. The `inflate-tags` tool turns a condensed table (tag indices)
//! into the distributable form.

pub mod config;
pub mod dom;
pub mod enrich;
pub mod error;
pub mod metadata;
pub mod state;
pub mod table;
pub mod tags;

pub use config::EnricherConfig;
pub use enrich::{EnrichmentEngine, Enhancement};
pub use metadata::MetadataIndex;
pub use state::PageSession;
