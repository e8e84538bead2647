use anyhow::{Context, Result};
use tracing::Level;

use crate::metadata::types::IdConvention;
use crate::tags::RowSchema;

/// Runtime settings for loading metadata and enriching a page.
#[derive(Debug, Clone)]
pub struct EnricherConfig {
    /// Directory or `http(s)://` base of the packaged resources.
    pub resource_base: String,
    pub tags_resource: String,
    pub metadata_resource: String,
    pub row_schema: RowSchema,
    pub ids: IdConvention,
    pub entry_selector: String,
    pub link_selector: String,
    pub excerpt_selector: String,
    pub log_level: Level,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            resource_base: "./resources".to_string(),
            tags_resource: "tags.json".to_string(),
            metadata_resource: "metadata.csv.gz".to_string(),
            row_schema: RowSchema::Compact,
            ids: IdConvention::default(),
            entry_selector: ".result-item".to_string(),
            link_selector: "h3 a".to_string(),
            excerpt_selector: ".result-excerpt".to_string(),
            log_level: Level::INFO,
        }
    }
}

impl EnricherConfig {
    /// Read `ENRICH_*` variables (a `.env` file is honored), falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();
        let defaults = Self::default();
        let var = |key: &str, fallback: &str| dotenv::var(key).unwrap_or_else(|_| fallback.to_string());

        let row_schema = match dotenv::var("ENRICH_ROW_SCHEMA") {
            Ok(s) => s.parse::<RowSchema>().map_err(anyhow::Error::msg)?,
            Err(_) => defaults.row_schema,
        };
        let log_level = match dotenv::var("ENRICH_LOG_LEVEL") {
            Ok(s) => s
                .parse::<Level>()
                .with_context(|| format!("Invalid ENRICH_LOG_LEVEL '{}'", s))?,
            Err(_) => defaults.log_level,
        };

        Ok(Self {
            resource_base: var("ENRICH_RESOURCE_BASE", &defaults.resource_base),
            tags_resource: var("ENRICH_TAGS_RESOURCE", &defaults.tags_resource),
            metadata_resource: var("ENRICH_METADATA_RESOURCE", &defaults.metadata_resource),
            row_schema,
            ids: IdConvention {
                prefix: var("ENRICH_ID_PREFIX", &defaults.ids.prefix),
                extension: defaults.ids.extension.clone(),
            },
            entry_selector: var("ENRICH_ENTRY_SELECTOR", &defaults.entry_selector),
            link_selector: var("ENRICH_LINK_SELECTOR", &defaults.link_selector),
            excerpt_selector: var("ENRICH_EXCERPT_SELECTOR", &defaults.excerpt_selector),
            log_level,
        })
    }
}
