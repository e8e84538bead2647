pub mod decompress;
pub mod loader;
pub mod types;

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::config::EnricherConfig;
use crate::error::LoadError;
use crate::table::{data_lines, parse_line};
use crate::tags::{RowSchema, TagCodec, TagDictionary};

use loader::ResourceLoader;
use types::{DocId, IdConvention, IndexState, MetadataRecord};

// Column positions in the packaged metadata table (no header row).
const COL_ID: usize = 0;
const COL_TAGS: usize = 1;
const COL_DESCRIPTION: usize = 2;
const COL_LENGTH: usize = 3;
const COL_DATE: usize = 4;

/// Document id → metadata, filled once per page load and read-only after.
///
/// The records come exclusively from the packaged metadata resource. That is
/// the trust boundary that allows descriptions to be rendered as markup.
#[derive(Debug)]
pub struct MetadataIndex {
    state: IndexState,
    records: HashMap<DocId, MetadataRecord>,
    ids: IdConvention,
}

impl MetadataIndex {
    pub fn new(ids: IdConvention) -> Self {
        Self {
            state: IndexState::NotLoaded,
            records: HashMap::new(),
            ids,
        }
    }

    /// A `Ready` index over records built elsewhere, e.g. by `parse_table`.
    pub fn with_records(ids: IdConvention, records: HashMap<DocId, MetadataRecord>) -> Self {
        Self {
            state: IndexState::Ready,
            records,
            ids,
        }
    }

    pub fn failed(ids: IdConvention) -> Self {
        Self {
            state: IndexState::Failed,
            records: HashMap::new(),
            ids,
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn ids(&self) -> &IdConvention {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Misses for every id unless the index is `Ready`.
    pub fn get(&self, id: &str) -> Option<&MetadataRecord> {
        if self.state != IndexState::Ready {
            return None;
        }
        self.records.get(self.ids.normalize(id))
    }

    /// Load the tag dictionary and metadata table, then settle in `Ready` or
    /// `Failed`. Runs at most once; later calls only report the state.
    pub async fn populate(&mut self, loader: &ResourceLoader, config: &EnricherConfig) -> IndexState {
        if self.state != IndexState::NotLoaded {
            warn!(state = ?self.state, "Metadata index already populated");
            return self.state;
        }

        let codec = match loader
            .fetch_json::<TagDictionary>(&config.tags_resource)
            .await
        {
            Ok(dict) => {
                info!(tags = dict.len(), "Tag dictionary loaded");
                TagCodec::new(dict)
            }
            Err(e) => {
                // Degraded: tags stay as raw tokens.
                error!(
                    url = %loader.describe(&config.tags_resource),
                    "Error loading tag dictionary: {}", e
                );
                TagCodec::unresolved()
            }
        };

        match Self::load_records(loader, config, &codec, &self.ids).await {
            Ok(records) => {
                info!(records = records.len(), "Metadata index ready");
                self.records = records;
                self.state = IndexState::Ready;
            }
            Err(e) => {
                error!(
                    url = %loader.describe(&config.metadata_resource),
                    "Error loading metadata: {}", e
                );
                self.state = IndexState::Failed;
            }
        }
        self.state
    }

    async fn load_records(
        loader: &ResourceLoader,
        config: &EnricherConfig,
        codec: &TagCodec,
        ids: &IdConvention,
    ) -> Result<HashMap<DocId, MetadataRecord>, LoadError> {
        let chunks = loader.fetch_stream(&config.metadata_resource).await?;
        let text = decompress::decompress_stream(&config.metadata_resource, chunks).await?;
        Ok(Self::parse_table(&text, codec, config.row_schema, ids))
    }

    /// Build records from decoded table text. Duplicate ids: last row wins.
    pub fn parse_table(
        text: &str,
        codec: &TagCodec,
        schema: RowSchema,
        ids: &IdConvention,
    ) -> HashMap<DocId, MetadataRecord> {
        let mut records = HashMap::new();
        for line in data_lines(text) {
            let fields = parse_line(line);
            let id = ids.normalize(&fields[COL_ID]);
            if id.is_empty() {
                debug!(raw = line, "Skipping row without id");
                continue;
            }
            let column = |i: usize| fields.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
            let record = MetadataRecord {
                tags: codec.decode(&column(COL_TAGS), schema),
                description: column(COL_DESCRIPTION),
                length: column(COL_LENGTH),
                date: column(COL_DATE),
            };
            if records.insert(id.to_string(), record).is_some() {
                debug!(doc_id = id, "Duplicate id in metadata table, keeping last");
            }
        }
        records
    }
}
