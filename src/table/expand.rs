use tracing::{debug, warn};

use super::{parse_line, serialize_row};
use crate::error::{ConfigError, RowError};
use crate::tags::TagCodec;

/// Header names accepted for the tag column, compared trimmed and lower-cased.
const TAG_COLUMN_NAMES: &[&str] = &["tags", "t"];

#[derive(Debug, Clone)]
pub struct ExpandOptions {
    /// Provenance prefix prepended to every row's id field.
    pub id_prefix: String,
    /// Emit the header line. The runtime metadata table has no header.
    pub include_header: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            id_prefix: "EFTA".to_string(),
            include_header: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpandSummary {
    pub output: String,
    pub processed: usize,
    /// Rows dropped because they could not be transformed.
    pub errored: usize,
    /// Tag tokens replaced by an `INVALID_TAG_*` placeholder.
    pub invalid_tags: usize,
}

/// Rewrites a condensed table (tag indices) into the distributable form
/// (tag names, prefixed ids).
pub struct CondensedRecordExpander<'a> {
    codec: &'a TagCodec,
    options: ExpandOptions,
}

impl<'a> CondensedRecordExpander<'a> {
    pub fn new(codec: &'a TagCodec, options: ExpandOptions) -> Self {
        Self { codec, options }
    }

    /// Locate the tag column in a header line.
    pub fn find_tag_column(header: &str) -> Result<usize, ConfigError> {
        parse_line(header)
            .iter()
            .position(|h| {
                let h = h.trim().to_lowercase();
                TAG_COLUMN_NAMES.contains(&h.as_str())
            })
            .ok_or(ConfigError::MissingTagsColumn)
    }

    /// Expand a whole table. Fails only on configuration problems; bad rows
    /// are counted and skipped.
    pub fn expand(&self, input: &str) -> Result<ExpandSummary, ConfigError> {
        let mut lines = input.split('\n');
        let header = lines
            .next()
            .map(|h| h.trim_end_matches('\r'))
            .filter(|h| !h.trim().is_empty())
            .ok_or(ConfigError::EmptyInput)?;
        let tag_column = Self::find_tag_column(header)?;
        debug!(tag_column, "Located tag column");

        let mut summary = ExpandSummary::default();
        let mut out_lines = Vec::new();
        if self.options.include_header {
            out_lines.push(header.to_string());
        }

        for (i, raw) in lines.enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            // Line numbers are 1-based with the header as line 1.
            let line_no = i + 2;
            match self.expand_row(line, tag_column) {
                Ok((row, invalid)) => {
                    if invalid > 0 {
                        warn!(line = line_no, invalid, raw = line, "Row has invalid tag indices");
                    }
                    summary.invalid_tags += invalid;
                    summary.processed += 1;
                    out_lines.push(row);
                }
                Err(e) => {
                    warn!(line = line_no, raw = line, "Error processing row: {}", e);
                    summary.errored += 1;
                }
            }
        }

        summary.output = out_lines.join("\n");
        Ok(summary)
    }

    /// Returns the re-serialized row and the number of invalid tag tokens.
    pub fn expand_row(&self, line: &str, tag_column: usize) -> Result<(String, usize), RowError> {
        let mut fields = parse_line(line);
        if fields.len() <= tag_column {
            return Err(RowError::MissingColumn {
                column: tag_column,
                found: fields.len(),
            });
        }

        let expansion = self.codec.expand_indices(&fields[tag_column]);
        fields[tag_column] = expansion.value;
        fields[0] = format!("{}{}", self.options.id_prefix, fields[0]);

        Ok((serialize_row(&fields), expansion.invalid.len()))
    }
}
