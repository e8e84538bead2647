use thiserror::Error;

/// Failure while loading a packaged resource at runtime.
///
/// Never surfaced to the host page: the index population logs it and settles
/// in the `Failed` state.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to fetch resource '{name}': {reason}")]
    ResourceLoad { name: String, reason: String },
    #[error("resource '{name}' returned HTTP status {status}")]
    Status { name: String, status: u16 },
    #[error("failed to decode resource '{name}': {reason}")]
    Decode { name: String, reason: String },
    #[error("invalid JSON in resource '{name}': {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal setup problems for the offline tag expansion tool.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("input file not found: {0}")]
    MissingInput(String),
    #[error("could not find \"tags\" or \"t\" column in header")]
    MissingTagsColumn,
    #[error("input table is empty")]
    EmptyInput,
    #[error("failed to load tag dictionary: {0}")]
    Dictionary(String),
}

/// A single data row that could not be transformed; the row is dropped.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RowError {
    #[error("row has {found} fields, tag column is at index {column}")]
    MissingColumn { column: usize, found: usize },
}
