use std::io::Write;

use flate2::write::GzDecoder;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::error::LoadError;

/// Gunzip a chunked byte stream and decode the result as UTF-8.
///
/// Chunks are fed to the decoder as they arrive; only the decompressed
/// output is accumulated.
pub async fn decompress_stream<S, B, E>(name: &str, mut chunks: S) -> Result<String, LoadError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let decode_err = |reason: String| LoadError::Decode {
        name: name.to_string(),
        reason,
    };

    let mut decoder = GzDecoder::new(Vec::new());
    let mut compressed = 0usize;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| LoadError::ResourceLoad {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let bytes = chunk.as_ref();
        compressed += bytes.len();
        decoder
            .write_all(bytes)
            .map_err(|e| decode_err(format!("gzip: {}", e)))?;
    }

    let decompressed = decoder
        .finish()
        .map_err(|e| decode_err(format!("gzip: {}", e)))?;
    debug!(
        resource = name,
        compressed,
        decompressed = decompressed.len(),
        "Resource decompressed"
    );

    String::from_utf8(decompressed).map_err(|e| decode_err(format!("utf-8: {}", e)))
}

/// Gzip-compress text. Used by the offline tool to emit the packaged table.
pub fn compress(text: &str) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()
}
