use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LoadError;

/// A stream of body chunks from a packaged resource.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, LoadError>>;

/// Where packaged resources live.
#[derive(Clone)]
enum Base {
    Http { client: reqwest::Client, url: String },
    Dir(PathBuf),
    Embedded(Arc<HashMap<String, Vec<u8>>>),
}

/// Fetch-like retrieval of the resources shipped alongside the enricher.
#[derive(Clone)]
pub struct ResourceLoader {
    base: Base,
}

impl ResourceLoader {
    /// Pick an HTTP base for `http(s)://` locations, a directory otherwise.
    pub fn from_location(location: &str) -> anyhow::Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::http(location)
        } else {
            Ok(Self::dir(location))
        }
    }

    pub fn http(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            base: Base::Http {
                client,
                url: base_url.trim_end_matches('/').to_string(),
            },
        })
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            base: Base::Dir(path.into()),
        }
    }

    pub fn embedded<I, K>(resources: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        let map = resources.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            base: Base::Embedded(Arc::new(map)),
        }
    }

    /// Human-readable location of a resource, for logs.
    pub fn describe(&self, name: &str) -> String {
        match &self.base {
            Base::Http { url, .. } => format!("{}/{}", url, name),
            Base::Dir(dir) => dir.join(name).display().to_string(),
            Base::Embedded(_) => format!("embedded:{}", name),
        }
    }

    /// Retrieve a resource as a stream of chunks.
    ///
    /// A non-success HTTP status fails here, before any body is read.
    pub async fn fetch_stream(&self, name: &str) -> Result<ChunkStream, LoadError> {
        let load_err = |reason: String| LoadError::ResourceLoad {
            name: name.to_string(),
            reason,
        };

        match &self.base {
            Base::Http { client, url } => {
                let resp = client
                    .get(format!("{}/{}", url, name))
                    .send()
                    .await
                    .map_err(|e| load_err(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(LoadError::Status {
                        name: name.to_string(),
                        status: resp.status().as_u16(),
                    });
                }
                debug!(resource = name, "HTTP resource opened");
                let owned = name.to_string();
                Ok(resp
                    .bytes_stream()
                    .map(move |chunk| {
                        chunk.map(|b| b.to_vec()).map_err(|e| LoadError::ResourceLoad {
                            name: owned.clone(),
                            reason: e.to_string(),
                        })
                    })
                    .boxed())
            }
            Base::Dir(dir) => {
                let path = dir.join(name);
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| load_err(format!("{}: {}", path.display(), e)))?;
                debug!(resource = name, size = bytes.len(), "File resource read");
                Ok(stream::once(async move { Ok::<_, LoadError>(bytes) }).boxed())
            }
            Base::Embedded(map) => {
                let bytes = map
                    .get(name)
                    .cloned()
                    .ok_or_else(|| load_err("not packaged".to_string()))?;
                Ok(stream::once(async move { Ok::<_, LoadError>(bytes) }).boxed())
            }
        }
    }

    pub async fn fetch_bytes(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        let mut chunks = self.fetch_stream(name).await?;
        let mut body = Vec::new();
        while let Some(chunk) = chunks.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, LoadError> {
        let body = self.fetch_bytes(name).await?;
        serde_json::from_slice(&body).map_err(|source| LoadError::Json {
            name: name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedded_json() {
        let loader = ResourceLoader::embedded([("tags.json", br#"["a","b"]"#.to_vec())]);
        let tags: Vec<String> = loader.fetch_json("tags.json").await.unwrap();
        assert_eq!(tags, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_embedded_missing() {
        let loader = ResourceLoader::embedded(Vec::<(String, Vec<u8>)>::new());
        let err = loader.fetch_bytes("tags.json").await.unwrap_err();
        assert!(matches!(err, LoadError::ResourceLoad { .. }));
    }

    #[tokio::test]
    async fn test_dir_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tags.json"), "[\"x\"]").unwrap();

        let loader = ResourceLoader::dir(dir.path());
        assert_eq!(loader.fetch_bytes("tags.json").await.unwrap(), b"[\"x\"]");
        assert!(loader.fetch_bytes("missing.json").await.is_err());
    }

    #[tokio::test]
    async fn test_bad_json() {
        let loader = ResourceLoader::embedded([("tags.json", b"{not json".to_vec())]);
        let err = loader.fetch_json::<Vec<String>>("tags.json").await.unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
    }

    #[test]
    fn test_from_location() {
        let loader = ResourceLoader::from_location("https://cdn.example/pack/").unwrap();
        assert_eq!(
            loader.describe("tags.json"),
            "https://cdn.example/pack/tags.json"
        );
        let loader = ResourceLoader::from_location("./resources").unwrap();
        assert!(loader.describe("tags.json").ends_with("tags.json"));
    }
}
