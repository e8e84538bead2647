use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::EnricherConfig;
use crate::enrich::watcher::{ChangeWatcher, SharedDocument, WatchStats};
use crate::enrich::{EnrichmentEngine, Selectors};
use crate::metadata::loader::ResourceLoader;
use crate::metadata::types::IndexState;
use crate::metadata::MetadataIndex;

/// Everything one page load owns: the populated index, the engine reading
/// it, and the background watcher.
pub struct PageSession {
    pub engine: Arc<EnrichmentEngine>,
    pub document: SharedDocument,
    pub watcher: JoinHandle<WatchStats>,
}

impl PageSession {
    /// Initialize a page: subscribe to insertions, load metadata, enhance
    /// what is already present, then hand further insertions to the watcher.
    ///
    /// Only invalid selectors fail here. Resource failures leave the index
    /// `Failed` and the page unenriched.
    pub async fn start(
        config: &EnricherConfig,
        loader: &ResourceLoader,
        document: SharedDocument,
    ) -> Result<Self> {
        let selectors = Selectors::from_config(config)?;

        // Subscribe first so entries inserted during loading are not missed.
        let batches = document.write().await.observe();

        let mut index = MetadataIndex::new(config.ids.clone());
        let state = index.populate(loader, config).await;
        let engine = Arc::new(EnrichmentEngine::new(Arc::new(index), selectors));

        let enhanced = {
            let mut doc = document.write().await;
            engine.enhance_all(&mut doc)
        };
        info!(?state, records = engine.index().len(), enhanced, "Initial enrichment pass done");

        let watcher = ChangeWatcher::new(engine.clone(), document.clone()).spawn(batches);

        Ok(Self {
            engine,
            document,
            watcher,
        })
    }

    pub fn index_state(&self) -> IndexState {
        self.engine.index().state()
    }

    /// Unload hook: stop observing and wait for the watcher to drain.
    pub async fn shutdown(self) -> Result<WatchStats> {
        self.document.write().await.disconnect_observer();
        Ok(self.watcher.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Selector};
    use crate::metadata::decompress::compress;
    use tokio::sync::RwLock;

    fn entry(doc: &mut Document, href: &str) -> crate::dom::NodeId {
        let item = doc.create_element_with_class("div", "result-item");
        let h3 = doc.create_element("h3");
        let a = doc.create_element("a");
        doc.set_attribute(a, "href", href);
        doc.append_child(h3, a);
        let excerpt = doc.create_element_with_class("p", "result-excerpt");
        doc.append_children(item, [h3, excerpt]);
        item
    }

    fn texts(doc: &Document, scope: crate::dom::NodeId, selector: &str) -> Vec<String> {
        let sel = Selector::parse(selector).unwrap();
        doc.query_selector_all(scope, &sel)
            .into_iter()
            .map(|n| doc.text_content(n))
            .collect()
    }

    fn resources() -> ResourceLoader {
        ResourceLoader::embedded([
            ("tags.json", br#"["lien","notice"]"#.to_vec()),
            (
                "metadata.csv.gz",
                compress("id123,0|1,Desc text,2,2020-01-01\nid9,1,Other,1,\n").unwrap(),
            ),
        ])
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let document: SharedDocument = Arc::new(RwLock::new(Document::new()));
        let item = {
            let mut doc = document.write().await;
            let item = entry(&mut doc, "https://host/files/id123.pdf");
            let body = doc.body();
            doc.append_child(body, item);
            item
        };

        let session = PageSession::start(&EnricherConfig::default(), &resources(), document.clone())
            .await
            .unwrap();
        assert_eq!(session.index_state(), IndexState::Ready);

        {
            let doc = document.read().await;
            let excerpt = doc
                .query_selector(item, &Selector::parse(".result-excerpt").unwrap())
                .unwrap();
            assert_eq!(texts(&doc, excerpt, ".tag-chip"), vec!["lien", "notice"]);
            assert_eq!(texts(&doc, excerpt, ".enhanced-length"), vec!["2 pages"]);
            assert_eq!(texts(&doc, excerpt, ".enhanced-date"), vec!["2020-01-01"]);
            let desc = texts(&doc, excerpt, ".enhanced-description");
            assert_eq!(desc.len(), 1);
            assert!(desc[0].contains("Desc text"));
        }

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_late_entry_enhanced_by_watcher() {
        let document: SharedDocument = Arc::new(RwLock::new(Document::new()));
        let session = PageSession::start(&EnricherConfig::default(), &resources(), document.clone())
            .await
            .unwrap();

        let late = {
            let mut doc = document.write().await;
            let late = entry(&mut doc, "/files/id9.pdf");
            let body = doc.body();
            doc.append_child(body, late);
            late
        };

        let stats = session.shutdown().await.unwrap();
        assert_eq!(stats.enhanced, 1);

        let doc = document.read().await;
        assert_eq!(texts(&doc, late, ".enhanced-length"), vec!["1 page"]);
        assert_eq!(texts(&doc, late, ".enhanced-tags").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_page_untouched() {
        let document: SharedDocument = Arc::new(RwLock::new(Document::new()));
        let before = {
            let mut doc = document.write().await;
            let item = entry(&mut doc, "/files/id123.pdf");
            let body = doc.body();
            doc.append_child(body, item);
            doc.outer_html(body)
        };

        let loader = ResourceLoader::embedded(Vec::<(String, Vec<u8>)>::new());
        let session = PageSession::start(&EnricherConfig::default(), &loader, document.clone())
            .await
            .unwrap();
        assert_eq!(session.index_state(), IndexState::Failed);
        session.shutdown().await.unwrap();

        let doc = document.read().await;
        assert_eq!(doc.outer_html(doc.body()), before);
    }

    #[tokio::test]
    async fn test_invalid_selector_is_an_error() {
        let config = EnricherConfig {
            entry_selector: "div > .x".to_string(),
            ..EnricherConfig::default()
        };
        let document: SharedDocument = Arc::new(RwLock::new(Document::new()));
        assert!(PageSession::start(&config, &resources(), document).await.is_err());
    }
}
