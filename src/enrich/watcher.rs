use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{EnrichmentEngine, Enhancement};
use crate::dom::{Document, MutationBatch};

pub type SharedDocument = Arc<RwLock<Document>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub batches: usize,
    pub enhanced: usize,
}

/// Feeds entries inserted after initial load to the enrichment engine.
pub struct ChangeWatcher {
    engine: Arc<EnrichmentEngine>,
    document: SharedDocument,
}

impl ChangeWatcher {
    pub fn new(engine: Arc<EnrichmentEngine>, document: SharedDocument) -> Self {
        Self { engine, document }
    }

    /// Enhance every entry in one batch: an inserted node may itself be an
    /// entry or a container holding several.
    pub fn process_batch(&self, doc: &mut Document, batch: &MutationBatch) -> usize {
        let mut enhanced = 0;
        for &node in &batch.added {
            if doc.element(node).is_none() || !doc.is_connected(node) {
                continue;
            }
            let mut targets = Vec::new();
            if self.engine.is_entry(doc, node) {
                targets.push(node);
            }
            targets.extend(doc.query_selector_all(node, &self.engine.selectors().entry));

            for entry in targets {
                if self.engine.enhance(doc, entry) == Enhancement::Enhanced {
                    enhanced += 1;
                }
            }
        }
        enhanced
    }

    /// Drain batches until the document stops observing.
    pub async fn run(self, mut batches: mpsc::UnboundedReceiver<MutationBatch>) -> WatchStats {
        let mut stats = WatchStats::default();
        while let Some(batch) = batches.recv().await {
            let mut doc = self.document.write().await;
            let enhanced = self.process_batch(&mut doc, &batch);
            drop(doc);

            stats.batches += 1;
            stats.enhanced += enhanced;
            if enhanced > 0 {
                debug!(added = batch.added.len(), enhanced, "Mutation batch enhanced");
            }
        }
        info!(
            batches = stats.batches,
            enhanced = stats.enhanced,
            "Change watcher stopped"
        );
        stats
    }

    pub fn spawn(self, batches: mpsc::UnboundedReceiver<MutationBatch>) -> JoinHandle<WatchStats> {
        tokio::spawn(self.run(batches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::tests::{engine, marker_count, ready_index, result_item};

    #[test]
    fn test_batch_with_container_and_direct_entry() {
        let engine = Arc::new(engine(ready_index("a,0,x,,\nb,1,y,,\nc,0,z,,\n")));
        let watcher = ChangeWatcher::new(engine, Arc::new(RwLock::new(Document::new())));
        let mut doc = Document::new();
        let mut rx = doc.observe();

        let direct = result_item(&mut doc, "a.pdf");
        let container = doc.create_element_with_class("div", "results-page");
        let nested_b = result_item(&mut doc, "b.pdf");
        let nested_c = result_item(&mut doc, "c.pdf");
        doc.append_children(container, [nested_b, nested_c]);
        let body = doc.body();
        doc.append_children(body, [direct, container]);

        let batch = rx.try_recv().unwrap();
        assert_eq!(watcher.process_batch(&mut doc, &batch), 3);
        for item in [direct, nested_b, nested_c] {
            assert_eq!(marker_count(&doc, item), 1);
        }
    }

    #[test]
    fn test_detached_nodes_are_ignored() {
        let engine = Arc::new(engine(ready_index("a,0,x,,\n")));
        let watcher = ChangeWatcher::new(engine, Arc::new(RwLock::new(Document::new())));
        let mut doc = Document::new();
        let item = result_item(&mut doc, "a.pdf");

        let batch = MutationBatch { added: vec![item] };
        assert_eq!(watcher.process_batch(&mut doc, &batch), 0);
        assert_eq!(marker_count(&doc, item), 0);
    }

    #[tokio::test]
    async fn test_incremental_enrichment() {
        let engine = Arc::new(engine(ready_index("a,0,x,,\nb,1,y,,\n")));
        let document: SharedDocument = Arc::new(RwLock::new(Document::new()));

        let (first, rx) = {
            let mut doc = document.write().await;
            let rx = doc.observe();
            let first = result_item(&mut doc, "a.pdf");
            let body = doc.body();
            doc.append_child(body, first);
            engine.enhance_all(&mut doc);
            (first, rx)
        };

        let handle = ChangeWatcher::new(engine.clone(), document.clone()).spawn(rx);

        let second = {
            let mut doc = document.write().await;
            let second = result_item(&mut doc, "b.pdf");
            let body = doc.body();
            doc.append_child(body, second);
            second
        };

        // Unload hook: the watcher finishes once buffered batches are handled.
        document.write().await.disconnect_observer();
        let stats = handle.await.unwrap();
        assert_eq!(stats.enhanced, 1);

        let doc = document.read().await;
        assert_eq!(marker_count(&doc, first), 1);
        assert_eq!(marker_count(&doc, second), 1);
    }
}
