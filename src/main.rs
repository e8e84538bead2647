use std::sync::Arc;

use clap::Parser;
use tokio::sync::RwLock;
use tracing::{info, warn};

use result_enricher::dom::{Document, NodeId};
use result_enricher::metadata::loader::ResourceLoader;
use result_enricher::{EnricherConfig, PageSession};

/// Render a page of result entries for the given document ids and print it
/// after enrichment. Resource locations come from `ENRICH_*` variables.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document ids present when the page loads
    ids: Vec<String>,

    /// Id of an entry inserted after load (picked up by the change watcher)
    #[arg(long)]
    late: Option<String>,
}

/// Build a `.result-item` shaped the way search pages render them.
fn result_entry(doc: &mut Document, id: &str) -> NodeId {
    let item = doc.create_element_with_class("div", "result-item");
    let h3 = doc.create_element("h3");
    let link = doc.create_element("a");
    doc.set_attribute(link, "href", format!("/files/{}.pdf", id));
    let title = doc.create_text(id);
    doc.append_child(link, title);
    doc.append_child(h3, link);

    let excerpt = doc.create_element_with_class("p", "result-excerpt");
    let text = doc.create_text(format!("Excerpt for {}", id));
    doc.append_child(excerpt, text);
    doc.append_children(item, [h3, excerpt]);
    item
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = EnricherConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .init();

    let loader = ResourceLoader::from_location(&config.resource_base)?;
    info!(base = %config.resource_base, schema = ?config.row_schema, "Loading packaged resources");

    let document = Arc::new(RwLock::new(Document::new()));
    {
        let mut doc = document.write().await;
        let entries: Vec<NodeId> = args.ids.iter().map(|id| result_entry(&mut doc, id)).collect();
        let body = doc.body();
        doc.append_children(body, entries);
    }

    let session = PageSession::start(&config, &loader, document.clone()).await?;
    info!(state = ?session.index_state(), "Page initialized");

    if let Some(id) = &args.late {
        let mut doc = document.write().await;
        let entry = result_entry(&mut doc, id);
        let body = doc.body();
        doc.append_child(body, entry);
    }

    let stats = session.shutdown().await?;
    if args.late.is_some() && stats.enhanced == 0 {
        warn!("Late entry was not enhanced");
    }

    let doc = document.read().await;
    println!("{}", doc.inner_html(doc.body()));
    Ok(())
}
