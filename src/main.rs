//! Craft Graph Source - pulls a Craft element API into a cross-referenced node graph.

mod casing;
mod config;
mod error;
mod index;
mod node;
mod normalize;
mod pagination;
mod source;
mod store;
mod transport;

use anyhow::Context;
use config::SourceOptions;
use source::CraftSource;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use store::GraphStore;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::HttpTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so the graph can be piped from stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "craft_graph_source=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = match std::env::var("CRAFT_CONFIG") {
        Ok(path) => SourceOptions::load_from_file(Path::new(&path))?,
        Err(_) => SourceOptions::from_env()?,
    };
    info!(
        "Element types: {:?} (endpoint {}, {} concurrent)",
        options.element_types,
        options.endpoint(),
        options.concurrent
    );

    let transport = Arc::new(HttpTransport::new(options.endpoint()));
    let source = CraftSource::new(options, transport);
    let store = GraphStore::new();

    let report = source
        .run(&store)
        .await
        .with_context(|| format!("Ingestion from {} failed", source.options().base_url))?;

    if !report.is_complete() {
        warn!(
            "Graph is incomplete: {}",
            serde_json::to_string(&report.element_types)?
        );
    }

    let graph = serde_json::to_vec_pretty(&store.to_json()?)?;
    match std::env::var("CRAFT_OUTPUT") {
        Ok(path) => {
            std::fs::write(&path, &graph).with_context(|| format!("Failed to write {}", path))?;
            info!("Wrote {} nodes to {}", store.node_count(), path);
        }
        Err(_) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&graph)?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
