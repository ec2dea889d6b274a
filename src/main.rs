use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use formbridge::{
    ContentSource, Document, DynamicViewer, Engine, EngineConfig, FileContentSource,
};

fn main() {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    if let Err(err) = run() {
        error!(target = "main", "{err:#}");
        eprintln!("formbridge: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Some(content_path) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: formbridge <content-file>");
    };

    let config_path = std::env::var("FORMBRIDGE_CONFIG").ok().map(PathBuf::from);
    let config = EngineConfig::load(config_path).unwrap_or_else(|err| {
        eprintln!("Failed to load engine configuration: {err}. Using defaults.");
        EngineConfig::default()
    });

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let source = FileContentSource::new(&content_path);
    let descriptors = rt
        .block_on(source.fetch())
        .with_context(|| format!("failed to load {}", content_path.display()))?;
    info!(target = "main", count = descriptors.len(), "loaded content");

    let document = Document::new();
    let body = document.body()?;
    document.set_inner_html(&body, r#"<main id="dynamic-content"></main>"#);
    let container = document
        .get_element_by_id("dynamic-content")
        .context("host container missing")?;

    let engine = Engine::new(document.clone(), config);
    let mut diagnostics = engine.diagnostics().subscribe();
    let viewer = DynamicViewer::new(engine, container);

    for descriptor in &descriptors {
        viewer.present(descriptor)?;
        document.pump();

        println!("== {} ==", descriptor.id);
        println!("{}", viewer.container().inner_html());
        println!("styles: {:?}", viewer.engine().styles().active_ids());
        if let Some(model) = viewer.engine().model(&descriptor.id) {
            println!("model: {}", serde_json::Value::Object(model.raw_value()));
            println!("status: {:?}", model.status());
        }
        while let Ok(diagnostic) = diagnostics.try_recv() {
            println!("[{}] {}: {}", diagnostic.kind, diagnostic.content_id, diagnostic.message);
        }
    }

    viewer.teardown();
    Ok(())
}
