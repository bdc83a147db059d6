//! CLI command implementations

use anyhow::{bail, Context};
use skyplan_core::{migrate, ContainmentPolicy, DesignEngine, NodeKind, StorageConfig, StoredDesign, SCHEMA_VERSION};
use skyplan_server::{ServerConfig, SkyplanServer};
use std::path::Path;

fn open_engine(storage: &StorageConfig, policy: ContainmentPolicy) -> DesignEngine {
    DesignEngine::with_store(storage.open()).with_policy(policy)
}

pub async fn serve(storage: &StorageConfig, policy: ContainmentPolicy, host: String, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting Skyplan server on {}:{}", host, port);

    let engine = open_engine(storage, policy);
    tracing::info!(
        "Serving design '{}' ({} nodes, {} edges) from {}",
        engine.document().name(),
        engine.graph().node_count(),
        engine.graph().edge_count(),
        storage.file_storage().record_path(&storage.record).display()
    );

    let server = SkyplanServer::new(engine, ServerConfig { host, port });
    server.start().await
}

pub fn show(storage: &StorageConfig) -> anyhow::Result<()> {
    let engine = open_engine(storage, ContainmentPolicy::default());
    let document = engine.document();
    let graph = document.graph();

    println!("Design:    {}", document.name());
    println!("Id:        {}", document.design_id().unwrap_or("(unsaved)"));
    println!("Language:  {:?}", engine.language());
    println!("Nodes:     {}", graph.node_count());
    for kind in [
        NodeKind::VpcEnvironment,
        NodeKind::PublicSubnet,
        NodeKind::PrivateSubnet,
        NodeKind::Service,
    ] {
        let count = graph.nodes_of_kind(kind).count();
        if count > 0 {
            println!("  {:<16} {}", kind, count);
        }
    }
    println!("Edges:     {}", graph.edge_count());

    if let Some(report) = engine.last_repair().filter(|r| !r.is_clean()) {
        println!(
            "Repairs:   {} dropped nodes, {} detached parents, {} dropped edges{}",
            report.dropped_nodes.len(),
            report.detached_parents.len(),
            report.dropped_edges.len(),
            if report.discarded_by_version { " (stored version discarded)" } else { "" }
        );
    }
    Ok(())
}

pub fn hierarchy(storage: &StorageConfig) -> anyhow::Result<()> {
    let loaded = storage.open().load();
    let outline = loaded.document.graph().vpc_hierarchy();
    println!("{}", serde_json::to_string_pretty(&outline)?);
    Ok(())
}

pub fn repair(storage: &StorageConfig, dry_run: bool) -> anyhow::Result<()> {
    let store = storage.open();
    let loaded = store.load();
    println!("{}", serde_json::to_string_pretty(&loaded.report)?);

    if loaded.report.is_clean() {
        tracing::info!("Stored design is clean");
    } else if dry_run {
        tracing::info!("Dry run: stored design left untouched");
    } else if loaded.report.unreadable_record {
        bail!("stored design '{}' is unreadable; not overwriting it", store.record());
    } else {
        store.save(&loaded.document, loaded.language)?;
        tracing::info!("Repaired design written back to record '{}'", store.record());
    }
    Ok(())
}

pub fn export(storage: &StorageConfig, file: &Path) -> anyhow::Result<()> {
    let loaded = storage.open().load();
    let json = StoredDesign::capture(&loaded.document, loaded.language)?.to_json()?;

    if file == Path::new("-") {
        println!("{}", json);
    } else {
        std::fs::write(file, json).with_context(|| format!("failed to write {}", file.display()))?;
        tracing::info!("Exported '{}' to {}", loaded.document.name(), file.display());
    }
    Ok(())
}

pub fn import(storage: &StorageConfig, policy: ContainmentPolicy, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let stored = StoredDesign::from_json(&raw).with_context(|| format!("{} is not a design file", file.display()))?;

    let loaded = migrate(stored);
    if loaded.report.discarded_by_version {
        bail!(
            "{} has schema version {:?}; this build reads version {} and newer",
            file.display(),
            loaded.report.stored_version,
            SCHEMA_VERSION
        );
    }

    let (nodes, edges) = loaded.document.graph().to_parts();
    let mut engine = open_engine(storage, policy);
    engine.set_language(loaded.language);
    engine.load_design(
        nodes,
        edges,
        loaded.document.name(),
        loaded.document.design_id().map(str::to_string),
    );

    tracing::info!(
        "Imported '{}' from {}: {} nodes, {} edges",
        engine.document().name(),
        file.display(),
        engine.graph().node_count(),
        engine.graph().edge_count()
    );
    if !loaded.report.is_clean() {
        println!("{}", serde_json::to_string_pretty(&loaded.report)?);
    }
    Ok(())
}

pub fn clear(storage: &StorageConfig) -> anyhow::Result<()> {
    tracing::info!("Clearing stored design under: {}", storage.root.display());

    storage.open().clear()?;

    tracing::info!("Design cleared");
    Ok(())
}
