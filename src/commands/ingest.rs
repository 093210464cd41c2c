//! Ingest command - store a video's extracted observations

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use super::Workspace;
use vidrecall::embeddings::create_embedder;
use vidrecall::ingest::{Ingestor, VideoManifest};

pub fn execute(workspace: &Workspace, manifests: &[String]) -> Result<()> {
    let config = workspace.config()?;
    let store = workspace.open_store(&config)?;
    let mut embedder = create_embedder(&config.embeddings, config.store.dimensions)
        .context("Failed to create ONNX embedder")?;

    println!(
        "✓ Loaded {} model ({} dimensions)",
        embedder.model_name(),
        embedder.dimension()
    );

    for manifest_path in manifests {
        let manifest = VideoManifest::load(Path::new(manifest_path))?;
        let report = Ingestor::new(&store, embedder.as_mut(), &config.ingest)
            .ingest(&manifest)
            .with_context(|| format!("Failed to ingest {}", manifest_path))?;

        println!(
            "{} {}: {} visual, {} audio{}",
            "✓".green(),
            report.video_id.bold(),
            report.visual,
            report.audio,
            if report.summary { ", summary" } else { "" }
        );
        if report.skipped_frames > 0 {
            println!("  {} skipped {} frames without captions", "!".yellow(), report.skipped_frames);
        }
    }

    // Index is only persisted on explicit save
    store.save_index()?;
    Ok(())
}
