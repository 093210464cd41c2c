//! Init command - write a default config and create the store

use anyhow::Result;
use colored::Colorize;

use super::Workspace;
use vidrecall::config::{self, EngineConfig};

pub fn execute(workspace: &Workspace, force: bool) -> Result<()> {
    let path = config::config_path(workspace.project());

    if path.exists() && !force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            "!".yellow(),
            path.display()
        );
    } else {
        config::save(workspace.project(), &EngineConfig::default())?;
        println!("{} Wrote {}", "✓".green(), path.display());
    }

    let config = workspace.config()?;
    let store = workspace.open_store(&config)?;
    store.save_index()?;
    println!(
        "{} Observation store ready at {} ({} dimensions)",
        "✓".green(),
        config.store.path,
        config.store.dimensions
    );
    println!();
    println!("Next: download the embedding model to {}", config.embeddings.model_path);
    println!("      then `vidrecall ingest <manifest.json>`");
    Ok(())
}
