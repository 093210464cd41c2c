//! Stats command - what is stored for a video

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::Workspace;
use vidrecall::cancel::CancelToken;
use vidrecall::storage::{Modality, ObservationSink, ObservationStore};

pub fn execute(workspace: &Workspace, video_id: &str, json: bool) -> Result<()> {
    let config = workspace.config()?;
    let store = workspace.open_store(&config)?;

    let visual = store.count(video_id, Modality::Visual)?;
    let audio = store.count(video_id, Modality::Audio)?;
    let summary = store.get_summary(video_id, config.retrieval.store_timeout(), &CancelToken::new())?;
    let total = store.count_all()?;

    if json {
        let stats = json!({
            "video_id": video_id,
            "visual": visual,
            "audio": audio,
            "summary": summary.is_some(),
            "store_total": total,
            "dimensions": store.dimension(),
        });
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", video_id.bold());
    println!("  visual observations: {}", visual);
    println!("  audio observations:  {}", audio);
    println!(
        "  summary:             {}",
        if summary.is_some() { "yes".green() } else { "no".dimmed() }
    );
    if visual + audio == 0 {
        println!("  {} nothing ingested for this video", "!".yellow());
    }
    println!("  store total:         {} ({} dimensions)", total, store.dimension());
    Ok(())
}
