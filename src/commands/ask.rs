//! Ask command - answer a question about one video

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::sync::Arc;

use super::Workspace;
use vidrecall::cancel::CancelToken;
use vidrecall::embeddings::create_embedder;
use vidrecall::retrieval::snippet::{pair_line, window_line};
use vidrecall::retrieval::{
    ErrorKind, Query, QueryType, RetrievalEngine, RetrievalResult, SearchStatus,
};

#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub json: bool,
    /// Force a query type instead of classifying
    pub query_type: Option<String>,
    pub limit: Option<usize>,
}

pub fn execute(workspace: &Workspace, video_id: &str, question: &str, options: AskOptions) -> Result<()> {
    let mut config = workspace.config()?;
    if let Some(limit) = options.limit {
        config.retrieval.max_results = limit.max(1);
    }

    let forced = match options.query_type.as_deref() {
        Some(name) => Some(
            QueryType::parse(name)
                .ok_or_else(|| anyhow!("Unknown query type '{}' (visual, audio, both, summary)", name))?,
        ),
        None => None,
    };

    let store = workspace.open_store(&config)?;
    let embedder = create_embedder(&config.embeddings, config.store.dimensions)
        .context("Failed to create ONNX embedder")?;
    let engine = RetrievalEngine::new(Arc::new(store), embedder, config.retrieval);

    let mut query = Query::new(video_id, question);
    if let Some(query_type) = forced {
        query = query.with_type(query_type);
    }

    let result = match engine.retrieve_with_cancel(&query, &CancelToken::new()) {
        Ok(result) => result,
        Err(err) if err.kind == ErrorKind::NotFound && !options.json => {
            println!("{} {}", "No answer:".yellow(), err.message);
            return Ok(());
        }
        Err(err) => {
            let hint = if err.is_retryable() { " (retry later)" } else { "" };
            return Err(anyhow::Error::new(err).context(format!("Query failed{}", hint)));
        }
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result);
    Ok(())
}

fn print_result(result: &RetrievalResult) {
    match result {
        RetrievalResult::Summary { text } => {
            println!("{}", "Summary".bold());
            println!("{}", text);
        }
        RetrievalResult::Visual(set) | RetrievalResult::Audio(set) => {
            let heading = if matches!(result, RetrievalResult::Visual(_)) {
                "Visual matches"
            } else {
                "Audio matches"
            };
            println!("{} ({})", heading.bold(), status_label(set.status));
            for (i, entry) in set.windows.iter().enumerate() {
                println!("{:>2}. {} {}", i + 1, window_line(entry), score_label(entry.score));
            }
        }
        RetrievalResult::Both(set) => {
            println!(
                "{} (visual {}, audio {})",
                "Moments".bold(),
                status_label(set.visual_status),
                status_label(set.audio_status)
            );
            for (i, entry) in set.pairs.iter().enumerate() {
                println!("{:>2}. {} {}", i + 1, pair_line(entry), score_label(entry.score));
            }
            for note in &set.notes {
                println!("  {} {}", "!".yellow(), note);
            }
        }
    }
}

fn status_label(status: SearchStatus) -> colored::ColoredString {
    match status {
        SearchStatus::Found => "found".green(),
        SearchStatus::NotFound => "no matches".dimmed(),
        SearchStatus::Degraded => "unavailable".red(),
    }
}

fn score_label(score: f32) -> colored::ColoredString {
    format!("({:.2})", score).dimmed()
}
