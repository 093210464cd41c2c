use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::Workspace;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Ask questions about what was seen and said in a video", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Project directory containing .vidrecall/
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Config file (defaults to <project>/.vidrecall/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the observation store
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Embed and store extracted observations from manifest files
    Ingest {
        /// JSON manifests (video_id, frames, words, summary)
        #[arg(required = true)]
        manifests: Vec<String>,
    },

    /// Ask a question about a video
    Ask {
        /// Video identifier used at ingestion
        video: String,

        /// The question
        question: String,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,

        /// Force the query type (visual, audio, both, summary)
        #[arg(long = "type")]
        query_type: Option<String>,

        /// Maximum windows or pairs to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show how a question would be classified
    Classify {
        question: String,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show stored observation counts for a video
    Stats {
        video: String,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    vidrecall::logging::init();
    let cli = Cli::parse();

    let workspace = Workspace {
        project: cli.global.project,
        config_file: cli.global.config,
    };

    match cli.command {
        Commands::Init { force } => {
            commands::init::execute(&workspace, force)?;
        }
        Commands::Ingest { manifests } => {
            commands::ingest::execute(&workspace, &manifests)?;
        }
        Commands::Ask {
            video,
            question,
            json,
            query_type,
            limit,
        } => {
            let options = commands::ask::AskOptions {
                json,
                query_type,
                limit,
            };
            commands::ask::execute(&workspace, &video, &question, options)?;
        }
        Commands::Classify { question, json } => {
            let config = workspace.config()?;
            commands::classify::execute(&question, config.retrieval.max_query_chars, json)?;
        }
        Commands::Stats { video, json } => {
            commands::stats::execute(&workspace, &video, json)?;
        }
    }

    Ok(())
}
