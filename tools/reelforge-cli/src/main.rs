//! ReelForge CLI: command-line interface for building vertical reels.
//!
//! Usage:
//!   reelforge render <CONFIG> --media-dir <DIR>     Frame-accurate render with transitions
//!   reelforge preview <CONFIG> --media-dir <DIR>    Fast per-clip preview
//!   reelforge concat <CONFIG> --media-dir <DIR>     Stream-copy join of the timeline
//!   reelforge init <FOLDER>                         Write a timeline for a media folder
//!   reelforge validate <CONFIG> --media-dir <DIR>   Validate a timeline file
//!   reelforge info <CONFIG>                         Show timeline information
//!   reelforge check                                 Check ffmpeg tools and encoders

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelforge_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "reelforge",
    about = "Assemble vertical video reels from clips, photos and music",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Application config file (defaults to the user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the final reel with transitions
    Render {
        /// Timeline file (JSON)
        timeline: PathBuf,

        /// Directory holding the media files
        #[arg(short, long, default_value = ".")]
        media_dir: PathBuf,

        /// Output file path
        #[arg(short, long, default_value = "reel.mp4")]
        output: PathBuf,
    },

    /// Render a fast preview into the preview directory
    Preview {
        /// Timeline file (JSON)
        timeline: PathBuf,

        /// Directory holding the media files
        #[arg(short, long, default_value = ".")]
        media_dir: PathBuf,
    },

    /// Join the timeline's ranges with stream copy (no re-encode)
    Concat {
        /// Timeline file (JSON)
        timeline: PathBuf,

        /// Directory holding the media files
        #[arg(short, long, default_value = ".")]
        media_dir: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create a timeline for every video and photo in a folder
    Init {
        /// Media folder to scan
        folder: PathBuf,

        /// Timeline file to write
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate a timeline file and its sources
    Validate {
        /// Timeline file (JSON)
        timeline: PathBuf,

        /// Directory holding the media files
        #[arg(short, long, default_value = ".")]
        media_dir: PathBuf,
    },

    /// Show timeline information
    Info {
        /// Timeline file (JSON)
        timeline: PathBuf,
    },

    /// Check ffmpeg/ffprobe availability and the selected encoder
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelforge_common::logging::init_logging(&config.logging);
    tracing::debug!(config = ?config, "Loaded application config");

    match cli.command {
        Commands::Render {
            timeline,
            media_dir,
            output,
        } => commands::render::run(config, timeline, media_dir, output).await,
        Commands::Preview {
            timeline,
            media_dir,
        } => commands::render::run_preview(config, timeline, media_dir).await,
        Commands::Concat {
            timeline,
            media_dir,
            output,
        } => commands::concat::run(config, timeline, media_dir, output).await,
        Commands::Init { folder, output } => commands::init::run(folder, output),
        Commands::Validate {
            timeline,
            media_dir,
        } => commands::validate::run(timeline, media_dir),
        Commands::Info { timeline } => commands::info::run(timeline),
        Commands::Check => commands::check::run(config).await,
    }
}
