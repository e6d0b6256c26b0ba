use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use clipstitch_core::{
    ClipFetcher, CompilationRequest, DateWindow, Pipeline, TwitchConfig, TwitchService, workdir,
};

/// Upstream listing cap; the metadata API pages beyond this.
const MAX_CLIPS: u32 = 10;

#[derive(Parser)]
#[command(name = "clipstitch")]
#[command(
    about = "Download a Twitch creator's clips for a date range and stitch them into one video"
)]
struct Cli {
    /// Twitch login of the creator
    username: String,

    /// First day of the clip window (YYYY-MM-DD)
    #[arg(short, long)]
    start: NaiveDate,

    /// Last day of the clip window (YYYY-MM-DD), inclusive
    #[arg(short, long)]
    end: NaiveDate,

    /// Maximum number of clips to include (capped at 10)
    #[arg(short, long, default_value_t = 5)]
    count: u32,

    /// File name for the final compilation
    #[arg(short, long)]
    output: Option<String>,

    /// Working directory; defaults to a fresh directory under the user
    /// cache
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Keep the downloaded clips next to the compilation
    #[arg(long)]
    keep_downloads: bool,

    /// Per-clip download timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let client_id = std::env::var("TWITCH_CLIENT_ID").context("TWITCH_CLIENT_ID is not set")?;
    let client_secret =
        std::env::var("TWITCH_CLIENT_SECRET").context("TWITCH_CLIENT_SECRET is not set")?;
    let mut config = TwitchConfig::new(client_id, client_secret);
    if let Ok(auth_base_url) = std::env::var("TWITCH_AUTH_BASE_URL") {
        config.auth_base_url = auth_base_url;
    }
    if let Ok(api_base_url) = std::env::var("TWITCH_API_BASE_URL") {
        config.api_base_url = api_base_url;
    }

    println!(
        "\n{}  {}\n",
        style("clipstitch").cyan().bold(),
        style("Clip Compiler").dim()
    );

    let spinner = create_spinner("Connecting to Twitch...");
    let twitch = match TwitchService::connect(config).await {
        Ok(twitch) => {
            spinner.finish_with_message(format!("{} Connected", style("✓").green().bold()));
            twitch
        }
        Err(error) => {
            spinner.finish_and_clear();
            eprintln!("{} {}", style("Error:").red().bold(), error);
            std::process::exit(1);
        }
    };

    let work_dir = cli
        .work_dir
        .unwrap_or_else(|| workdir::run_dir(&workdir::default_root()));
    let fetcher = ClipFetcher::with_timeout(Duration::from_secs(cli.timeout))?;

    let mut pipeline = Pipeline::new(twitch, &work_dir)
        .with_fetcher(fetcher)
        .with_ffmpeg_path(&cli.ffmpeg)
        .with_keep_downloads(cli.keep_downloads);
    if let Some(output) = cli.output {
        pipeline = pipeline.with_output_name(output);
    }

    let request = CompilationRequest {
        login: cli.username,
        window: DateWindow::new(cli.start, cli.end),
        max_clips: cli.count.min(MAX_CLIPS),
    };

    let spinner = create_spinner("Compiling clips...");
    match pipeline.run(&request).await {
        Ok(summary) => {
            spinner.finish_with_message(format!(
                "{} Compiled {} of {} clips",
                style("✓").green().bold(),
                summary.clips_compiled,
                summary.clips_found,
            ));
            for warning in &summary.warnings {
                println!("{} {}", style("!").yellow().bold(), warning);
            }
            println!(
                "\n{} {}\n",
                style("Saved:").dim(),
                style(summary.output.display()).cyan()
            );
            Ok(())
        }
        Err(error) => {
            spinner.finish_and_clear();
            eprintln!("{} {}", style("Error:").red().bold(), error);
            std::process::exit(1);
        }
    }
}
