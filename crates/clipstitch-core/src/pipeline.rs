use std::path::PathBuf;

use tracing::{info, warn};

use crate::{
    compiler::Compiler,
    error::{ClipstitchError, Result},
    fetch::ClipFetcher,
    twitch::TwitchService,
    types::{CompilationSummary, DateWindow},
    workdir,
};

/// Stages a compilation run moves through. Linear, no back edges;
/// `Aborted` is terminal and only reachable while there is nothing left
/// to stitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Normalizing,
    Concatenating,
    Done,
    Aborted,
}

/// What to compile: whose clips, over which window, and how many at
/// most.
#[derive(Debug, Clone)]
pub struct CompilationRequest {
    pub login: String,
    pub window: DateWindow,
    pub max_clips: u32,
}

/// Sequences one compilation run: resolve the creator, list clips,
/// fetch them concurrently, rewrite timebases and concatenate. Owns the
/// working directory; the stage components never reach outside it.
pub struct Pipeline {
    twitch: TwitchService,
    fetcher: ClipFetcher,
    work_dir: PathBuf,
    ffmpeg_path: PathBuf,
    keep_downloads: bool,
    output_name: Option<String>,
}

impl Pipeline {
    pub fn new(twitch: TwitchService, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            twitch,
            fetcher: ClipFetcher::new(),
            work_dir: work_dir.into(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            keep_downloads: false,
            output_name: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: ClipFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Keep the original downloads instead of deleting them as soon as
    /// their rewritten copies exist.
    pub fn with_keep_downloads(mut self, keep: bool) -> Self {
        self.keep_downloads = keep;
        self
    }

    /// Fixed output file name; defaults to `<login>-<uuid>.mp4`.
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Runs the whole pipeline and returns where the compilation
    /// landed.
    ///
    /// A fetch that retrieves nothing aborts the run, as does a
    /// normalize stage that leaves nothing usable; partial failures in
    /// either stage downgrade to warnings on the summary. Any
    /// concatenation failure is fatal and surfaced verbatim.
    pub async fn run(&self, request: &CompilationRequest) -> Result<CompilationSummary> {
        let mut warnings = Vec::new();

        let broadcaster_id = self.twitch.resolve_user(&request.login).await?;
        let clips = self
            .twitch
            .list_clips(&broadcaster_id, request.window, request.max_clips)
            .await?;
        if clips.is_empty() {
            return Err(ClipstitchError::NoClips);
        }
        info!(login = %request.login, clips = clips.len(), "clips located");

        enter(Stage::Fetching);
        let fetched = self.fetcher.fetch_clips(&self.work_dir, &clips).await?;
        if fetched.is_total_failure() {
            enter(Stage::Aborted);
            return Err(fetched.failures.into());
        }
        if fetched.has_failures() {
            warn!(
                failed = fetched.failures.len(),
                downloaded = fetched.downloaded.len(),
                "continuing with the clips that downloaded"
            );
            warnings.push(format!(
                "{} clip(s) failed to download:\n{}",
                fetched.failures.len(),
                fetched.failures
            ));
        }

        enter(Stage::Normalizing);
        let compiler = Compiler::new(&self.work_dir)
            .with_ffmpeg_path(&self.ffmpeg_path)
            .with_remove_sources(!self.keep_downloads);
        let normalized = compiler.normalize(&fetched.downloaded).await;
        if normalized.normalized.is_empty() {
            enter(Stage::Aborted);
            return Err(normalized.failures.into());
        }
        if !normalized.failures.is_empty() {
            warnings.push(format!(
                "{} clip(s) failed to normalize:\n{}",
                normalized.failures.len(),
                normalized.failures
            ));
        }

        enter(Stage::Concatenating);
        let file_name = self
            .output_name
            .clone()
            .unwrap_or_else(|| workdir::compilation_file_name(&request.login));
        let output = self.work_dir.join(file_name);
        let report = compiler.compile(&normalized.normalized, &output).await?;
        for failure in report.cleanup_failures.iter() {
            warn!(%failure, "cleanup problem after successful compile");
            warnings.push(failure.to_string());
        }

        enter(Stage::Done);
        Ok(CompilationSummary {
            output: report.output,
            clips_found: clips.len(),
            clips_downloaded: fetched.downloaded.len(),
            clips_compiled: normalized.normalized.len(),
            warnings,
        })
    }
}

fn enter(stage: Stage) {
    info!(stage = ?stage, "pipeline stage");
}
