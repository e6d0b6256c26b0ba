use std::path::{Path, PathBuf};

use tokio::{fs, process::Command};
use tracing::{debug, warn};

use crate::{
    error::{ClipstitchError, JoinedErrors, Result},
    types::{CompileReport, NormalizeOutcome},
    workdir,
};

/// Track timescale every clip is rewritten to before concatenation.
/// Clips come from different encoders; mismatched timescales make the
/// concat demuxer produce broken timestamps.
pub const DEFAULT_TIMESCALE: u32 = 15360;

/// Drives the external ffmpeg binary: per-clip timebase rewrite, concat
/// manifest, final stream-copy assembly and intermediate cleanup.
#[derive(Debug, Clone)]
pub struct Compiler {
    work_dir: PathBuf,
    ffmpeg_path: PathBuf,
    timescale: u32,
    remove_sources: bool,
}

impl Compiler {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            timescale: DEFAULT_TIMESCALE,
            remove_sources: true,
        }
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_timescale(mut self, timescale: u32) -> Self {
        self.timescale = timescale;
        self
    }

    /// Whether each original download is deleted once its rewritten copy
    /// exists.
    pub fn with_remove_sources(mut self, remove: bool) -> Self {
        self.remove_sources = remove;
        self
    }

    /// Rewrites every clip's track timescale via stream copy, producing
    /// `<stem>_modified.<ext>` alongside each input.
    ///
    /// A failing clip keeps its siblings going; it is left out of the
    /// surviving set and reported through the joined failures. With
    /// source removal on, each original is deleted as soon as its
    /// rewritten copy exists.
    pub async fn normalize(&self, files: &[PathBuf]) -> NormalizeOutcome {
        let mut outcome = NormalizeOutcome::default();
        for input in files {
            let target = workdir::normalized_path(input);
            match self.rewrite_timescale(input, &target).await {
                Ok(()) => {
                    debug!(input = %input.display(), "timebase rewritten");
                    if self.remove_sources {
                        if let Err(source) = fs::remove_file(input).await {
                            outcome.failures.push(ClipstitchError::CleanupFailed {
                                path: input.clone(),
                                source,
                            });
                        }
                    }
                    outcome.normalized.push(target);
                }
                Err(error) => {
                    warn!(input = %input.display(), "timebase rewrite failed");
                    outcome.failures.push(error);
                }
            }
        }
        outcome
    }

    async fn rewrite_timescale(&self, input: &Path, target: &Path) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-c")
            .arg("copy")
            .arg("-video_track_timescale")
            .arg(self.timescale.to_string())
            .arg(target)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ClipstitchError::NormalizeFailed {
                input: input.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(())
    }

    /// Concatenates the rewritten clips into `output` via the concat
    /// demuxer, stream copy only.
    ///
    /// On success the manifest and every rewritten intermediate are
    /// removed; removal problems are reported in the returned report but
    /// never undo the produced file. On transcoder failure the
    /// intermediates stay behind for inspection and the diagnostic
    /// stderr is surfaced verbatim.
    pub async fn compile(&self, normalized: &[PathBuf], output: &Path) -> Result<CompileReport> {
        let manifest = self.write_manifest(normalized).await?;

        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&manifest)
            .arg("-c")
            .arg("copy")
            .arg(output)
            .output()
            .await?;

        if !result.status.success() {
            return Err(ClipstitchError::ConcatFailed {
                reason: String::from_utf8_lossy(&result.stderr).to_string(),
            });
        }

        let mut cleanup_failures = JoinedErrors::new();
        for intermediate in std::iter::once(&manifest).chain(normalized) {
            if let Err(source) = fs::remove_file(intermediate).await {
                cleanup_failures.push(ClipstitchError::CleanupFailed {
                    path: intermediate.clone(),
                    source,
                });
            }
        }

        Ok(CompileReport {
            output: output.to_path_buf(),
            cleanup_failures,
        })
    }

    /// Writes the concat manifest, one `file '<path>'` line per clip, in
    /// the order received. A half-written manifest is removed before the
    /// error comes back.
    async fn write_manifest(&self, files: &[PathBuf]) -> Result<PathBuf> {
        let path = workdir::manifest_path(&self.work_dir);
        if let Err(source) = fs::write(&path, render_manifest(files)).await {
            let manifest_error = ClipstitchError::ManifestFailed { source };
            return match fs::remove_file(&path).await {
                Ok(()) => Err(manifest_error),
                Err(remove_error) if remove_error.kind() == std::io::ErrorKind::NotFound => {
                    Err(manifest_error)
                }
                Err(remove_error) => {
                    let mut joined = JoinedErrors::new();
                    joined.push(manifest_error);
                    joined.push(ClipstitchError::CleanupFailed {
                        path,
                        source: remove_error,
                    });
                    Err(joined.into())
                }
            };
        }
        Ok(path)
    }
}

fn render_manifest(files: &[PathBuf]) -> String {
    let mut lines = String::new();
    for file in files {
        lines.push_str(&format!("file '{}'\n", file.display()));
    }
    lines
}
