use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::{fs, io::AsyncWriteExt, task::JoinSet};
use tracing::debug;

use crate::{
    error::{ClipstitchError, Result},
    types::{ClipSource, FetchOutcome},
};

/// Downloads clips concurrently into a destination directory, one task
/// per clip, collecting successes and failures independently.
#[derive(Debug, Clone, Default)]
pub struct ClipFetcher {
    client: reqwest::Client,
}

impl ClipFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher with a per-request deadline, so one hung retrieval fails
    /// that clip instead of stalling the join forever.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetches every clip into `dest_dir`.
    ///
    /// The directory is created first (with parents); if that fails,
    /// nothing is attempted and the call errors out with
    /// [`ClipstitchError::CreateWorkDir`]. After that point failures are
    /// strictly per-clip: a non-2xx status, a transport error or a local
    /// write error ends up in the outcome's joined failures and never
    /// cancels a sibling. Each clip gets exactly one attempt.
    pub async fn fetch_clips(&self, dest_dir: &Path, clips: &[ClipSource]) -> Result<FetchOutcome> {
        fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| ClipstitchError::CreateWorkDir {
                path: dest_dir.to_path_buf(),
                source,
            })?;

        let mut tasks = JoinSet::new();
        for clip in clips {
            let client = self.client.clone();
            let url = clip.url().to_string();
            // Names are derived from the locator, not completion order,
            // so the namespace is partitioned before any task starts.
            let path = dest_dir.join(clip.file_name());
            tasks.spawn(async move { download(&client, &url, &path).await.map(|()| path) });
        }

        let mut outcome = FetchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(path)) => {
                    debug!(path = %path.display(), "clip downloaded");
                    outcome.downloaded.push(path);
                }
                Ok(Err(error)) => outcome.failures.push(error),
                Err(join_error) => outcome
                    .failures
                    .push(ClipstitchError::Io(std::io::Error::other(join_error))),
            }
        }
        Ok(outcome)
    }
}

async fn download(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let failed = |reason: String| ClipstitchError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| failed(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".to_string());
        return Err(failed(format!("{status} {body}")));
    }

    let mut file = fs::File::create(path)
        .await
        .map_err(|error| failed(error.to_string()))?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|error| failed(error.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|error| failed(error.to_string()))?;
    }
    file.flush().await.map_err(|error| failed(error.to_string()))?;

    Ok(())
}
