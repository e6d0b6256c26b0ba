use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipstitchError {
    #[error("failed to create working directory {}: {}", .path.display(), .source)]
    CreateWorkDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to download clip {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("timebase rewrite failed for {}: {}", .input.display(), .reason)]
    NormalizeFailed { input: PathBuf, reason: String },

    #[error("failed to write concat manifest: {source}")]
    ManifestFailed { source: std::io::Error },

    #[error("concatenation failed: {reason}")]
    ConcatFailed { reason: String },

    #[error("failed to remove {}: {}", .path.display(), .source)]
    CleanupFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("user {login} does not exist on twitch")]
    UserNotFound { login: String },

    #[error("no clips found within the requested window")]
    NoClips,

    #[error("unable to get a new access token: {status} {detail}")]
    AuthFailed { status: u16, detail: String },

    #[error("twitch api request failed: {status} {detail}")]
    ApiFailed { status: u16, detail: String },

    #[error("unable to derive a file name from clip url {url}")]
    InvalidClipUrl { url: String },

    #[error(transparent)]
    Joined(#[from] JoinedErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClipstitchError>;

/// Logical join of independent per-item failures from a fan-out stage.
///
/// Every failed item stays individually inspectable through [`iter`];
/// the joined display renders one message per line.
///
/// [`iter`]: JoinedErrors::iter
#[derive(Debug, Default)]
pub struct JoinedErrors {
    errors: Vec<ClipstitchError>,
}

impl JoinedErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ClipstitchError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClipstitchError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing failed, otherwise the join itself.
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}

impl fmt::Display for JoinedErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for JoinedErrors {}
