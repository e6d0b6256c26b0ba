use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime, SecondsFormat};

use crate::error::{ClipstitchError, JoinedErrors, Result};

/// A clip download target: the remote locator plus the local base name
/// derived from its final path segment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSource {
    url: String,
    file_name: String,
}

impl ClipSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let without_query = url.split(['?', '#']).next().unwrap_or(url.as_str());
        let path = without_query
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(without_query);
        // The first segment is the host; the base name must come from
        // an actual path segment after it.
        let file_name = path
            .split('/')
            .skip(1)
            .last()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ClipstitchError::InvalidClipUrl { url: url.clone() })?;

        Ok(Self { url, file_name })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Inclusive day range a clip listing is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window start as an RFC 3339 timestamp at midnight UTC.
    pub fn started_at(&self) -> String {
        self.start
            .and_time(NaiveTime::MIN)
            .and_utc()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Window end as an RFC 3339 timestamp; the end day counts in full,
    /// so the bound sits at 23:59:59.
    pub fn ended_at(&self) -> String {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        self.end
            .and_time(end_of_day)
            .and_utc()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// What came out of the concurrent fetch stage. Every requested clip
/// lands either in `downloaded` or in `failures`, never both, never
/// neither.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub downloaded: Vec<PathBuf>,
    pub failures: JoinedErrors,
}

impl FetchOutcome {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Nothing was retrieved although something was asked for.
    pub fn is_total_failure(&self) -> bool {
        self.downloaded.is_empty() && !self.failures.is_empty()
    }
}

/// What came out of the timebase rewrite stage. Clips that failed to
/// rewrite are excluded from `normalized` and reported in `failures`.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub normalized: Vec<PathBuf>,
    pub failures: JoinedErrors,
}

/// A finished concatenation. Cleanup problems ride along instead of
/// failing the call; the output file exists either way.
#[derive(Debug)]
pub struct CompileReport {
    pub output: PathBuf,
    pub cleanup_failures: JoinedErrors,
}

/// End-of-run accounting handed back to the caller.
#[derive(Debug)]
pub struct CompilationSummary {
    pub output: PathBuf,
    pub clips_found: usize,
    pub clips_downloaded: usize,
    pub clips_compiled: usize,
    pub warnings: Vec<String>,
}
