use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Name of the transient concat manifest inside a working directory.
pub const MANIFEST_FILE_NAME: &str = "list.txt";

/// Root under which per-run working directories are created.
pub fn default_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("clipstitch")
}

/// A fresh, collision-free working directory for one compilation run.
pub fn run_dir(root: &Path) -> PathBuf {
    root.join(Uuid::new_v4().to_string())
}

pub fn manifest_path(work_dir: &Path) -> PathBuf {
    work_dir.join(MANIFEST_FILE_NAME)
}

/// Where the timebase-rewritten copy of a clip goes:
/// `<stem>_modified.<ext>`, next to the input.
pub fn normalized_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}_modified.{}", stem, ext.to_string_lossy()),
        None => format!("{stem}_modified"),
    };
    input.with_file_name(name)
}

/// File name for a finished compilation, unique per run.
pub fn compilation_file_name(login: &str) -> String {
    format!("{}-{}.mp4", login, Uuid::new_v4())
}
