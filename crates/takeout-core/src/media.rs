use std::path::{Path, PathBuf};

/// Extensions (lowercase, without the dot) that are treated as media.
pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "mp4", "mov", "avi", "mkv"];

/// Check whether a path carries one of the known media extensions (case-insensitive).
pub fn is_media_path(path: &Path) -> bool {
    media_extension(path).is_some()
}

fn media_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    MEDIA_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Absolute (or root-joined) path of the source file
    pub path: PathBuf,
    /// Path relative to the input root, mirrored into the output tree
    pub relative: PathBuf,
    /// Lowercase extension
    pub extension: String,
}

impl MediaFile {
    /// Build a `MediaFile` for `path` under `root`. Returns `None` when the
    /// path is not media or does not live under `root`.
    pub fn new(root: &Path, path: PathBuf) -> Option<Self> {
        let extension = media_extension(&path)?;
        let relative = path.strip_prefix(root).ok()?.to_path_buf();
        Some(Self {
            path,
            relative,
            extension,
        })
    }

    /// Just the filename
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }

    /// Filename with its last extension removed
    pub fn basename(&self) -> &str {
        basename_of(self.file_name())
    }
}

/// Strip the last `.ext` from a filename.
pub fn basename_of(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    }
}
