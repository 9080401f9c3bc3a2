use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RestoreError, Result};
use crate::exiftool::{build_args, MetadataTool};
use crate::media::MediaFile;
use crate::metadata::{parse_sidecar, MetadataRecord};

/// Copy `media` into `output_root`, keeping its path relative to the input root.
/// Returns the destination path.
pub fn copy_to_output(media: &MediaFile, output_root: &Path) -> Result<PathBuf> {
    let dest = output_root.join(&media.relative);
    if let Some(parent) = dest.parent() {
        // create_dir_all treats a directory created concurrently by a sibling worker as success
        fs::create_dir_all(parent).map_err(|e| RestoreError::io(parent, e))?;
    }
    fs::copy(&media.path, &dest).map_err(|e| RestoreError::io(&dest, e))?;

    // Carry the source mtime over so re-runs leave unmatched files unchanged too
    let source_meta = fs::metadata(&media.path).map_err(|e| RestoreError::io(&media.path, e))?;
    let mtime = filetime::FileTime::from_last_modification_time(&source_meta);
    filetime::set_file_mtime(&dest, mtime).map_err(|e| RestoreError::io(&dest, e))?;
    Ok(dest)
}

/// Write the sidecar's date (and location) into `target` with `tool`, then
/// set the file's mtime to the capture time.
pub fn apply_metadata(
    sidecar: &Path,
    target: &Path,
    tool: &dyn MetadataTool,
) -> Result<MetadataRecord> {
    let bytes = fs::read(sidecar).map_err(|e| RestoreError::io(sidecar, e))?;
    let record = parse_sidecar(&bytes).map_err(|source| RestoreError::MetadataParse {
        sidecar: sidecar.to_path_buf(),
        source,
    })?;

    let args = build_args(&record, target);
    tracing::debug!(target = %target.display(), ?args, "invoking metadata tool");
    tool.invoke(&args).map_err(|source| RestoreError::ExternalTool {
        file: display_name(target),
        source,
    })?;

    let ft = filetime::FileTime::from_unix_time(record.epoch_seconds, 0);
    filetime::set_file_mtime(target, ft).map_err(|e| RestoreError::io(target, e))?;

    Ok(record)
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
