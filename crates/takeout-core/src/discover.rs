use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{RestoreError, Result};
use crate::media::MediaFile;

/// Recursively collect media files under `root`.
///
/// Any failure to read the tree is fatal for the run: a partial work list
/// would silently leave files behind.
pub fn discover(root: &Path) -> Result<Vec<MediaFile>> {
    let discovery_err = |source: io::Error| RestoreError::Discovery {
        root: root.to_path_buf(),
        source,
    };

    let meta = fs::metadata(root).map_err(discovery_err)?;
    if !meta.is_dir() {
        return Err(discovery_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut media = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| discovery_err(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(m) = MediaFile::new(root, entry.into_path()) {
            media.push(m);
        }
    }

    Ok(media)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_discover_filters_media() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Photos from 2021/nested")).unwrap();
        for name in [
            "Photos from 2021/IMG_0001.JPG",
            "Photos from 2021/IMG_0001.JPG.json",
            "Photos from 2021/nested/VID_0002.mp4",
            "Photos from 2021/nested/clip.MKV",
            "readme.txt",
            "top.heic",
        ] {
            fs::write(root.join(name), b"x").unwrap();
        }
        // A directory that looks like media is not a file
        fs::create_dir_all(root.join("folder.jpg")).unwrap();

        let found = discover(root).unwrap();
        let mut rel: Vec<PathBuf> = found.iter().map(|m| m.relative.clone()).collect();
        rel.sort();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("Photos from 2021/IMG_0001.JPG"),
                PathBuf::from("Photos from 2021/nested/VID_0002.mp4"),
                PathBuf::from("Photos from 2021/nested/clip.MKV"),
                PathBuf::from("top.heic"),
            ]
        );
        assert!(found.iter().all(|m| m.path.starts_with(root)));
    }

    #[test]
    fn test_discover_missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let err = discover(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, RestoreError::Discovery { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_discover_file_root_is_fatal() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(discover(&file), Err(RestoreError::Discovery { .. })));
    }
}
