//! Invoking ExifTool to write the recovered tags.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::metadata::MetadataRecord;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with code {code:?} {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Something that can write tags into a media file in place.
pub trait MetadataTool: Send + Sync {
    /// Run once with `args` and block until it finishes.
    fn invoke(&self, args: &[OsString]) -> Result<(), ToolError>;
}

/// Arguments for one ExifTool call: overwrite in place, the three date tags,
/// the GPS tags when known, then the target file.
pub fn build_args(record: &MetadataRecord, target: &Path) -> Vec<OsString> {
    let date = record.exif_date();
    let mut args: Vec<OsString> = vec![
        "-overwrite_original".into(),
        format!("-DateTimeOriginal={date}").into(),
        format!("-CreateDate={date}").into(),
        format!("-ModifyDate={date}").into(),
    ];
    if let Some(geo) = &record.geo {
        args.push(format!("-GPSLatitude={}", geo.latitude).into());
        args.push(format!("-GPSLongitude={}", geo.longitude).into());
        args.push(format!("-GPSLatitudeRef={}", geo.latitude_ref()).into());
        args.push(format!("-GPSLongitudeRef={}", geo.longitude_ref()).into());
    }
    args.push(target.as_os_str().to_owned());
    args
}

/// The external `exiftool` executable.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn spawn_err(&self, source: std::io::Error) -> ToolError {
        ToolError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    /// Poll until the child exits or `timeout` passes. `None` means it was killed.
    fn wait_with_timeout(
        &self,
        child: &mut Child,
        timeout: Duration,
    ) -> Result<Option<ExitStatus>, ToolError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(|e| self.spawn_err(e))? {
                return Ok(Some(status));
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Read the child's stderr on a helper thread so a chatty tool cannot fill the pipe.
fn drain_stderr(child: &mut Child) -> Option<JoinHandle<Vec<u8>>> {
    let mut pipe = child.stderr.take()?;
    Some(std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    }))
}

impl MetadataTool for ExifTool {
    fn invoke(&self, args: &[OsString]) -> Result<(), ToolError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_err(e))?;
        let reader = drain_stderr(&mut child);

        let status = match self.timeout {
            None => child.wait().map_err(|e| self.spawn_err(e))?,
            Some(timeout) => match self.wait_with_timeout(&mut child, timeout)? {
                Some(status) => status,
                // Not joined: a leftover grandchild may still hold the pipe open
                None => return Err(ToolError::Timeout(timeout)),
            },
        };

        if status.success() {
            return Ok(());
        }
        let stderr = reader
            .and_then(|r| r.join().ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .unwrap_or_default();
        Err(ToolError::Exit {
            code: status.code(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::GeoPoint;
    use chrono::DateTime;

    fn record(geo: Option<GeoPoint>) -> MetadataRecord {
        MetadataRecord {
            epoch_seconds: 1_609_459_200,
            taken: DateTime::from_timestamp(1_609_459_200, 0).unwrap(),
            geo,
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_args_without_geo() {
        let args = strings(&build_args(&record(None), Path::new("/out/IMG_0001.JPG")));
        assert_eq!(
            args,
            vec![
                "-overwrite_original",
                "-DateTimeOriginal=2021:01:01 00:00:00",
                "-CreateDate=2021:01:01 00:00:00",
                "-ModifyDate=2021:01:01 00:00:00",
                "/out/IMG_0001.JPG",
            ]
        );
    }

    #[test]
    fn test_args_with_geo() {
        let geo = GeoPoint {
            latitude: 37.7749,
            longitude: -122.4194,
        };
        let args = strings(&build_args(&record(Some(geo)), Path::new("a.jpg")));
        assert_eq!(
            &args[4..],
            &[
                "-GPSLatitude=37.7749",
                "-GPSLongitude=-122.4194",
                "-GPSLatitudeRef=N",
                "-GPSLongitudeRef=W",
                "a.jpg",
            ]
        );
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let tool = ExifTool::new("/definitely/not/here/exiftool");
        assert!(matches!(tool.invoke(&[]), Err(ToolError::Spawn { .. })));
        let tool = tool.with_timeout(Some(Duration::from_secs(1)));
        assert!(matches!(tool.invoke(&[]), Err(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_and_timeout() {
        let fail = ExifTool::new("false");
        assert!(matches!(fail.invoke(&[]), Err(ToolError::Exit { code: Some(1), .. })));

        let ok = ExifTool::new("true");
        assert!(ok.invoke(&[]).is_ok());

        let slow = ExifTool::new("sleep").with_timeout(Some(Duration::from_millis(200)));
        assert!(matches!(slow.invoke(&["5".into()]), Err(ToolError::Timeout(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_reported_with_and_without_timeout() {
        let args: Vec<OsString> = vec!["-c".into(), "echo 'Error: Not a valid JPG' >&2; exit 3".into()];
        for tool in [
            ExifTool::new("sh"),
            ExifTool::new("sh").with_timeout(Some(Duration::from_secs(10))),
        ] {
            match tool.invoke(&args) {
                Err(ToolError::Exit { code, stderr }) => {
                    assert_eq!(code, Some(3));
                    assert_eq!(stderr, "Error: Not a valid JPG");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_stderr_is_kept() {
        let args: Vec<OsString> = vec!["-c".into(), "printf 'Error: caf\\351.jpg\\n' >&2; exit 2".into()];
        match ExifTool::new("sh").invoke(&args) {
            Err(ToolError::Exit { stderr, .. }) => {
                assert!(stderr.starts_with("Error: caf"));
                assert!(stderr.ends_with(".jpg"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
