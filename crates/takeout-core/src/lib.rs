pub mod control;
pub mod discover;
pub mod error;
pub mod events;
pub mod exiftool;
pub mod media;
pub mod metadata;
pub mod pipeline;
pub mod power;
pub mod sidecar;
pub mod writer;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use control::RunControl;
pub use error::{RestoreError, Result};
pub use events::{Event, EventCallback, RunStatus, RunSummary, Severity};
pub use exiftool::{ExifTool, MetadataTool, ToolError};
pub use pipeline::{Pipeline, PipelineState};
pub use power::{NoopPower, PostAction, PowerControl};

fn default_exiftool() -> PathBuf {
    PathBuf::from("exiftool")
}

/// Delay between a completed run and the requested shutdown.
pub const SHUTDOWN_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Unpacked Takeout folder
    pub input: PathBuf,
    /// Where the restored copies go, mirroring `input`
    pub output: PathBuf,
    #[serde(default = "default_exiftool")]
    pub exiftool: PathBuf,
    /// Worker count; defaults to the available hardware parallelism
    #[serde(default)]
    pub threads: Option<usize>,
    /// Kill an ExifTool call after this many seconds. Unset means wait forever.
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
    #[serde(default)]
    pub post_action: PostAction,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            exiftool: default_exiftool(),
            threads: None,
            tool_timeout_secs: None,
            post_action: PostAction::default(),
        }
    }

    pub fn worker_threads(&self) -> usize {
        self.threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    /// Reject option sets that cannot produce a sensible run.
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() || self.output.as_os_str().is_empty() {
            return Err(RestoreError::Config(
                "input and output folders are required".into(),
            ));
        }
        // An output inside the input would be rediscovered and mirrored again on the next run
        if resolve_path(&self.output).starts_with(resolve_path(&self.input)) {
            return Err(RestoreError::Config(
                "output folder must not be the input folder or inside it".into(),
            ));
        }
        if self.exiftool.as_os_str().is_empty() {
            return Err(RestoreError::Config("ExifTool path is required".into()));
        }
        // A bare program name is looked up on PATH at spawn time
        let has_dir = self.exiftool.components().count() > 1
            || self
                .exiftool
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if has_dir && !self.exiftool.exists() {
            return Err(RestoreError::Config(format!(
                "ExifTool executable not found at {}",
                self.exiftool.display()
            )));
        }
        if self.threads == Some(0) {
            return Err(RestoreError::Config("threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// Canonical form of `path`, resolving the longest existing ancestor when
/// the path itself does not exist yet.
fn resolve_path(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if let Ok(resolved) = ancestor.canonicalize() {
            return match path.strip_prefix(ancestor) {
                Ok(rest) => resolved.join(rest),
                Err(_) => resolved,
            };
        }
    }
    path.to_path_buf()
}

/// Run `pipeline`, applying its configured [`PostAction`] through `power`.
pub fn restore<T: MetadataTool>(
    pipeline: &Pipeline<T>,
    power: &dyn PowerControl,
    events: &EventCallback<'_>,
) -> Result<RunSummary> {
    let action = pipeline.options().post_action;

    if action == PostAction::KeepAwake {
        match power.keep_awake() {
            Ok(()) => events(Event::log(
                Severity::Info,
                "Power management enabled: System will be kept awake.",
            )),
            Err(e) => events(Event::log(
                Severity::Warn,
                format!("Could not keep the system awake: {e}"),
            )),
        }
    }

    let result = pipeline.run(events);

    if action == PostAction::KeepAwake {
        power.release();
    }

    if let Ok(summary) = &result {
        if action == PostAction::Shutdown && summary.status == RunStatus::Completed {
            events(Event::log(
                Severity::Action,
                format!(
                    "Shutting down computer in {} seconds...",
                    SHUTDOWN_DELAY.as_secs()
                ),
            ));
            if let Err(e) = power.schedule_shutdown(SHUTDOWN_DELAY) {
                events(Event::log(
                    Severity::Warn,
                    format!("Failed to schedule shutdown: {e}"),
                ));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct PowerLog(Mutex<Vec<String>>);

    impl PowerControl for PowerLog {
        fn keep_awake(&self) -> std::io::Result<()> {
            self.0.lock().unwrap().push("awake".into());
            Ok(())
        }

        fn release(&self) {
            self.0.lock().unwrap().push("release".into());
        }

        fn schedule_shutdown(&self, after: Duration) -> std::io::Result<()> {
            self.0.lock().unwrap().push(format!("shutdown {}", after.as_secs()));
            Ok(())
        }
    }

    struct NullTool;

    impl MetadataTool for NullTool {
        fn invoke(&self, _args: &[OsString]) -> std::result::Result<(), ToolError> {
            Ok(())
        }
    }

    fn options_with(action: PostAction, input: PathBuf, output: PathBuf) -> RunOptions {
        let mut options = RunOptions::new(input, output);
        options.threads = Some(2);
        options.post_action = action;
        options
    }

    #[test]
    fn test_validate() {
        let mut options = RunOptions::new("/takeout", "/restored");
        assert!(options.validate().is_ok());

        options.exiftool = PathBuf::from("/definitely/not/here/exiftool");
        assert!(matches!(options.validate(), Err(RestoreError::Config(_))));

        options.exiftool = default_exiftool();
        options.threads = Some(0);
        assert!(options.validate().is_err());

        let same = RunOptions::new("/takeout", "/takeout");
        assert!(same.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_output_inside_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("Takeout");
        std::fs::create_dir_all(&input).unwrap();

        let nested = RunOptions::new(&input, input.join("restored"));
        assert!(matches!(nested.validate(), Err(RestoreError::Config(_))));

        let dotted = RunOptions::new(&input, input.join(".").join("restored"));
        assert!(dotted.validate().is_err());

        let sibling = RunOptions::new(&input, dir.path().join("restored"));
        assert!(sibling.validate().is_ok());

        // A shared name prefix is not nesting
        let prefixed = RunOptions::new(&input, dir.path().join("Takeout-restored"));
        assert!(prefixed.validate().is_ok());
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let options: RunOptions =
            serde_json::from_str(r#"{"input":"/in","output":"/out","post_action":"keep-awake"}"#)
                .unwrap();
        assert_eq!(options.exiftool, PathBuf::from("exiftool"));
        assert_eq!(options.post_action, PostAction::KeepAwake);
        assert_eq!(options.tool_timeout(), None);
        assert!(options.worker_threads() >= 1);
    }

    #[test]
    fn test_keep_awake_wraps_run() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        std::fs::write(input.path().join("a.jpg"), b"x").unwrap();

        let pipeline = Pipeline::with_tool(
            options_with(PostAction::KeepAwake, input.path().into(), output.path().into()),
            NullTool,
        );
        let power = PowerLog::default();
        let summary = restore(&pipeline, &power, &|_: Event| {}).unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(*power.0.lock().unwrap(), vec!["awake", "release"]);
    }

    #[test]
    fn test_shutdown_only_after_completion() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        std::fs::write(input.path().join("a.jpg"), b"x").unwrap();

        let pipeline = Pipeline::with_tool(
            options_with(PostAction::Shutdown, input.path().into(), output.path().into()),
            NullTool,
        );
        let power = PowerLog::default();
        let events = Mutex::new(Vec::new());
        restore(&pipeline, &power, &|e: Event| events.lock().unwrap().push(e)).unwrap();
        assert_eq!(*power.0.lock().unwrap(), vec!["shutdown 60"]);
        assert!(events.lock().unwrap().iter().any(|e| matches!(
            e,
            Event::Log { severity: Severity::Action, .. }
        )));

        let cancelled = Pipeline::with_tool(
            options_with(PostAction::Shutdown, input.path().into(), output.path().into()),
            NullTool,
        );
        cancelled.control().cancel();
        let power = PowerLog::default();
        let summary = restore(&cancelled, &power, &|_: Event| {}).unwrap();
        assert_eq!(summary.status, RunStatus::Cancelled);
        assert!(power.0.lock().unwrap().is_empty());
    }
}
