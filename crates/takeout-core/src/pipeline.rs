//! Bounded worker pool that drives discover → copy → match → apply.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;

use crate::control::RunControl;
use crate::discover::discover;
use crate::error::{RestoreError, Result};
use crate::events::{Event, EventCallback, RunStatus, RunSummary, Severity};
use crate::exiftool::{ExifTool, MetadataTool};
use crate::media::MediaFile;
use crate::sidecar::find_sidecar;
use crate::writer::{apply_metadata, copy_to_output, display_name};
use crate::RunOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

/// Counters shared by every worker during one run.
struct ProcessingState {
    total: u64,
    processed: AtomicU64,
    skipped: AtomicU64,
    matched: AtomicU64,
    unmatched: AtomicU64,
    applied: AtomicU64,
    warnings: AtomicU64,
    errors: AtomicU64,
}

impl ProcessingState {
    fn new(total: u64) -> Self {
        Self {
            total,
            processed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            matched: AtomicU64::new(0),
            unmatched: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    fn record_failure(&self, err: &RestoreError) {
        let counter = match err.severity() {
            Severity::Warn => &self.warnings,
            _ => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self, status: RunStatus) -> RunSummary {
        RunSummary {
            status,
            total: self.total,
            processed: self.processed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// One restore run. Owns its worker pool for the duration of [`Pipeline::run`].
pub struct Pipeline<T: MetadataTool = ExifTool> {
    options: RunOptions,
    tool: T,
    control: RunControl,
    started: AtomicBool,
    phase: Mutex<PipelineState>,
}

impl Pipeline<ExifTool> {
    pub fn new(options: RunOptions) -> Self {
        let tool = ExifTool::new(options.exiftool.clone()).with_timeout(options.tool_timeout());
        Self::with_tool(options, tool)
    }
}

impl<T: MetadataTool> Pipeline<T> {
    pub fn with_tool(options: RunOptions, tool: T) -> Self {
        Self {
            options,
            tool,
            control: RunControl::new(),
            started: AtomicBool::new(false),
            phase: Mutex::new(PipelineState::Idle),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Handle for pausing, resuming and cancelling from another thread.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn state(&self) -> PipelineState {
        match *self.lock_phase() {
            PipelineState::Running if self.control.is_paused() => PipelineState::Paused,
            phase => phase,
        }
    }

    /// Process every media file under the input root. Blocks until all
    /// dispatched jobs have finished.
    ///
    /// Per-file problems are reported through `events` and never abort the
    /// run; only a failed discovery or pool setup returns `Err`.
    pub fn run(&self, events: &EventCallback<'_>) -> Result<RunSummary> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RestoreError::InvalidState(format!(
                "pipeline already used ({:?})",
                self.state()
            )));
        }

        events(Event::log(Severity::Info, "=== STARTING PROCESS ==="));

        let media = discover(&self.options.input).map_err(|e| self.fail(e, events))?;
        let total = media.len() as u64;
        events(Event::log(
            Severity::Info,
            format!("Found {total} media files to process."),
        ));

        let state = ProcessingState::new(total);
        if total > 0 {
            let threads = self.options.worker_threads();
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("restore-worker-{i}"))
                .build()
                .map_err(|e| self.fail(e.into(), events))?;

            events(Event::log(
                Severity::Info,
                format!("Starting parallel processing with {threads} threads."),
            ));
            self.set_phase(PipelineState::Running);

            pool.install(|| {
                media
                    .par_iter()
                    .for_each(|m| self.run_job(m, &state, events));
            });
        }

        let status = if self.control.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        self.set_phase(match status {
            RunStatus::Cancelled => PipelineState::Cancelled,
            _ => PipelineState::Completed,
        });

        let summary = state.summary(status);
        tracing::debug!(?summary, "run finished");
        let banner = match status {
            RunStatus::Cancelled => "PROCESS CANCELLED BY USER",
            _ => "PROCESS COMPLETE",
        };
        events(Event::log(Severity::Info, format!("=== {banner} ===")));
        events(Event::log(
            Severity::Info,
            format!(
                "{} of {} files processed: {} restored, {} without JSON, {} warnings, {} errors",
                summary.processed,
                summary.total,
                summary.applied,
                summary.unmatched,
                summary.warnings,
                summary.errors
            ),
        ));
        events(Event::Finished(summary.clone()));
        Ok(summary)
    }

    /// One file. The pause/cancel checkpoint is taken once, before any work.
    fn run_job(&self, media: &MediaFile, state: &ProcessingState, events: &EventCallback<'_>) {
        if !self.control.checkpoint() {
            state.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let name = media.file_name();
        events(Event::log(Severity::Process, format!("Starting: {name}")));

        if let Err(e) = self.process_file(media, state, events) {
            state.record_failure(&e);
            events(Event::log(e.severity(), e.to_string()));
        }

        let processed = state.processed.fetch_add(1, Ordering::SeqCst) + 1;
        events(Event::Progress {
            processed,
            total: state.total,
            file_name: name.to_string(),
        });
    }

    fn process_file(
        &self,
        media: &MediaFile,
        state: &ProcessingState,
        events: &EventCallback<'_>,
    ) -> Result<()> {
        let dest = copy_to_output(media, &self.options.output)?;
        let name = media.file_name();

        let found = find_sidecar(&media.path).map_err(|e| {
            RestoreError::io(media.path.parent().unwrap_or(media.path.as_path()), e)
        })?;
        let Some(sidecar) = found else {
            state.unmatched.fetch_add(1, Ordering::Relaxed);
            let err = RestoreError::MatchNotFound {
                file: name.to_string(),
            };
            events(Event::log(err.severity(), err.to_string()));
            return Ok(());
        };

        state.matched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(file = name, strategy = ?sidecar.strategy, "sidecar matched");
        events(Event::log(
            Severity::Success,
            format!("Found JSON for {name} -> {}", display_name(&sidecar.path)),
        ));

        apply_metadata(&sidecar.path, &dest, &self.tool)?;
        state.applied.fetch_add(1, Ordering::Relaxed);
        events(Event::log(
            Severity::Success,
            format!("Applied metadata to {}", display_name(&dest)),
        ));
        Ok(())
    }

    fn fail(&self, err: RestoreError, events: &EventCallback<'_>) -> RestoreError {
        self.set_phase(PipelineState::Failed);
        events(Event::log(
            Severity::Fatal,
            format!("An error occurred: {err}"),
        ));
        events(Event::Finished(RunSummary::empty(RunStatus::Failed)));
        err
    }

    fn set_phase(&self, phase: PipelineState) {
        *self.lock_phase() = phase;
    }

    fn lock_phase(&self) -> std::sync::MutexGuard<'_, PipelineState> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }
}
