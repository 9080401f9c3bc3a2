mod power;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use takeout_core::{Event, Pipeline, PostAction, RunControl, RunOptions, RunStatus, Severity};
use tracing_subscriber::EnvFilter;

use crate::power::SystemPower;

#[derive(Parser)]
#[command(name = "takeout-restore", version, about = "Restore dates and GPS from Google Takeout JSON sidecars into media files")]
struct Cli {
    /// Unpacked Google Takeout folder
    input: PathBuf,

    /// Output directory (mirrors the input layout)
    #[arg(short, long)]
    output: PathBuf,

    /// ExifTool executable
    #[arg(long, env = "EXIFTOOL_PATH", default_value = "exiftool")]
    exiftool: PathBuf,

    /// Worker threads (default: available CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Kill an ExifTool call that runs longer than this
    #[arg(long, value_name = "SECS")]
    tool_timeout: Option<u64>,

    /// What to do when processing finishes
    #[arg(long, value_enum, default_value_t = PostAction::Nothing)]
    after: PostAction,

    /// Show per-file PROCESS lines and debug diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "takeout_core=debug,takeout_restore=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print a log line above the bar. A hidden bar (stderr is not a terminal)
/// drops `println`, so write to `fallback` instead.
fn log_line(bar: &ProgressBar, line: &str, fallback: &mut impl Write) {
    if bar.is_hidden() {
        let _ = writeln!(fallback, "{line}");
    } else {
        bar.println(line);
    }
}

/// `p` + Enter toggles pause, `c` + Enter cancels.
fn spawn_keyboard(control: RunControl, bar: ProgressBar) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "p" | "pause" => {
                    let label = if control.toggle_pause() { "Paused" } else { "Resumed" };
                    log_line(&bar, &format!("{}: {label}", Severity::Action), &mut std::io::stderr());
                }
                "c" | "cancel" => {
                    control.cancel();
                    log_line(
                        &bar,
                        &format!("{}: Cancelling after in-flight files finish...", Severity::Action),
                        &mut std::io::stderr(),
                    );
                }
                _ => {}
            }
        }
    });
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    init_tracing(verbose);
    let t_total = std::time::Instant::now();

    let options = RunOptions {
        input: cli.input,
        output: cli.output,
        exiftool: cli.exiftool,
        threads: cli.threads,
        tool_timeout_secs: cli.tool_timeout,
        post_action: cli.after,
    };
    options.validate()?;

    let pipeline = Pipeline::new(options);
    let control = pipeline.control();

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {wide_msg}")
            .context("invalid progress template")?,
    );

    {
        let control = control.clone();
        let bar = bar.clone();
        ctrlc::set_handler(move || {
            if control.is_cancelled() {
                std::process::exit(130);
            }
            control.cancel();
            log_line(
                &bar,
                &format!(
                    "{}: Cancelling after in-flight files finish (Ctrl-C again to abort)",
                    Severity::Action
                ),
                &mut std::io::stderr(),
            );
        })?;
    }
    spawn_keyboard(control, bar.clone());

    let power = SystemPower::default();
    let (tx, rx) = mpsc::channel::<Event>();

    let result = std::thread::scope(|s| {
        let worker = s.spawn(|| {
            let sink = move |event: Event| {
                let _ = tx.send(event);
            };
            takeout_core::restore(&pipeline, &power, &sink)
        });

        for event in rx {
            match event {
                Event::Log { severity, message } => {
                    if severity != Severity::Process || verbose {
                        log_line(&bar, &format!("{severity}: {message}"), &mut std::io::stderr());
                    }
                }
                Event::Progress {
                    processed,
                    total,
                    file_name,
                } => {
                    bar.set_length(total);
                    bar.set_position(processed);
                    bar.set_message(file_name);
                }
                Event::Finished(_) => bar.finish_and_clear(),
            }
        }

        worker.join()
    });

    let summary = result
        .map_err(|_| anyhow::anyhow!("Processing thread panicked"))??;

    eprintln!(
        "{}: {} files, {} restored, {} without JSON, {} warnings, {} errors ({:.2}s)",
        match summary.status {
            RunStatus::Completed => "Done",
            RunStatus::Cancelled => "Cancelled",
            RunStatus::Failed => "Failed",
        },
        summary.total,
        summary.applied,
        summary.unmatched,
        summary.warnings,
        summary.errors,
        t_total.elapsed().as_secs_f64()
    );

    if summary.status == RunStatus::Cancelled {
        std::process::exit(130);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_still_logs() {
        let bar = ProgressBar::hidden();
        let mut out = Vec::new();
        log_line(&bar, "WARN: No matching JSON found for: holiday.mp4", &mut out);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "WARN: No matching JSON found for: holiday.mp4\n"
        );
    }
}
