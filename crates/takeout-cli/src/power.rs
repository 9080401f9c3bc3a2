use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use takeout_core::PowerControl;

/// Power control backed by the platform's own tools.
#[derive(Default)]
pub struct SystemPower {
    inhibitor: Mutex<Option<Child>>,
}

impl SystemPower {
    fn inhibit_command() -> io::Result<Command> {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("caffeinate");
            cmd.arg("-i").arg("-w").arg(std::process::id().to_string());
            Ok(cmd)
        } else if cfg!(target_os = "linux") {
            let mut cmd = Command::new("systemd-inhibit");
            cmd.args([
                "--what=idle:sleep",
                "--who=takeout-restore",
                "--why=Restoring Takeout metadata",
                "sleep",
                "infinity",
            ]);
            Ok(cmd)
        } else {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "keep-awake is not supported on this platform",
            ))
        }
    }

    fn shutdown_command(after: Duration) -> io::Result<Command> {
        if cfg!(windows) {
            let mut cmd = Command::new("shutdown");
            cmd.arg("-s").arg("-t").arg(after.as_secs().to_string());
            Ok(cmd)
        } else if cfg!(unix) {
            // shutdown(8) takes whole minutes
            let minutes = after.as_secs().div_ceil(60).max(1);
            let mut cmd = Command::new("shutdown");
            cmd.arg("-h").arg(format!("+{minutes}"));
            Ok(cmd)
        } else {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "shutdown is not supported on this platform",
            ))
        }
    }
}

impl PowerControl for SystemPower {
    fn keep_awake(&self) -> io::Result<()> {
        let mut inhibitor = self.inhibitor.lock().unwrap_or_else(|e| e.into_inner());
        if inhibitor.is_some() {
            return Ok(());
        }
        let child = Self::inhibit_command()?
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        tracing::debug!(pid = child.id(), "sleep inhibitor started");
        *inhibitor = Some(child);
        Ok(())
    }

    fn release(&self) {
        let mut inhibitor = self.inhibitor.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut child) = inhibitor.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn schedule_shutdown(&self, after: Duration) -> io::Result<()> {
        Self::shutdown_command(after)?.spawn()?;
        Ok(())
    }
}

impl Drop for SystemPower {
    fn drop(&mut self) {
        self.release();
    }
}
