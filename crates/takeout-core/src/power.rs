use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do with the machine once a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PostAction {
    #[default]
    Nothing,
    /// Keep the system awake while the run is in progress
    KeepAwake,
    /// Shut down after a run that completed
    Shutdown,
}

/// OS power-state commands, implemented outside the core.
pub trait PowerControl: Send + Sync {
    /// Keep the system from sleeping until [`PowerControl::release`].
    fn keep_awake(&self) -> io::Result<()>;

    fn release(&self);

    fn schedule_shutdown(&self, after: Duration) -> io::Result<()>;
}

/// Power control that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPower;

impl PowerControl for NoopPower {
    fn keep_awake(&self) -> io::Result<()> {
        Ok(())
    }

    fn release(&self) {}

    fn schedule_shutdown(&self, _after: Duration) -> io::Result<()> {
        Ok(())
    }
}
