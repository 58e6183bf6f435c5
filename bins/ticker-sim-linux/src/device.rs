//! Restart by re-executing the simulator in place.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use ticker_core::Device;
use tracing::{error, info};

/// Replaces the running process with a fresh copy of itself.
pub struct ProcessDevice {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessDevice {
    /// Capture the current executable and arguments.
    pub fn current() -> anyhow::Result<Self> {
        let program = std::env::current_exe().context("Failed to locate current executable")?;
        Ok(Self {
            program,
            args: std::env::args_os().skip(1).collect(),
        })
    }
}

impl Device for ProcessDevice {
    #[cfg(unix)]
    fn restart(&self) {
        use std::os::unix::process::CommandExt;

        info!("Restarting {}", self.program.display());
        let err = Command::new(&self.program).args(&self.args).exec();
        error!("Restart failed: {}", err);
        std::process::exit(1);
    }

    #[cfg(not(unix))]
    fn restart(&self) {
        info!("Restarting {}", self.program.display());
        match Command::new(&self.program).args(&self.args).spawn() {
            Ok(_) => std::process::exit(0),
            Err(e) => {
                error!("Restart failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
