//! # Exec Handoff
//!
//! Replaces the launcher with the planned process. On Unix this is a real
//! `exec`; elsewhere the child is spawned and its exit code is propagated.

use crate::error::Error;
use crate::plan::LaunchPlan;

/// Hand off to the planned process
///
/// Only returns if the handoff failed.
pub fn handoff(plan: &LaunchPlan) -> Error {
    tracing::info!(mode = %plan.mode, program = %plan.program, "Handing off");
    let mut cmd = plan.command();
    imp::exec(&mut cmd, &plan.program)
}

#[cfg(unix)]
mod imp {
    use super::Error;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    pub fn exec(cmd: &mut Command, program: &str) -> Error {
        Error::Exec {
            program: program.to_string(),
            source: cmd.exec(),
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::Error;
    use std::process::Command;

    pub fn exec(cmd: &mut Command, program: &str) -> Error {
        match cmd.status() {
            Ok(status) => std::process::exit(status.code().unwrap_or(1)),
            Err(source) => Error::Exec {
                program: program.to_string(),
                source,
            },
        }
    }
}
