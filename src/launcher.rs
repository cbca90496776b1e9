use crate::errors::LaunchError;
use log::debug;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Starts work that outlives the caller.
pub trait Launcher {
    /// Start the task and return its PID without waiting for it.
    fn launch(&self) -> Result<u32, LaunchError>;
}

/// Runs a command as a detached process in its own process group, with all
/// standard streams closed.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-run the current binary with `args`.
    pub fn current_exe(args: Vec<String>) -> Result<Self, LaunchError> {
        let exe = std::env::current_exe().map_err(LaunchError::CurrentExe)?;
        Ok(Self::new(exe, args))
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self) -> Result<u32, LaunchError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // The child is never waited on; it belongs to nobody once we exit.
        let pid = child.id();
        debug!("Launched {:?} {:?} as pid {}", self.program, self.args, pid);
        Ok(pid)
    }
}
