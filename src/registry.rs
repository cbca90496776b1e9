use crate::errors::RegistryError;
use log::{debug, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// How many times `claim` clears a dead record and tries again.
const CLAIM_ATTEMPTS: usize = 3;

/// Result of trying to claim a task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The slot is ours. It is recorded under the claiming process's PID until
    /// `assign` hands it to the real task.
    Acquired,
    /// A live process already holds the slot.
    Busy(u32),
}

/// Records which named background tasks are running, across processes.
pub trait TaskRegistry {
    /// Atomically claim `task` unless a live process already holds it.
    ///
    /// A record that keeps naming dead processes after repeated cleanup is
    /// reported as `RegistryError::Contended`, never as a busy slot.
    fn claim(&self, task: &str) -> Result<Claim, RegistryError>;

    /// Record `pid` as the process running `task`.
    fn assign(&self, task: &str, pid: u32) -> Result<(), RegistryError>;

    /// Drop the record for `task`, but only if it still names `pid`.
    fn release(&self, task: &str, pid: u32) -> Result<(), RegistryError>;

    /// PID of the live process running `task`, if any.
    fn running(&self, task: &str) -> Option<u32>;
}

/// One `<task>.pid` file per task. A record only counts while its process is
/// alive, so a crashed task never blocks the next one.
#[derive(Debug, Clone)]
pub struct PidFileRegistry {
    dir: PathBuf,
}

impl PidFileRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn pid_file(&self, task: &str) -> PathBuf {
        self.dir.join(format!("{}.pid", task))
    }

    fn io_err(path: &Path, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn temp_with_pid(&self, path: &Path, pid: u32) -> Result<NamedTempFile, RegistryError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_err(path, e))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| Self::io_err(path, e))?;
        writeln!(tmp, "{}", pid).map_err(|e| Self::io_err(path, e))?;
        tmp.flush().map_err(|e| Self::io_err(path, e))?;
        Ok(tmp)
    }

    /// Remove a record naming a dead process. Re-reads first so a fresh claim
    /// made in the meantime is left alone.
    fn remove_stale(&self, path: &Path, stale: Option<u32>) -> Result<(), RegistryError> {
        if read_pid_file(path) != stale {
            return Ok(());
        }
        warn!("Removing stale task record {:?} (pid {:?})", path, stale);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(path, e)),
        }
    }
}

impl TaskRegistry for PidFileRegistry {
    fn claim(&self, task: &str) -> Result<Claim, RegistryError> {
        let path = self.pid_file(task);
        let me = std::process::id();

        for attempt in 1..=CLAIM_ATTEMPTS {
            let tmp = self.temp_with_pid(&path, me)?;
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    debug!("Claimed task '{}' as pid {}", task, me);
                    return Ok(Claim::Acquired);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    let holder = read_pid_file(&path);
                    match holder {
                        Some(pid) if is_process_alive(pid) => return Ok(Claim::Busy(pid)),
                        _ if attempt < CLAIM_ATTEMPTS => self.remove_stale(&path, holder)?,
                        _ => {}
                    }
                }
                Err(e) => return Err(Self::io_err(&path, e.error)),
            }
        }

        warn!(
            "Giving up on task '{}' after {} attempts: {:?} keeps naming dead processes",
            task, CLAIM_ATTEMPTS, path
        );
        Err(RegistryError::Contended {
            task: task.to_string(),
        })
    }

    fn assign(&self, task: &str, pid: u32) -> Result<(), RegistryError> {
        let path = self.pid_file(task);
        let tmp = self.temp_with_pid(&path, pid)?;
        tmp.persist(&path).map_err(|e| Self::io_err(&path, e.error))?;
        debug!("Task '{}' running as pid {}", task, pid);
        Ok(())
    }

    fn release(&self, task: &str, pid: u32) -> Result<(), RegistryError> {
        let path = self.pid_file(task);
        if read_pid_file(&path) != Some(pid) {
            return Ok(());
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Released task '{}' (pid {})", task, pid);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }

    fn running(&self, task: &str) -> Option<u32> {
        read_pid_file(&self.pid_file(task)).filter(|&pid| is_process_alive(pid))
    }
}

/// Read the PID stored in `path`. Missing or garbled files read as `None`.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    let content = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read pid file {:?}: {}", path, e);
            return None;
        }
    };
    match content.trim().parse::<u32>() {
        Ok(pid) => Some(pid),
        Err(_) => {
            warn!("Invalid pid file {:?}: {:?}", path, content.trim());
            None
        }
    }
}

/// `kill(pid, 0)`: checks for existence without sending a signal.
pub fn is_process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Exists, owned by someone else.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
