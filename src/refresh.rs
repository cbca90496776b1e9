use crate::cache::{CacheStore, Snapshot};
use crate::errors::RefreshError;
use crate::launcher::Launcher;
use crate::registry::{Claim, TaskRegistry};
use crate::sources::Source;
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

/// Registry name of the background refresh.
pub const REFRESH_TASK: &str = "refresh";

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10);

/// What a trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The snapshot is fresh enough.
    Fresh,
    /// A new refresh was started with this PID.
    Launched(u32),
    /// A refresh is already running with this PID.
    Suppressed(u32),
}

/// Decides when the cache is stale and makes sure at most one background
/// refresh runs at a time.
pub struct RefreshCoordinator<R, L> {
    registry: R,
    launcher: L,
    max_age: Duration,
}

impl<R: TaskRegistry, L: Launcher> RefreshCoordinator<R, L> {
    pub fn new(registry: R, launcher: L, max_age: Duration) -> Self {
        Self {
            registry,
            launcher,
            max_age,
        }
    }

    pub fn needs_refresh(&self, snapshot: Option<&Snapshot>) -> bool {
        snapshot.is_none_or(|s| s.age() > self.max_age)
    }

    /// Launch a detached refresh if the snapshot is stale and none is running.
    /// Never waits for the refresh itself.
    pub fn trigger_if_needed(&self, snapshot: Option<&Snapshot>) -> Result<Trigger, RefreshError> {
        if !self.needs_refresh(snapshot) {
            return Ok(Trigger::Fresh);
        }

        match self.registry.claim(REFRESH_TASK)? {
            Claim::Busy(pid) => {
                debug!("Refresh already running (pid {}), not starting another", pid);
                Ok(Trigger::Suppressed(pid))
            }
            Claim::Acquired => match self.launcher.launch() {
                Ok(pid) => {
                    self.registry.assign(REFRESH_TASK, pid)?;
                    info!("Started background refresh (pid {})", pid);
                    Ok(Trigger::Launched(pid))
                }
                Err(e) => {
                    if let Err(release_err) =
                        self.registry.release(REFRESH_TASK, std::process::id())
                    {
                        warn!("Failed to release refresh claim: {}", release_err);
                    }
                    Err(e.into())
                }
            },
        }
    }
}

/// Fetch from `source` and commit the result to `store`.
///
/// Blocks for as long as the source takes. On failure nothing is written and
/// the previous snapshot stays in place.
pub fn run_refresh(source: &dyn Source, store: &CacheStore) -> Result<Snapshot, RefreshError> {
    let start = Instant::now();
    info!("Updating entries...");

    let entries = match source.fetch() {
        Ok(entries) => entries,
        Err(e) => {
            error!("Refresh failed after {:.3}s: {}", start.elapsed().as_secs_f64(), e);
            return Err(e.into());
        }
    };

    let snapshot = store.write(entries)?;
    info!(
        "Committed {} entries in {:.3} seconds",
        snapshot.entries.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(snapshot)
}
