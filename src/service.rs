use crate::cache::{CacheStore, Snapshot};
use crate::launcher::Launcher;
use crate::matcher::FuzzyMatcher;
use crate::model::{Entry, EntryKind};
use crate::refresh::{self, RefreshCoordinator, Trigger};
use crate::registry::TaskRegistry;
use crate::sources::Source;
use log::{info, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// How a stale snapshot is brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshMode {
    /// Serve the stale snapshot and refresh in a detached process.
    #[default]
    Background,
    /// Refresh in the calling process before answering.
    Inline,
}

/// Which fields make two entries duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupKey {
    #[default]
    KindAndPath,
    Path,
}

/// Entry kinds a query is restricted to. `None` means all kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter(Option<Vec<EntryKind>>);

impl TypeFilter {
    pub fn all() -> Self {
        Self(None)
    }

    pub fn only(kinds: Vec<EntryKind>) -> Self {
        Self(Some(kinds))
    }

    pub fn matches(&self, kind: EntryKind) -> bool {
        self.0.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// No snapshot has ever been committed; a refresh has been requested.
    NotReady,
    /// Matching entries, best first. May be empty.
    Entries(Vec<Entry>),
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub mode: RefreshMode,
    pub dedup: DedupKey,
    /// Drop entries whose path no longer exists.
    pub check_exists: bool,
    /// Hide entries whose path matches any of these.
    pub exclude: Vec<Regex>,
}

/// What the picker talks to. Answers from the cache and never waits on the
/// data source in `Background` mode.
pub struct QueryService<R, L> {
    store: CacheStore,
    coordinator: RefreshCoordinator<R, L>,
    source: Box<dyn Source>,
    matcher: FuzzyMatcher,
    options: QueryOptions,
}

impl<R: TaskRegistry, L: Launcher> QueryService<R, L> {
    pub fn new(
        store: CacheStore,
        coordinator: RefreshCoordinator<R, L>,
        source: Box<dyn Source>,
        matcher: FuzzyMatcher,
        options: QueryOptions,
    ) -> Self {
        Self {
            store,
            coordinator,
            source,
            matcher,
            options,
        }
    }

    pub fn query(&mut self, raw_query: &str, filter: &TypeFilter) -> QueryResult {
        let Some(snapshot) = self.current_snapshot() else {
            return QueryResult::NotReady;
        };

        let total = snapshot.entries.len();
        let entries = self.narrow(snapshot.entries, filter);
        let entries = self.matcher.filter(raw_query, entries);

        info!(
            "query={:?} filter={:?} total={} results={}",
            raw_query,
            filter,
            total,
            entries.len()
        );
        QueryResult::Entries(entries)
    }

    /// Read the cache and kick off a refresh if it is stale.
    fn current_snapshot(&self) -> Option<Snapshot> {
        let snapshot = self.store.read();

        match self.options.mode {
            RefreshMode::Background => {
                match self.coordinator.trigger_if_needed(snapshot.as_ref()) {
                    Ok(Trigger::Fresh) => {}
                    Ok(trigger) => info!("Snapshot stale or missing: {:?}", trigger),
                    Err(e) => warn!("Could not start background refresh: {}", e),
                }
                snapshot
            }
            RefreshMode::Inline => {
                if !self.coordinator.needs_refresh(snapshot.as_ref()) {
                    return snapshot;
                }
                match refresh::run_refresh(self.source.as_ref(), &self.store) {
                    Ok(fresh) => Some(fresh),
                    Err(e) => {
                        warn!("Inline refresh failed, serving previous data: {}", e);
                        snapshot
                    }
                }
            }
        }
    }

    /// Type filter, liveness check, exclusions and de-duplication, in that order.
    fn narrow(&self, entries: Vec<Entry>, filter: &TypeFilter) -> Vec<Entry> {
        let mut seen = HashSet::new();

        entries
            .into_iter()
            .filter(|e| filter.matches(e.kind()))
            .filter(|e| !self.options.check_exists || Path::new(e.path()).exists())
            .filter(|e| !self.options.exclude.iter().any(|re| re.is_match(e.path())))
            .filter(|e| {
                let key = match self.options.dedup {
                    DedupKey::KindAndPath => (Some(e.kind()), e.path().to_string()),
                    DedupKey::Path => (None, e.path().to_string()),
                };
                seen.insert(key)
            })
            .collect()
    }
}
