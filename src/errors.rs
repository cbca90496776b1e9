use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A single line of source output that could not be turned into an entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected 2 tab-separated fields, found {found}")]
    FieldCount { found: usize },

    #[error("unknown entry type '{0}'")]
    UnknownKind(String),

    #[error("path '{0}' is not absolute")]
    RelativePath(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with {status}")]
    Status { program: String, status: String },

    #[error("'{program}' did not finish within {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u128 },

    #[error("output of '{program}' is not valid UTF-8")]
    Encoding { program: String },

    #[error("I/O error while talking to the data source: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task registry I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not claim task '{task}': its record kept naming dead processes")]
    Contended { task: String },
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("cannot determine current executable: {0}")]
    CurrentExe(#[source] io::Error),

    #[error("failed to spawn background task '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}
