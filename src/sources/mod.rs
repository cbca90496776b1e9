use crate::errors::SourceError;
use crate::model::Entry;

/// The slow, external provider of entries.
pub trait Source {
    fn fetch(&self) -> Result<Vec<Entry>, SourceError>;
}

pub mod command;
pub mod dfx;
