use crate::errors::RecordError;
use crate::matcher::Rankable;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "fav")]
    Favorite,
    #[serde(rename = "rfolder")]
    RecentFolder,
    #[serde(rename = "rfile")]
    RecentFile,
}

impl EntryKind {
    /// The tag the data source uses for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            EntryKind::Favorite => "fav",
            EntryKind::RecentFolder => "rfolder",
            EntryKind::RecentFile => "rfile",
        }
    }
}

impl FromStr for EntryKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fav" => Ok(EntryKind::Favorite),
            "rfolder" => Ok(EntryKind::RecentFolder),
            "rfile" => Ok(EntryKind::RecentFile),
            other => Err(RecordError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One path known to the data source.
///
/// `name` and `display_path` are derived from `path` when the entry is built and
/// never change afterwards. Two entries are equal when kind and path are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    kind: EntryKind,
    path: String,         // Absolute, no trailing separator
    name: String,         // Final path component
    display_path: String, // `path` with $HOME shown as ~
}

impl Entry {
    pub fn new(kind: EntryKind, raw_path: &str, home: Option<&Path>) -> Self {
        let path = normalize(raw_path);
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let display_path = abbreviate_home(&path, home);

        Self {
            kind,
            path,
            name,
            display_path,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_path(&self) -> &str {
        &self.display_path
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.path == other.path
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.path.hash(state);
    }
}

impl Rankable for Entry {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> &str {
        &self.path
    }
}

/// Strip trailing separators, keeping the root itself intact.
fn normalize(raw_path: &str) -> String {
    let trimmed = raw_path.trim_end_matches('/');
    if trimmed.is_empty() && raw_path.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Replace a leading `home` with `~`. Only whole leading components match, so
/// `/Users/alice2` is left alone when home is `/Users/alice`.
fn abbreviate_home(path: &str, home: Option<&Path>) -> String {
    let Some(home) = home.filter(|h| h.parent().is_some()) else {
        return path.to_string();
    };

    match Path::new(path).strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.to_string(),
    }
}

/// Parse one `kind<TAB>path` line.
pub fn parse_line(line: &str, home: Option<&Path>) -> Result<Entry, RecordError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [tag, raw_path] = fields.as_slice() else {
        return Err(RecordError::FieldCount {
            found: fields.len(),
        });
    };

    let kind: EntryKind = tag.parse()?;
    if !raw_path.starts_with('/') {
        return Err(RecordError::RelativePath(raw_path.to_string()));
    }

    Ok(Entry::new(kind, raw_path, home))
}

/// Parse the whole output of the data source. Bad lines are logged and skipped.
pub fn parse_output(output: &str, home: Option<&Path>) -> Vec<Entry> {
    let mut entries = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_line(line, home) {
            Ok(entry) => {
                debug!("entry: {:?}", entry);
                entries.push(entry);
            }
            Err(e) => warn!("Invalid output from data source ({}): {:?}", e, line),
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const HOME: &str = "/Users/alice";

    fn home() -> Option<&'static Path> {
        Some(Path::new(HOME))
    }

    #[test]
    fn test_trailing_separator_is_stripped() {
        let entry = Entry::new(EntryKind::Favorite, "/Users/alice/Documents/", home());
        assert_eq!(entry.path(), "/Users/alice/Documents");
        assert_eq!(entry.name(), "Documents");
        assert_eq!(entry.display_path(), "~/Documents");
    }

    #[test]
    fn test_home_only_replaced_as_prefix() {
        let entry = Entry::new(EntryKind::RecentFile, "/Volumes/Users/alice/notes.txt", home());
        assert_eq!(entry.display_path(), "/Volumes/Users/alice/notes.txt");

        let sibling = Entry::new(EntryKind::RecentFolder, "/Users/alice2/Projects", home());
        assert_eq!(sibling.display_path(), "/Users/alice2/Projects");
    }

    #[test]
    fn test_home_itself_becomes_tilde() {
        let entry = Entry::new(EntryKind::Favorite, "/Users/alice/", home());
        assert_eq!(entry.display_path(), "~");
        assert_eq!(entry.name(), "alice");
    }

    #[test]
    fn test_root_path_keeps_a_name() {
        let entry = Entry::new(EntryKind::Favorite, "/", home());
        assert_eq!(entry.path(), "/");
        assert_eq!(entry.name(), "/");
    }

    #[test]
    fn test_without_home_display_path_is_path() {
        let entry = Entry::new(EntryKind::Favorite, "/Users/alice/Desktop", None);
        assert_eq!(entry.display_path(), "/Users/alice/Desktop");
    }

    #[test]
    fn test_equality_is_kind_and_path() {
        let a = Entry::new(EntryKind::Favorite, "/Users/alice/Desktop/", home());
        let b = Entry::new(EntryKind::Favorite, "/Users/alice/Desktop", None);
        let c = Entry::new(EntryKind::RecentFolder, "/Users/alice/Desktop", home());

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Entry> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_parse_line_errors() {
        assert_eq!(
            parse_line("fav", home()),
            Err(RecordError::FieldCount { found: 1 })
        );
        assert_eq!(
            parse_line("fav\t/a\t/b", home()),
            Err(RecordError::FieldCount { found: 3 })
        );
        assert_eq!(
            parse_line("recent\t/a", home()),
            Err(RecordError::UnknownKind("recent".to_string()))
        );
        assert_eq!(
            parse_line("rfile\tnotes.txt", home()),
            Err(RecordError::RelativePath("notes.txt".to_string()))
        );
    }

    #[test]
    fn test_parse_output_skips_bad_lines() {
        let output = "fav\t/Users/alice/Desktop/\n\
                      \n\
                      garbage line\n\
                      rfolder\t/tmp\n\
                      rfile\t/Users/alice/todo.txt\n";
        let entries = parse_output(output, home());

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind(), EntryKind::Favorite);
        assert_eq!(entries[0].display_path(), "~/Desktop");
        assert_eq!(entries[1].kind(), EntryKind::RecentFolder);
        assert_eq!(entries[1].name(), "tmp");
        assert_eq!(entries[2].kind(), EntryKind::RecentFile);
        assert_eq!(entries[2].name(), "todo.txt");
    }

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in [EntryKind::Favorite, EntryKind::RecentFolder, EntryKind::RecentFile] {
            assert_eq!(kind.tag().parse::<EntryKind>(), Ok(kind));
        }
    }
}
