//! Default Folder X bridge.
//!
//! Default Folder X only exposes its favourites and recent items over
//! AppleScript, so every fetch goes through `osascript`. That is slow (it has
//! to talk to a GUI app) which is why results are cached.

pub const OSASCRIPT: &str = "/usr/bin/osascript";

/// Prints favourite folders, recent folders and recent files as
/// `fav|rfolder|rfile <TAB> POSIX path` lines.
pub const FOLDERS_SCRIPT: &str = r#"
on dxFolders()
    set thePaths to {}
    tell application "Default Folder X"
        repeat with thePath in GetFavoriteFolders
            set the end of thePaths to {"fav", POSIX path of thePath}
        end repeat
        repeat with thePath in GetRecentFolders
            set the end of thePaths to {"rfolder", POSIX path of thePath}
        end repeat
        repeat with thePath in GetRecentFiles
            set the end of thePaths to {"rfile", POSIX path of thePath}
        end repeat
    end tell
    return thePaths
end dxFolders

on run (argv)
    set output to ""
    repeat with theItem in my dxFolders()
        if output is not "" then
            set output to output & linefeed
        end if
        set output to output & (item 1 of theItem) & tab & (item 2 of theItem)
    end repeat
    return output
end run
"#;

/// `osascript` arguments that run [`FOLDERS_SCRIPT`].
pub fn default_args() -> Vec<String> {
    vec![
        "-l".to_string(),
        "AppleScript".to_string(),
        "-e".to_string(),
        FOLDERS_SCRIPT.to_string(),
    ]
}
