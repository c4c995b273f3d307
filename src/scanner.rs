//! File system scanner that tolerates unreadable directories.
//!
//! Permission errors, broken links and directories that disappear while the
//! walk is running only remove the affected subtree from the results; the
//! rest of the tree is still enumerated.
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Enumerate the files below `root` whose file name matches `pattern`.
///
/// `pattern` supports `*` (any run of characters) and `?` (one character),
/// compared case-insensitively against the file name only. With
/// `recursive == false` only the direct children of `root` are returned.
///
/// The returned iterator is lazy; calling this function again restarts the
/// walk from scratch.
pub fn enumerate_files<'a>(
    root: &Path,
    pattern: &'a str,
    recursive: bool,
) -> impl Iterator<Item = PathBuf> + 'a {
    let mut walker = WalkDir::new(root).follow_links(false).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping inaccessible path: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(move |entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| matches_pattern(name, pattern))
        })
        .map(|entry| entry.into_path())
}

/// Wildcard match of a file name against a `*`/`?` pattern.
fn matches_pattern(name: &str, pattern: &str) -> bool {
    let name: Vec<char> = name.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    // Classic two-pointer wildcard matching with backtracking to the last `*`.
    let (mut n, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            n += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
