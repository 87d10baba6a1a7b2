use std::fmt;
use std::path::Path;

use similar::{ChangeTag, TextDiff};

/// Line counts of one or more rendered changes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.files_changed == 0
    }
}

impl fmt::Display for DiffStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s) changed, {} insertion(s)(+), {} deletion(s)(-)",
            self.files_changed, self.lines_added, self.lines_removed
        )
    }
}

/// Unified diff of a class file before and after editing, with its stats.
///
/// A file that did not exist before is diffed against the empty string, so
/// the whole new file shows up as additions.
pub fn generate_unified_diff(
    path: &Path,
    original: &str,
    modified: &str,
    context_lines: usize,
) -> (String, DiffStats) {
    let diff = TextDiff::from_lines(original, modified);
    let mut stats = DiffStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.lines_added += 1,
            ChangeTag::Delete => stats.lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }
    if stats.lines_added > 0 || stats.lines_removed > 0 {
        stats.files_changed = 1;
    }

    let path_str = path.display().to_string();
    let old_header = if original.is_empty() {
        "/dev/null".to_string()
    } else {
        path_str.clone()
    };
    let mut output = format!("--- {}\n+++ {}\n", old_header, path_str);
    output.push_str(
        &diff
            .unified_diff()
            .context_radius(context_lines)
            .to_string(),
    );
    (output, stats)
}

/// blake3 digest of file content, hex encoded.
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Short form of [`content_hash`] for summaries (7 characters, like git).
pub fn short_hash(content: &str) -> String {
    content_hash(content)[..7].to_string()
}
