//! Local filesystem output: atomic writes and file-name hygiene.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("static regex"));

/// Writes `bytes` to `path` so that readers only ever see the complete file.
///
/// Parent directories are created as needed. The content goes to a temporary file in the
/// destination directory first and is renamed over `path` once fully written; on failure
/// the temporary file is removed and any previous file at `path` is untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Makes a single path segment safe to join under an output directory.
///
/// Separators and characters Windows refuses are replaced with `_`; segments that would
/// navigate (`.`, `..`) or end up empty become `_`.
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned = INVALID_CHARS.replace_all(raw.trim(), "_").to_string();
    let cleaned = cleaned.trim_end_matches(['.', ' ']).to_string();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_creates_parents_and_replaces() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a/b/c.txt");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");

        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1, "no temporary files may remain");
    }

    #[test]
    fn sanitize_segment_neutralises_traversal_and_separators() {
        assert_eq!(sanitize_segment(".."), "_");
        assert_eq!(sanitize_segment("a/b"), "a_b");
        assert_eq!(sanitize_segment("Q1: Plan?"), "Q1_ Plan_");
        assert_eq!(sanitize_segment("report.pdf"), "report.pdf");
        assert_eq!(sanitize_segment("trailing."), "trailing");
        assert_eq!(sanitize_segment("   "), "_");
    }
}
