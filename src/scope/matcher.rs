//! Glob classification and matching for scope overlap detection.

use glob::Pattern;

/// An entry is a glob if it contains `...` or `*`; otherwise it names
/// an explicit file.
pub fn is_glob(entry: &str) -> bool {
    entry.contains("...") || entry.contains('*')
}

/// Strip a trailing `/...` or `...` suffix, returning the base used for
/// prefix-overlap comparison between two globs.
pub fn strip_ellipsis_suffix(pattern: &str) -> &str {
    if let Some(base) = pattern.strip_suffix("/...") {
        base
    } else if let Some(base) = pattern.strip_suffix("...") {
        base
    } else {
        pattern
    }
}

/// Does `pattern` match `file`?
///
/// - `pattern/...` matches `file` iff `file == pattern` or `file`
///   starts with `pattern/`.
/// - `pattern...` (no slash before the ellipsis) matches any file
///   starting with `pattern`.
/// - Otherwise, classic shell-glob matching (`*`, `?`); if that fails,
///   retried against the file's parent directory.
pub fn glob_matches(pattern: &str, file: &str) -> bool {
    if let Some(base) = pattern.strip_suffix("/...") {
        return file == base || file.starts_with(&format!("{base}/"));
    }
    if let Some(base) = pattern.strip_suffix("...") {
        return file.starts_with(base);
    }

    if let Ok(glob_pattern) = Pattern::new(pattern) {
        if glob_pattern.matches(file) {
            return true;
        }
        if let Some(parent) = parent_dir(file) {
            if glob_pattern.matches(parent) {
                return true;
            }
        }
    }
    false
}

/// Two globs "prefix-overlap" if, after stripping their ellipsis
/// suffixes, one base is a string-prefix of the other.
pub fn globs_prefix_overlap(a: &str, b: &str) -> bool {
    let base_a = strip_ellipsis_suffix(a);
    let base_b = strip_ellipsis_suffix(b);
    base_a.starts_with(base_b) || base_b.starts_with(base_a)
}

fn parent_dir(file: &str) -> Option<&str> {
    file.rsplit_once('/').map(|(parent, _)| parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_glob_entries() {
        assert!(is_glob("pkg/..."));
        assert!(is_glob("*.go"));
        assert!(!is_glob("pkg/main.go"));
    }

    #[test]
    fn slash_ellipsis_matches_directory_and_self() {
        assert!(glob_matches("pkg/...", "pkg"));
        assert!(glob_matches("pkg/...", "pkg/auth/login.go"));
        assert!(!glob_matches("pkg/...", "pkgx/login.go"));
    }

    #[test]
    fn bare_ellipsis_matches_prefix() {
        assert!(glob_matches("pkg...", "pkgfoo/login.go"));
        assert!(glob_matches("pkg...", "pkg"));
    }

    #[test]
    fn classic_glob_falls_back_to_parent() {
        assert!(glob_matches("*.go", "main.go"));
        assert!(glob_matches("src/*.go", "src/main.go"));
        assert!(!glob_matches("src/*.go", "src/sub/main.go"));
    }

    #[test]
    fn prefix_overlap_between_globs() {
        assert!(globs_prefix_overlap("pkg/...", "pkg/auth/..."));
        assert!(!globs_prefix_overlap("pkg/...", "other/..."));
    }
}
