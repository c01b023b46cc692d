//! Path normalization shared by scope extraction and the matcher.

/// Trim, collapse repeated `/` separators, and resolve `.`/`..`
/// segments. Does not touch the filesystem — this is purely a string
/// transform over the declared scope, not a canonicalization.
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let leading_slash = trimmed.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if out.last().map(|s| *s != "..").unwrap_or(false) {
                    out.pop();
                } else if !leading_slash {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }

    let joined = out.join("/");
    if leading_slash {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Split a comma-separated context value into trimmed, non-empty parts.
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
