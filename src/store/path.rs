//! Helpers for scheme-prefixed paths

/// Separator between scheme and key, as in `gs://bucket/key`
pub const SCHEME_SEPARATOR: &str = "://";

/// Split `path` into its scheme (including `://`, empty if absent) and rest
pub fn split_scheme(path: &str) -> (&str, &str) {
    match path.find(SCHEME_SEPARATOR) {
        Some(idx) => path.split_at(idx + SCHEME_SEPARATOR.len()),
        None => ("", path),
    }
}

/// Drop trailing separators, keeping a lone `/` and bare scheme roots
pub fn trim_trailing_slash(path: &str) -> &str {
    let (scheme, rest) = split_scheme(path);
    let trimmed = rest.trim_end_matches('/');
    if trimmed.is_empty() && rest.starts_with('/') {
        return &path[..scheme.len() + 1];
    }
    &path[..scheme.len() + trimmed.len()]
}

/// Append `name` to directory `dir`
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Parent of a scheme-less key, `""` for top-level keys
pub fn parent_key(key: &str) -> &str {
    key.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Every ancestor of a scheme-less key, outermost first, excluding the key
pub fn ancestor_keys(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/').map(move |(idx, _)| &key[..idx])
}

/// Whether `key` lies strictly below `ancestor`
pub fn is_descendant(key: &str, ancestor: &str) -> bool {
    match key.strip_prefix(ancestor) {
        Some(rest) => (ancestor.is_empty() && !rest.is_empty()) || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_scheme() {
        assert_eq!(split_scheme("gs://bucket/a"), ("gs://", "bucket/a"));
        assert_eq!(split_scheme("/tmp/a"), ("", "/tmp/a"));
        assert_eq!(split_scheme("file:///tmp/a"), ("file://", "/tmp/a"));
    }

    #[test]
    fn test_trim_trailing_slash() {
        assert_eq!(trim_trailing_slash("gs://bucket/dir/"), "gs://bucket/dir");
        assert_eq!(trim_trailing_slash("gs://"), "gs://");
        assert_eq!(trim_trailing_slash("/"), "/");
        assert_eq!(trim_trailing_slash("/tmp//"), "/tmp");
        assert_eq!(trim_trailing_slash("file:///"), "file:///");
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join("gs://", "bucket"), "gs://bucket");
        assert_eq!(join("gs://bucket", "a"), "gs://bucket/a");
        assert_eq!(join("/", "tmp"), "/tmp");
        assert_eq!(parent_key("bucket/a/b"), "bucket/a");
        assert_eq!(parent_key("bucket"), "");
    }

    #[test]
    fn test_ancestor_keys() {
        let ancestors: Vec<&str> = ancestor_keys("bucket/a/b.csv").collect();
        assert_eq!(ancestors, ["bucket", "bucket/a"]);
    }

    #[test]
    fn test_is_descendant() {
        assert!(is_descendant("a/b", "a"));
        assert!(is_descendant("a/b/c", "a/b"));
        assert!(!is_descendant("ab", "a"));
        assert!(!is_descendant("a", "a"));
        assert!(is_descendant("a", ""));
    }
}
