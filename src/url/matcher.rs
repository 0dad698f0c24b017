/// Checks if a category name matches an exclusion pattern
///
/// Two kinds of patterns are supported:
/// 1. Plain text: matches when the name contains the pattern
/// 2. Wildcard: `*` matches any run of characters and the pattern is
///    anchored at both ends, so `"Archive*"` matches `"Archive 2019"` but not
///    `"Old Archive"`
///
/// Matching is case-insensitive.
///
/// # Examples
///
/// ```
/// use forum_harvest::url::matches_pattern;
///
/// assert!(matches_pattern("Канта", "Канта и шопинг"));
/// assert!(matches_pattern("archive*", "Archive 2019"));
/// assert!(!matches_pattern("archive*", "Old Archive"));
/// ```
pub fn matches_pattern(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let candidate = candidate.to_lowercase();

    if !pattern.contains('*') {
        return candidate.contains(&pattern);
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if !candidate.starts_with(first) {
        return false;
    }

    let mut rest = &candidate[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

/// Returns the first exclusion pattern matching the category name
pub fn find_exclusion<'a>(patterns: &'a [String], name: &str) -> Option<&'a str> {
    patterns
        .iter()
        .map(String::as_str)
        .find(|pattern| matches_pattern(pattern, name))
}
