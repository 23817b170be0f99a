// ABOUTME: Route fragment normalization used when joining controller base paths and sub-paths.
// ABOUTME: Guarantees that concatenating two normalized fragments never produces a doubled slash.

/// Canonicalize a route fragment.
///
/// `""` and `"/"` become `""` (no suffix), anything else gets a leading `/`
/// if it lacks one. Idempotent.
pub fn normalize(path: &str) -> String {
    match path {
        "" | "/" => String::new(),
        p if p.starts_with('/') => p.to_string(),
        p => format!("/{}", p),
    }
}

/// Join a base path and a sub-path, normalizing both fragments.
pub fn join(base: &str, sub: &str) -> String {
    let mut full = normalize(base);
    full.push_str(&normalize(sub));
    full
}
