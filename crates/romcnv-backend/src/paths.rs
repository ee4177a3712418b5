//! Virtual sandbox path helpers.
//!
//! Sandbox paths are absolute, `/`-separated and may not contain `..`.

use crate::error::{BackendError, BackendResult};

/// Normalise a sandbox path to `/a/b` form.
pub fn normalize(path: &str) -> BackendResult<String> {
    Ok(format!("/{}", components(path)?.join("/")))
}

/// Split a sandbox path into its components.
pub fn components(path: &str) -> BackendResult<Vec<&str>> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(BackendError::InvalidPath {
                    path: path.to_string(),
                });
            }
            other => parts.push(other),
        }
    }
    Ok(parts)
}

/// Join a directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Parent directory of a normalised path, `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("roms//a.zip").expect("ok"), "/roms/a.zip");
        assert_eq!(normalize("/cache/./x/").expect("ok"), "/cache/x");
        assert_eq!(normalize("/").expect("ok"), "/");
        assert!(normalize("/roms/../etc").is_err());
    }

    #[test]
    fn test_parent_and_join() {
        assert_eq!(parent("/cache/a_cache"), Some("/cache"));
        assert_eq!(parent("/cache"), Some("/"));
        assert_eq!(parent("/"), None);
        assert_eq!(join("/cache/", "a_cache"), "/cache/a_cache");
    }
}
