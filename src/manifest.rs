//! `META-INF/MANIFEST.MF` parsing shared by C1 (nested-path resolution) and
//! C4 (a classpath element's manifest-declared `children()`).
//!
//! Grounded in `scan.rs::parse_manifest_classpath`: textual
//! key/value manifest with continuation lines (a line starting with a single
//! space continues the previous value), `Class-Path` is space-delimited and
//! resolved relative to the archive's parent directory.

use std::path::{Path, PathBuf};

/// Parse the `Class-Path` manifest attribute into absolute/relative entries,
/// resolved against `archive_path`'s parent directory: the attribute value
/// is space-delimited URIs interpreted relative to the archive's parent
/// directory.
pub fn parse_class_path(archive_path: &Path, manifest_text: &str) -> Vec<PathBuf> {
    let Some(class_path) = find_attribute(manifest_text, "Class-Path") else {
        return Vec::new();
    };

    let base_dir = archive_path.parent().unwrap_or_else(|| Path::new(""));
    class_path
        .split_whitespace()
        .map(|entry| {
            let entry_path = PathBuf::from(entry);
            if entry_path.is_absolute() {
                entry_path
            } else {
                base_dir.join(entry_path)
            }
        })
        .collect()
}

/// Find the first `key: value` attribute (honoring manifest continuation
/// lines) with the given key, case-sensitive per the manifest spec.
pub fn find_attribute(manifest_text: &str, key: &str) -> Option<String> {
    let mut found = None;
    let mut current_key: Option<String> = None;
    let mut current_value = String::new();

    let flush = |current_key: &mut Option<String>, current_value: &mut String, found: &mut Option<String>| {
        if let Some(k) = current_key.take() {
            if k == key {
                *found = Some(current_value.clone());
            }
        }
        current_value.clear();
    };

    for raw_line in manifest_text.lines() {
        let line = raw_line.trim_end_matches('\r');
        if let Some(continuation) = line.strip_prefix(' ') {
            if current_key.is_some() {
                current_value.push_str(continuation);
            }
            continue;
        }

        flush(&mut current_key, &mut current_value, &mut found);

        if let Some((k, v)) = line.split_once(':') {
            current_key = Some(k.trim().to_string());
            current_value.push_str(v.trim_start());
        }
    }
    flush(&mut current_key, &mut current_value, &mut found);

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_class_path() {
        let manifest = "Manifest-Version: 1.0\nClass-Path: lib/x.jar lib/y.jar\n\n";
        let entries = parse_class_path(Path::new("/p/m.jar"), manifest);
        assert_eq!(
            entries,
            vec![PathBuf::from("/p/lib/x.jar"), PathBuf::from("/p/lib/y.jar")]
        );
    }

    #[test]
    fn absolute_class_path_entries_are_kept_as_is() {
        let manifest = "Manifest-Version: 1.0\nClass-Path: /abs/dep.jar\n\n";
        let entries = parse_class_path(Path::new("/p/m.jar"), manifest);
        assert_eq!(entries, vec![PathBuf::from("/abs/dep.jar")]);
    }

    #[test]
    fn honors_continuation_lines() {
        let manifest = "Manifest-Version: 1.0\nClass-Path: lib/x.jar\n lib/y.jar\n\n";
        let entries = parse_class_path(Path::new("/p/m.jar"), manifest);
        assert_eq!(
            entries,
            vec![PathBuf::from("/p/lib/x.jar"), PathBuf::from("/p/lib/y.jar")]
        );
    }

    #[test]
    fn missing_class_path_yields_empty() {
        let manifest = "Manifest-Version: 1.0\n\n";
        assert!(parse_class_path(Path::new("/p/m.jar"), manifest).is_empty());
    }
}
