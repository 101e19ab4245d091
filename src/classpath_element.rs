//! C4 — Classpath Element.
//!
//! A validated, scannable root (directory or archive) with lazily-computed
//! contents. Grounded in the `scan_dir`/`scan_jar_file` pair in
//! `scan.rs`, generalized into a type that separates "open candidate
//! resources" (this module) from "decide which candidates to emit"
//! (`scanner.rs`, C6).

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use zip::ZipArchive;

use crate::manifest::parse_class_path;
use crate::path_resolver::{LocationKind, ResolvedLocation};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementState {
    Pending,
    Validating,
    Valid,
    Invalid,
    Scanned,
}

/// One candidate entry inside a [`ClasspathElement`], before C6 decides
/// whether to emit it.
pub struct CandidateResource {
    /// Path relative to the element's (or its zip base dir's) root, using
    /// `/` separators regardless of host OS.
    pub relative_path: String,
    pub last_modified: Option<SystemTime>,
    source: ResourceSource,
}

enum ResourceSource {
    File(PathBuf),
    ZipEntry { archive_path: PathBuf, entry_name: String },
}

impl CandidateResource {
    pub fn open(&self) -> Result<Vec<u8>> {
        match &self.source {
            ResourceSource::File(path) => {
                fs::read(path).with_context(|| format!("read {}", path.display()))
            }
            ResourceSource::ZipEntry { archive_path, entry_name } => {
                let file = fs::File::open(archive_path)
                    .with_context(|| format!("open {}", archive_path.display()))?;
                let mut archive = ZipArchive::new(file)
                    .with_context(|| format!("read {}", archive_path.display()))?;
                let mut entry = archive
                    .by_name(entry_name)
                    .with_context(|| format!("find entry {entry_name}"))?;
                let mut data = Vec::new();
                entry.read_to_end(&mut data).context("read entry bytes")?;
                Ok(data)
            }
        }
    }
}

/// A validated scannable unit.
pub struct ClasspathElement {
    pub location: ResolvedLocation,
    /// The path actually materialized on disk (after C2 has resolved any
    /// nested chain / remote fetch); equals `location.canonical_path` for
    /// plain, non-nested locations.
    pub materialized_path: PathBuf,
    pub scan_order_key: String,
    pub state: ElementState,
}

impl ClasspathElement {
    pub fn new(location: ResolvedLocation, materialized_path: PathBuf, scan_order_key: String) -> Self {
        Self {
            location,
            materialized_path,
            scan_order_key,
            state: ElementState::Pending,
        }
    }

    pub fn canonical_identity(&self) -> (PathBuf, Option<String>) {
        self.location.identity()
    }

    /// Lazily enumerate candidate resources, honoring `zip_base_dir` as the
    /// effective root for archive entries.
    pub fn resources(&self) -> Result<Vec<CandidateResource>> {
        match self.location.kind {
            LocationKind::Directory => self.directory_resources(),
            LocationKind::Archive => self.archive_resources(),
        }
    }

    fn directory_resources(&self) -> Result<Vec<CandidateResource>> {
        let root = match &self.location.zip_base_dir {
            Some(base) => self.materialized_path.join(base),
            None => self.materialized_path.clone(),
        };
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walk {}", root.display()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let last_modified = entry.metadata().ok().and_then(|m| m.modified().ok());
            out.push(CandidateResource {
                relative_path: relative,
                last_modified,
                source: ResourceSource::File(entry.path().to_path_buf()),
            });
        }
        Ok(out)
    }

    fn archive_resources(&self) -> Result<Vec<CandidateResource>> {
        let file = fs::File::open(&self.materialized_path)
            .with_context(|| format!("open {}", self.materialized_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("read {}", self.materialized_path.display()))?;

        let base = self.location.zip_base_dir.as_deref();
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .with_context(|| format!("read entry {index}"))?;
            if entry.is_dir() {
                continue;
            }
            names.push(entry.name().to_string());
        }
        names.sort();

        let mut out = Vec::new();
        for name in names {
            let relative = match base {
                Some(base) => match name.strip_prefix(base).map(|s| s.trim_start_matches('/')) {
                    Some(rest) if !rest.is_empty() || name == base => rest.to_string(),
                    _ => continue,
                },
                None => name.clone(),
            };
            out.push(CandidateResource {
                relative_path: relative,
                last_modified: None,
                source: ResourceSource::ZipEntry {
                    archive_path: self.materialized_path.clone(),
                    entry_name: name,
                },
            });
        }
        Ok(out)
    }

    /// Manifest-declared secondary roots, resolved against the element's
    /// own parent directory.
    pub fn children(&self) -> Result<Vec<PathBuf>> {
        if self.location.kind != LocationKind::Archive {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.materialized_path)
            .with_context(|| format!("open {}", self.materialized_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("read {}", self.materialized_path.display()))?;
        let Ok(mut entry) = archive.by_name("META-INF/MANIFEST.MF") else {
            return Ok(Vec::new());
        };
        let mut content = String::new();
        entry.read_to_string(&mut content).context("read manifest")?;
        Ok(parse_class_path(&self.materialized_path, &content))
    }
}

/// Build the child order key for a manifest-linked secondary root:
/// `parentKey + "." + zeroPaddedIndex`, so it sorts strictly between
/// `parentKey` and whatever the parent's next top-level sibling's key is.
pub fn child_order_key(parent_key: &str, index: usize) -> String {
    format!("{parent_key}.{index:06}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_resolver::LocationKind;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn fake_location(path: PathBuf, kind: LocationKind, zip_base_dir: Option<String>) -> ResolvedLocation {
        ResolvedLocation {
            canonical_path: path,
            zip_base_dir,
            kind,
            nested_chain: Vec::new(),
        }
    }

    #[test]
    fn directory_resources_are_sorted_and_relative() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("pkg")).expect("mkdir");
        fs::write(dir.path().join("pkg/B.class"), b"b").expect("write b");
        fs::write(dir.path().join("pkg/A.class"), b"a").expect("write a");

        let location = fake_location(dir.path().to_path_buf(), LocationKind::Directory, None);
        let element = ClasspathElement::new(location, dir.path().to_path_buf(), "0".to_string());
        let resources = element.resources().expect("resources");
        let names: Vec<_> = resources.iter().map(|r| r.relative_path.clone()).collect();
        assert_eq!(names, vec!["pkg/A.class", "pkg/B.class"]);
    }

    #[test]
    fn archive_resources_respect_zip_base_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let jar_path = dir.path().join("a.jar");
        let file = fs::File::create(&jar_path).expect("create jar");
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("BOOT-INF/classes/pkg/B.class", SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(b"bytes").expect("write entry");
        writer
            .start_file("BOOT-INF/lib/dep.jar", SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(b"dep").expect("write dep");
        writer.finish().expect("finish");

        let location = fake_location(
            jar_path.clone(),
            LocationKind::Archive,
            Some("BOOT-INF/classes".to_string()),
        );
        let element = ClasspathElement::new(location, jar_path, "0".to_string());
        let resources = element.resources().expect("resources");
        let names: Vec<_> = resources.iter().map(|r| r.relative_path.clone()).collect();
        assert_eq!(names, vec!["pkg/B.class"]);
    }

    #[test]
    fn children_resolves_manifest_class_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let jar_path = dir.path().join("m.jar");
        let file = fs::File::create(&jar_path).expect("create jar");
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default())
            .expect("start manifest");
        writer
            .write_all(b"Manifest-Version: 1.0\nClass-Path: lib/x.jar lib/y.jar\n\n")
            .expect("write manifest");
        writer.finish().expect("finish");

        let location = fake_location(jar_path.clone(), LocationKind::Archive, None);
        let element = ClasspathElement::new(location, jar_path, "0".to_string());
        let children = element.children().expect("children");
        assert_eq!(children.len(), 2);
        assert!(children[0].ends_with("lib/x.jar"));
        assert!(children[1].ends_with("lib/y.jar"));
    }

    #[test]
    fn child_order_key_sorts_between_parent_and_next_sibling() {
        let first = child_order_key("000", 0);
        let second = child_order_key("000", 1);
        assert!(first.as_str() > "000");
        assert!(first < second);
        assert!(second.as_str() < "001");
    }
}
