//! C1 — Path Resolver.
//!
//! Turns a raw, possibly-nested classpath location into a canonical
//! [`ResolvedLocation`]. Grounded in `scan.rs`'s path-handling helpers
//! (`is_jar_path`, `path_key`, manifest resolution), generalized to
//! a `!`-delimited nested-archive grammar.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, bail};

use crate::error::ResolveError;

const ARCHIVE_EXTENSIONS: [&str; 4] = ["jar", "zip", "war", "car"];

/// An unresolved classpath location as given by the caller.
#[derive(Clone, Debug)]
pub struct RelativePath {
    pub base: Option<PathBuf>,
    pub raw_path: String,
    pub class_loaders: Vec<String>,
}

impl RelativePath {
    pub fn new(raw_path: impl Into<String>) -> Self {
        Self {
            base: None,
            raw_path: raw_path.into(),
            class_loaders: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: PathBuf) -> Self {
        self.base = Some(base);
        self
    }
}

/// One segment of a `!`-delimited nested-archive path expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Archive(PathBuf),
    ZipBaseDir(String),
}

/// A canonicalized, classified classpath location.
#[derive(Clone, Debug)]
pub struct ResolvedLocation {
    pub canonical_path: PathBuf,
    pub zip_base_dir: Option<String>,
    pub kind: LocationKind,
    /// For `!`-nested paths, the chain of archive segments from outermost to
    /// innermost, each still needing extraction by C2 before `canonical_path`
    /// (which names the innermost archive file once materialized) is valid.
    pub nested_chain: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationKind {
    Directory,
    Archive,
}

impl ResolvedLocation {
    /// Identity tuple: `(canonicalPath, zipBaseDir)`.
    pub fn identity(&self) -> (PathBuf, Option<String>) {
        (self.canonical_path.clone(), self.zip_base_dir.clone())
    }
}

/// Policy governing what C1/C4 will accept, independent of `ScanSpec`'s
/// resource-level allow/deny rules (that's C6's job).
pub struct ResolvePolicy {
    pub deny_system_archives: bool,
    pub jar_name_filter: Option<Box<dyn Fn(&Path) -> bool + Send + Sync>>,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            deny_system_archives: false,
            jar_name_filter: None,
        }
    }
}

/// Normalize a raw path by trimming a trailing `!`, `!/`, `/!`, or `/!/`.
fn normalize_trailing_bang(raw: &str) -> &str {
    let mut s = raw;
    loop {
        if let Some(stripped) = s.strip_suffix("!/") {
            s = stripped;
        } else if let Some(stripped) = s.strip_suffix("/!") {
            s = stripped;
        } else if let Some(stripped) = s.strip_suffix('!') {
            s = stripped;
        } else {
            break;
        }
    }
    s
}

fn is_archive_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ARCHIVE_EXTENSIONS.iter().any(|candidate| ext.eq_ignore_ascii_case(candidate)))
        .unwrap_or(false)
}

fn is_http_uri(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

/// Split a `!`-delimited nested path expression into segments. Every
/// segment but possibly the last must look like an archive; a non-archive
/// final segment is the zip-internal base directory.
pub fn split_nested_path(raw: &str) -> Result<Vec<PathSegment>> {
    let trimmed = normalize_trailing_bang(raw);
    if trimmed.is_empty() {
        bail!(ResolveError::MalformedNestedPath(raw.to_string()));
    }

    let parts: Vec<&str> = trimmed.split('!').map(|p| p.trim_matches('/')).collect();
    let mut segments = Vec::with_capacity(parts.len());
    for (index, part) in parts.iter().enumerate() {
        let is_last = index + 1 == parts.len();
        let candidate = Path::new(part);
        if is_last && !is_archive_extension(candidate) && parts.len() > 1 {
            segments.push(PathSegment::ZipBaseDir((*part).to_string()));
        } else {
            if !is_archive_extension(candidate) && parts.len() > 1 {
                bail!(ResolveError::MalformedNestedPath(raw.to_string()));
            }
            segments.push(PathSegment::Archive(candidate.to_path_buf()));
        }
    }
    Ok(segments)
}

/// Resolve one [`RelativePath`] into a [`ResolvedLocation`], or `None` if the
/// raw path is an HTTP(S) URI (handled instead by C2's fetcher) — callers
/// distinguish the two cases via [`classify_raw_path`].
pub fn resolve(base: Option<&Path>, raw_path: &str) -> Result<ResolvedLocation> {
    if is_http_uri(raw_path) {
        bail!(ResolveError::NonLocalUri(raw_path.to_string()));
    }

    let segments = split_nested_path(raw_path)?;
    let (archives, zip_base_dir) = split_archives_and_base(segments);
    if archives.is_empty() {
        bail!(ResolveError::MalformedNestedPath(raw_path.to_string()));
    }

    let first = &archives[0];
    let qualified = if first.is_absolute() {
        first.clone()
    } else if let Some(base) = base {
        base.join(first)
    } else {
        first.clone()
    };

    let canonical = qualified
        .canonicalize()
        .map_err(|source| ResolveError::Canonicalize {
            path: qualified.clone(),
            source,
        })
        .context("canonicalize classpath location")?;

    let kind = if canonical.is_dir() {
        LocationKind::Directory
    } else if canonical.is_file() {
        LocationKind::Archive
    } else {
        bail!(ResolveError::NeitherFileNorDirectory(canonical));
    };

    if archives.len() > 1 && kind != LocationKind::Archive {
        bail!(ResolveError::MalformedNestedPath(raw_path.to_string()));
    }

    Ok(ResolvedLocation {
        canonical_path: canonical,
        zip_base_dir,
        kind,
        nested_chain: archives[1..].to_vec(),
    })
}

fn split_archives_and_base(segments: Vec<PathSegment>) -> (Vec<PathBuf>, Option<String>) {
    let mut archives = Vec::new();
    let mut zip_base_dir = None;
    for segment in segments {
        match segment {
            PathSegment::Archive(path) => archives.push(path),
            PathSegment::ZipBaseDir(dir) => zip_base_dir = Some(dir),
        }
    }
    (archives, zip_base_dir)
}

/// Apply [`ResolvePolicy`] to a resolved location, returning an error
/// carrying the specific reason a location is invalid.
pub fn validate(location: &ResolvedLocation, policy: &ResolvePolicy, system_cache: &SystemArchiveCache) -> Result<()> {
    if let Some(filter) = &policy.jar_name_filter {
        if location.kind == LocationKind::Archive && !filter(&location.canonical_path) {
            bail!(ResolveError::DeniedByFilter(location.canonical_path.clone()));
        }
    }
    if policy.deny_system_archives
        && location.kind == LocationKind::Archive
        && system_cache.is_system_archive(&location.canonical_path)
    {
        bail!(ResolveError::DeniedSystemArchive(location.canonical_path.clone()));
    }
    Ok(())
}

const SYSTEM_PREFIXES: [&str; 3] = ["java.", "jdk.", "sun."];
const SYSTEM_ARCHIVE_NAMES: [&str; 3] = ["rt.jar", "lib/rt.jar", "jre/lib/rt.jar"];
const SEARCH_DEPTH: usize = 2;

/// Memoized "is this a system archive" classifier.
#[derive(Default)]
pub struct SystemArchiveCache {
    memo: Mutex<HashSet<PathBuf>>,
    known_system: Mutex<HashSet<PathBuf>>,
}

impl SystemArchiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_system_archive(&self, path: &Path) -> bool {
        {
            let memo = self.memo.lock().expect("system archive memo poisoned");
            if memo.contains(path) {
                return self.known_system.lock().expect("known-system set poisoned").contains(path);
            }
        }

        let is_system = Self::probe(path);
        self.memo.lock().expect("system archive memo poisoned").insert(path.to_path_buf());
        if is_system {
            self.known_system
                .lock()
                .expect("known-system set poisoned")
                .insert(path.to_path_buf());
        }
        is_system
    }

    pub fn known_system_archives(&self) -> HashSet<PathBuf> {
        self.known_system.lock().expect("known-system set poisoned").clone()
    }

    fn probe(path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.eq_ignore_ascii_case("rt.jar") {
                return true;
            }
            if SYSTEM_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
                return true;
            }
        }

        let mut ancestor = path.parent();
        for _ in 0..SEARCH_DEPTH {
            let Some(dir) = ancestor else { break };
            for candidate in SYSTEM_ARCHIVE_NAMES {
                if dir.join(candidate).is_file() {
                    return true;
                }
            }
            ancestor = dir.parent();
        }
        false
    }
}

pub fn is_jar_like(path: &Path) -> bool {
    is_archive_extension(path)
}
