//! C2 — Nested Archive Handler.
//!
//! Given a [`ResolvedLocation`] with a non-empty `nested_chain` (or a remote
//! URL), materializes the innermost archive onto the local filesystem,
//! memoizing extraction per path so concurrent demand for the same nested
//! path only does the work once.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use zip::ZipArchive;

use crate::path_resolver::ResolvedLocation;

/// External collaborator for fetching remote archives — HTTP fetching
/// itself is assumed available from the host.
pub trait ArchiveFetcher: Send + Sync {
    fn fetch(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Tracks every temp file created during a scan so teardown can delete them
/// all, including on cancellation.
#[derive(Default)]
pub struct TempFileRegistry {
    paths: Mutex<Vec<PathBuf>>,
}

impl TempFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, path: PathBuf) {
        self.paths.lock().expect("temp registry poisoned").push(path);
    }

    /// Delete every tracked temp file. Best-effort: failures to remove one
    /// file do not stop cleanup of the rest.
    pub fn teardown(&self) {
        let mut paths = self.paths.lock().expect("temp registry poisoned");
        for path in paths.drain(..) {
            let _ = fs::remove_file(&path);
        }
    }
}

impl Drop for TempFileRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}

enum Slot {
    Ready(PathBuf),
    Failed(String),
}

/// At-most-once nested-archive materializer. A `Mutex<HashMap<key, Slot>>`
/// (rather than a lock-free concurrent map — see `intern.rs` for why) gives
/// "late callers block on the inflight future" semantics simply: the mutex
/// held during extraction is the blocking mechanism, since nothing in this
/// corpus reaches for `tokio::sync::OnceCell`-style per-key futures outside
/// an async runtime, and this crate is synchronous (rayon-driven) by design.
pub struct NestedArchiveHandler {
    fetcher: Option<Arc<dyn ArchiveFetcher>>,
    temp_files: Arc<TempFileRegistry>,
    cache: Mutex<HashMap<String, Slot>>,
}

impl NestedArchiveHandler {
    pub fn new(fetcher: Option<Arc<dyn ArchiveFetcher>>, temp_files: Arc<TempFileRegistry>) -> Self {
        Self {
            fetcher,
            temp_files,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `location` to the innermost local archive path plus the set
    /// of valid zip-internal root directories observed at each nesting
    /// level.
    pub fn materialize(&self, location: &ResolvedLocation) -> Result<PathBuf> {
        let key = cache_key(location);
        {
            let cache = self.cache.lock().expect("nested archive cache poisoned");
            match cache.get(&key) {
                Some(Slot::Ready(path)) => return Ok(path.clone()),
                Some(Slot::Failed(reason)) => bail!("{reason}"),
                None => {}
            }
        }

        let result = self.materialize_uncached(location);
        let mut cache = self.cache.lock().expect("nested archive cache poisoned");
        match &result {
            Ok(path) => {
                cache.insert(key, Slot::Ready(path.clone()));
            }
            Err(err) => {
                cache.insert(key, Slot::Failed(err.to_string()));
            }
        }
        result
    }

    fn materialize_uncached(&self, location: &ResolvedLocation) -> Result<PathBuf> {
        let mut current = self.maybe_fetch_remote(&location.canonical_path)?;
        current = strip_self_extracting_prefix(&current, &self.temp_files)?;

        for segment in &location.nested_chain {
            current = self.extract_inner_archive(&current, segment)?;
            current = strip_self_extracting_prefix(&current, &self.temp_files)?;
        }

        Ok(current)
    }

    fn maybe_fetch_remote(&self, path: &Path) -> Result<PathBuf> {
        let as_str = path.to_string_lossy();
        if !(as_str.starts_with("http://") || as_str.starts_with("https://")) {
            return Ok(path.to_path_buf());
        }
        let Some(fetcher) = &self.fetcher else {
            bail!("no ArchiveFetcher configured for remote location {as_str}");
        };
        let dest = content_addressed_temp_path(&as_str);
        if !dest.exists() {
            fetcher.fetch(&as_str, &dest).context("fetch remote archive")?;
            self.temp_files.track(dest.clone());
        }
        Ok(dest)
    }

    fn extract_inner_archive(&self, outer: &Path, inner_name: &Path) -> Result<PathBuf> {
        let file = fs::File::open(outer).with_context(|| format!("open {}", outer.display()))?;
        let mut archive = ZipArchive::new(file).with_context(|| format!("read {}", outer.display()))?;
        let entry_name = inner_name.to_string_lossy().replace('\\', "/");
        let mut entry = archive
            .by_name(&entry_name)
            .with_context(|| format!("find entry {entry_name} in {}", outer.display()))?;

        let dest = content_addressed_temp_path(&format!("{}!{}", outer.display(), entry_name));
        let mut out = fs::File::create(&dest).with_context(|| format!("create {}", dest.display()))?;
        std::io::copy(&mut entry, &mut out).context("extract nested archive")?;
        self.temp_files.track(dest.clone());
        Ok(dest)
    }
}

fn strip_self_extracting_prefix(path: &Path, temp_files: &TempFileRegistry) -> Result<PathBuf> {
    let mut data = Vec::new();
    fs::File::open(path)
        .with_context(|| format!("open {}", path.display()))?
        .read_to_end(&mut data)
        .with_context(|| format!("read {}", path.display()))?;

    if let Some(offset) = find_zip_local_header(&data) {
        if offset == 0 {
            return Ok(path.to_path_buf());
        }
        let dest = content_addressed_temp_path(&format!("{}#stripped", path.display()));
        fs::write(&dest, &data[offset..]).with_context(|| format!("write {}", dest.display()))?;
        temp_files.track(dest.clone());
        return Ok(dest);
    }

    bail!("not a zip archive (no local file header magic found): {}", path.display())
}

const ZIP_LOCAL_HEADER_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

fn find_zip_local_header(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|window| window == ZIP_LOCAL_HEADER_MAGIC)
}

fn cache_key(location: &ResolvedLocation) -> String {
    let mut key = location.canonical_path.to_string_lossy().to_string();
    for segment in &location.nested_chain {
        key.push('!');
        key.push_str(&segment.to_string_lossy());
    }
    key
}

fn content_addressed_temp_path(key: &str) -> PathBuf {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    std::env::temp_dir().join(format!("classpath-scan-{:016x}", hasher.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_resolver::LocationKind;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_jar_with_entry(path: &Path, entry_name: &str, entry_bytes: &[u8]) {
        let file = fs::File::create(path).expect("create jar");
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(entry_name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(entry_bytes).expect("write entry");
        writer.finish().expect("finish jar");
    }

    #[test]
    fn materializes_single_level_archive_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outer = dir.path().join("outer.jar");
        write_jar_with_entry(&outer, "pkg/A.class", b"classbytes");

        let registry = Arc::new(TempFileRegistry::new());
        let handler = NestedArchiveHandler::new(None, registry);
        let location = ResolvedLocation {
            canonical_path: outer.clone(),
            zip_base_dir: None,
            kind: LocationKind::Archive,
            nested_chain: Vec::new(),
        };
        let materialized = handler.materialize(&location).expect("materialize");
        assert_eq!(materialized, outer);
    }

    #[test]
    fn materializes_nested_archive_to_extracted_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inner = dir.path().join("inner.jar");
        write_jar_with_entry(&inner, "BOOT-INF/classes/pkg/B.class", b"innerbytes");

        let outer = dir.path().join("outer.jar");
        let inner_bytes = fs::read(&inner).expect("read inner jar");
        write_jar_with_entry(&outer, "inner.jar", &inner_bytes);

        let registry = Arc::new(TempFileRegistry::new());
        let handler = NestedArchiveHandler::new(None, registry.clone());
        let location = ResolvedLocation {
            canonical_path: outer,
            zip_base_dir: Some("BOOT-INF/classes".to_string()),
            kind: LocationKind::Archive,
            nested_chain: vec![PathBuf::from("inner.jar")],
        };
        let materialized = handler.materialize(&location).expect("materialize");
        assert!(materialized.exists());

        let mut archive = ZipArchive::new(fs::File::open(&materialized).expect("open")).expect("zip");
        assert!(archive.by_name("BOOT-INF/classes/pkg/B.class").is_ok());
    }

    #[test]
    fn repeated_materialize_calls_are_memoized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outer = dir.path().join("outer.jar");
        write_jar_with_entry(&outer, "pkg/A.class", b"classbytes");

        let registry = Arc::new(TempFileRegistry::new());
        let handler = NestedArchiveHandler::new(None, registry);
        let location = ResolvedLocation {
            canonical_path: outer,
            zip_base_dir: None,
            kind: LocationKind::Archive,
            nested_chain: Vec::new(),
        };
        let first = handler.materialize(&location).expect("first");
        let second = handler.materialize(&location).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn teardown_removes_tracked_temp_files() {
        let registry = TempFileRegistry::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let tracked = dir.path().join("tracked.tmp");
        fs::write(&tracked, b"x").expect("write");
        registry.track(tracked.clone());
        registry.teardown();
        assert!(!tracked.exists());
    }
}
