//! Parallel classpath resolution, classfile decoding, and class-graph
//! cross-linking for JVM-family bytecode archives.
//!
//! This crate implements the four hard problems of a classpath scanner:
//! classpath resolution ([`path_resolver`], [`nested_archive`],
//! [`environment`], [`classpath_element`]), a parallel recursive scan
//! ([`work_queue`], [`scanner`]), classfile binary decoding ([`classfile`]),
//! and cross-linking into a class graph ([`cross_linker`], [`scan_result`]).
//! The end-user CLI, config-file loading, log sinks, and reflective mapping
//! to already-loaded runtime classes are deliberately left to callers; this
//! crate exposes narrow trait seams (`ArchiveFetcher`, `CallStackProvider`,
//! `ModuleSystemProvider`) for them instead of implementing them.

pub mod classfile;
pub mod classpath_element;
pub mod cross_linker;
pub mod environment;
pub mod error;
pub mod intern;
pub mod manifest;
pub mod nested_archive;
pub mod path_resolver;
pub mod scan_result;
pub mod scanner;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod work_queue;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use tracing::{debug, info_span, warn};

use classpath_element::{child_order_key, ClasspathElement};
use cross_linker::ClassArena;
use error::ResolveError;
use intern::Interner;
use nested_archive::{NestedArchiveHandler, TempFileRegistry};
use path_resolver::{LocationKind, ResolvedLocation, SystemArchiveCache};
use scanner::ScanUnitOutput;
use work_queue::{WorkItem, WorkOutcome, WorkQueue};

pub use classfile::ClassfileUnlinked;
pub use cross_linker::{ClassInfo, ClassKind};
pub use environment::EnvironmentConfig;
pub use nested_archive::ArchiveFetcher;
pub use path_resolver::RelativePath;
pub use scan_result::{ClasspathElementSummary, ScanResult};
pub use scanner::{MatchResult, PathPredicate, ScanSpec, ScanSpecBuilder};

/// Optional collaborator bridging a scanned class name back to a live
/// handle in the host's own runtime (e.g. an already-loaded `Class<?>`).
/// The core never calls this itself: it stores only names and descriptors,
/// and resolution stays entirely the host's responsibility.
pub trait ClassResolver {
    type ClassHandle;
    fn resolve_class(&self, name: &str) -> Option<Self::ClassHandle>;
}

/// Everything one call to [`scan`] needs, collected into one options struct
/// rather than a long parameter list.
pub struct ScanOptions {
    pub classpath: Vec<RelativePath>,
    pub environment: EnvironmentConfig,
    pub spec: ScanSpec,
    pub fetcher: Option<Arc<dyn ArchiveFetcher>>,
}

type Identity = (PathBuf, Option<String>);

/// Run one full scan: resolve the classpath, walk every element in
/// parallel, decode classfiles, and cross-link the result.
///
/// Returns `Err` on the first worker exception: this either returns a
/// complete `ScanResult` or surfaces the first worker exception, never
/// partial progress.
pub fn scan(options: ScanOptions) -> Result<ScanResult> {
    let _span = info_span!("scan").entered();

    let interner = Interner::new();
    let system_cache = SystemArchiveCache::new();
    let temp_files = Arc::new(TempFileRegistry::new());
    let nested_handler = NestedArchiveHandler::new(options.fetcher.clone(), temp_files.clone());

    let discovered = environment::discover(&options.environment);
    let mut raw_entries: Vec<RelativePath> = options.classpath;
    if let Some(overrides) = &options.spec.override_class_loaders {
        raw_entries.extend(overrides.iter().cloned().map(RelativePath::new));
    } else {
        raw_entries.extend(discovered.roots.iter().map(|p| RelativePath::new(p.to_string_lossy().to_string())));
        raw_entries.extend(options.spec.added_class_loaders.iter().cloned().map(RelativePath::new));
    }

    let mut seen_identities: HashSet<Identity> = HashSet::new();
    let mut initial_elements = Vec::new();
    for (index, raw) in raw_entries.iter().enumerate() {
        let key = format!("{index:06}");
        if let Some(element) = resolve_one(raw, &key, &options.spec, &system_cache, &nested_handler, &mut seen_identities) {
            initial_elements.push(element);
        }
    }

    let shared_identities = Mutex::new(seen_identities);
    let seeds: Vec<WorkItem<ClasspathElement>> = initial_elements
        .into_iter()
        .map(|ce| WorkItem { scan_order_key: ce.scan_order_key.clone(), seed: ce })
        .collect();

    let queue = WorkQueue::new();
    let spec = &options.spec;
    let results = queue.run(seeds, |ce: &ClasspathElement| -> Result<WorkOutcome<ClasspathElement, (ScanUnitOutput, ClasspathElementSummary)>> {
        let output = scanner::scan_element(ce, spec)?;
        let summary = ClasspathElementSummary {
            canonical_path: ce.location.canonical_path.clone(),
            zip_base_dir: ce.location.zip_base_dir.clone(),
            scan_order_key: ce.scan_order_key.clone(),
        };

        let mut children = Vec::new();
        for (child_index, child_path) in output.children.iter().enumerate() {
            let child_key = child_order_key(&ce.scan_order_key, child_index);
            if let Some(element) =
                resolve_one_shared(child_path, &child_key, spec, &system_cache, &nested_handler, &shared_identities)
            {
                children.push(element);
            }
        }

        Ok(WorkOutcome { output: (output, summary), children })
    });

    let mut records: Vec<ClassfileUnlinked> = Vec::new();
    let mut file_timestamps: HashMap<String, std::time::SystemTime> = HashMap::new();
    let mut classpath_elements: Vec<ClasspathElementSummary> = Vec::new();

    for (key, (output, summary)) in results {
        for classfile in output.classfiles {
            match classfile::decode(&classfile.bytes, &key) {
                Ok(record) => records.push(record),
                Err(err) => debug!(path = %classfile.relative_path, error = %err, "skipping malformed classfile"),
            }
        }
        for (relative, modified) in output.file_timestamps {
            let full_key = format!("{}!{}", summary.canonical_path.display(), relative);
            file_timestamps.entry(full_key).or_insert(modified);
        }
        classpath_elements.push(summary);
    }

    let arena: ClassArena = cross_linker::link(&records, &interner, |name| scanner::is_denied_class(name, spec));
    let fingerprint = environment_fingerprint(&classpath_elements, spec);

    Ok(ScanResult::build(arena, classpath_elements, file_timestamps, fingerprint))
}

/// Resolve and validate a raw classpath entry into a location, without
/// touching the filesystem beyond the canonicalization `path_resolver`
/// itself needs. Returns `None` (with a log note) for anything that should
/// be skipped, never failing the whole scan.
fn resolve_location(raw: &RelativePath, spec: &ScanSpec, system_cache: &SystemArchiveCache) -> Option<ResolvedLocation> {
    let location = match path_resolver::resolve(raw.base.as_deref(), &raw.raw_path) {
        Ok(location) => location,
        Err(err) => {
            debug!(path = %raw.raw_path, error = %err, "skipping unresolvable classpath entry");
            return None;
        }
    };

    if (location.kind == LocationKind::Directory && !spec.scan_dirs) || (location.kind == LocationKind::Archive && !spec.scan_jars) {
        return None;
    }

    if let Err(err) = check_policy(&location, spec, system_cache) {
        debug!(path = %location.canonical_path.display(), error = %err, "classpath entry denied by policy");
        return None;
    }

    Some(location)
}

/// Materialize an already-validated, already-dedup-registered location onto
/// local disk (extracting nested archives as needed) and wrap it as a
/// [`ClasspathElement`]. Returns `None` (with a log note) on I/O failure.
fn materialize_element(
    location: ResolvedLocation,
    scan_order_key: &str,
    nested_handler: &NestedArchiveHandler,
) -> Option<ClasspathElement> {
    let materialized_path = match nested_handler.materialize(&location) {
        Ok(path) => path,
        Err(err) => {
            warn!(path = %location.canonical_path.display(), error = %err, "failed to materialize classpath entry");
            return None;
        }
    };

    Some(ClasspathElement::new(location, materialized_path, scan_order_key.to_string()))
}

/// Resolve, validate, dedup-register, and materialize one raw classpath
/// entry sequentially (used for the initial, pre-queue classpath entries,
/// where there is no contention on `seen_identities`).
fn resolve_one(
    raw: &RelativePath,
    scan_order_key: &str,
    spec: &ScanSpec,
    system_cache: &SystemArchiveCache,
    nested_handler: &NestedArchiveHandler,
    seen_identities: &mut HashSet<Identity>,
) -> Option<ClasspathElement> {
    let location = resolve_location(raw, spec, system_cache)?;

    if !seen_identities.insert(location.identity()) {
        debug!(path = %location.canonical_path.display(), "duplicate classpath location shadowed");
        return None;
    }

    materialize_element(location, scan_order_key, nested_handler)
}

/// Same as [`resolve_one`], but for concurrent callers sharing one identity
/// set: the lock is held only long enough to insert the identity, never
/// across `materialize`'s archive-extraction I/O.
fn resolve_one_shared(
    raw: &RelativePath,
    scan_order_key: &str,
    spec: &ScanSpec,
    system_cache: &SystemArchiveCache,
    nested_handler: &NestedArchiveHandler,
    seen_identities: &Mutex<HashSet<Identity>>,
) -> Option<ClasspathElement> {
    let location = resolve_location(raw, spec, system_cache)?;

    let is_duplicate = {
        let mut guard = seen_identities.lock().expect("identity set poisoned");
        !guard.insert(location.identity())
    };
    if is_duplicate {
        debug!(path = %location.canonical_path.display(), "duplicate classpath location shadowed");
        return None;
    }

    materialize_element(location, scan_order_key, nested_handler)
}

fn check_policy(location: &ResolvedLocation, spec: &ScanSpec, system_cache: &SystemArchiveCache) -> Result<()> {
    if let Some(filter) = spec.jar_name_filter() {
        if location.kind == LocationKind::Archive && !filter(&location.canonical_path) {
            bail!(ResolveError::DeniedByFilter(location.canonical_path.clone()));
        }
    }
    if spec.deny_system_archives && location.kind == LocationKind::Archive && system_cache.is_system_archive(&location.canonical_path) {
        bail!(ResolveError::DeniedSystemArchive(location.canonical_path.clone()));
    }
    Ok(())
}

/// A stable fingerprint of the resolved environment, for callers that want
/// to recognize "nothing on the classpath changed" without diffing the
/// whole [`ScanResult`].
fn environment_fingerprint(classpath_elements: &[ClasspathElementSummary], spec: &ScanSpec) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    for element in classpath_elements {
        element.canonical_path.hash(&mut hasher);
        element.zip_base_dir.hash(&mut hasher);
    }
    spec.scan_jars.hash(&mut hasher);
    spec.scan_dirs.hash(&mut hasher);
    spec.deny_system_archives.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
