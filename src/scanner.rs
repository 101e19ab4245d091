//! C6 — Recursive Scanner.
//!
//! Walks a validated [`ClasspathElement`], classifies each candidate path
//! against a [`ScanSpec`], and emits classfile/resource hits plus the
//! `file → lastModified` map. Grounded in `scan.rs::scan_dir`/
//! `scan_jar_file`, generalized from "everything is a class of interest" to
//! an allow/deny package model.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::SystemTime;

use anyhow::Result;
use tracing::debug;

use crate::classpath_element::ClasspathElement;
use crate::path_resolver::RelativePath;

/// One registered resource handler: a path predicate plus the name it is
/// reported under in a [`ResourceMatch`].
pub struct PathPredicate {
    pub name: String,
    matcher: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl PathPredicate {
    pub fn new(name: impl Into<String>, matcher: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self { name: name.into(), matcher: Box::new(matcher) }
    }

    fn matches(&self, relative_path: &str) -> bool {
        (self.matcher)(relative_path)
    }
}

/// Configuration governing which paths C6 emits.
#[derive(Default)]
pub struct ScanSpec {
    allowed_packages: Vec<String>,
    denied_packages: Vec<String>,
    specifically_allowed_classes: HashSet<String>,
    resource_predicates: Vec<PathPredicate>,
    pub scan_jars: bool,
    pub scan_dirs: bool,
    pub deny_system_archives: bool,
    jar_name_filter: Option<Box<dyn Fn(&Path) -> bool + Send + Sync>>,
    pub override_class_loaders: Option<Vec<String>>,
    pub added_class_loaders: Vec<String>,
}

impl ScanSpec {
    pub fn builder() -> ScanSpecBuilder {
        ScanSpecBuilder::default()
    }

    pub fn jar_name_filter(&self) -> Option<&(dyn Fn(&Path) -> bool + Send + Sync)> {
        self.jar_name_filter.as_deref()
    }
}

#[derive(Default)]
pub struct ScanSpecBuilder {
    spec: ScanSpec,
}

impl ScanSpecBuilder {
    pub fn allow_package(mut self, package: impl Into<String>) -> Self {
        self.spec.allowed_packages.push(package.into());
        self
    }

    pub fn deny_package(mut self, package: impl Into<String>) -> Self {
        self.spec.denied_packages.push(package.into());
        self
    }

    pub fn allow_class(mut self, class_name: impl Into<String>) -> Self {
        self.spec.specifically_allowed_classes.insert(class_name.into());
        self
    }

    pub fn resource_predicate(mut self, predicate: PathPredicate) -> Self {
        self.spec.resource_predicates.push(predicate);
        self
    }

    pub fn scan_jars(mut self, value: bool) -> Self {
        self.spec.scan_jars = value;
        self
    }

    pub fn scan_dirs(mut self, value: bool) -> Self {
        self.spec.scan_dirs = value;
        self
    }

    pub fn deny_system_archives(mut self, value: bool) -> Self {
        self.spec.deny_system_archives = value;
        self
    }

    pub fn jar_name_filter(mut self, filter: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.spec.jar_name_filter = Some(Box::new(filter));
        self
    }

    pub fn added_class_loader(mut self, loader: impl Into<String>) -> Self {
        self.spec.added_class_loaders.push(loader.into());
        self
    }

    pub fn build(mut self) -> ScanSpec {
        if self.spec.scan_jars == false && self.spec.scan_dirs == false {
            // Default to scanning everything when the builder never touched
            // either flag (`ScanSpecBuilder::default()` leaves both false).
            self.spec.scan_jars = true;
            self.spec.scan_dirs = true;
        }
        self.spec
    }
}

/// The classification of one candidate path against a [`ScanSpec`]: five
/// named outcomes, two of which both mean "skip subtree".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchResult {
    NotWithinAllowed,
    WithinDenied,
    AncestorOfAllowed,
    WithinAllowed,
    AtAllowedClassPackage,
}

impl MatchResult {
    pub fn should_emit(self) -> bool {
        matches!(self, MatchResult::WithinAllowed | MatchResult::AtAllowedClassPackage)
    }
}

pub fn package_of(relative_path: &str) -> String {
    match relative_path.rsplit_once('/') {
        Some((dir, _)) => dir.replace('/', "."),
        None => String::new(),
    }
}

pub fn class_name_of(relative_path: &str) -> Option<String> {
    relative_path.strip_suffix(".class").map(|stem| stem.replace('/', "."))
}

fn is_within_or_equal(ancestor: &str, candidate: &str) -> bool {
    candidate == ancestor || candidate.starts_with(&format!("{ancestor}."))
}

/// Classify a resource path's package against the allow/deny package lists,
/// then apply the specifically-allowed-classes override.
pub fn match_path(relative_path: &str, spec: &ScanSpec) -> MatchResult {
    if let Some(class_name) = class_name_of(relative_path) {
        if spec.specifically_allowed_classes.contains(&class_name) {
            return MatchResult::AtAllowedClassPackage;
        }
    }

    let package = package_of(relative_path);

    if spec.denied_packages.iter().any(|denied| is_within_or_equal(denied, &package)) {
        return MatchResult::WithinDenied;
    }

    if spec.allowed_packages.is_empty() {
        return MatchResult::WithinAllowed;
    }

    if spec.allowed_packages.iter().any(|allowed| is_within_or_equal(allowed, &package)) {
        return MatchResult::WithinAllowed;
    }

    let is_ancestor = spec.allowed_packages.iter().any(|allowed| {
        package.is_empty() || allowed == &package || allowed.starts_with(&format!("{package}."))
    });
    if is_ancestor {
        return MatchResult::AncestorOfAllowed;
    }

    MatchResult::NotWithinAllowed
}

/// Whether a class name falls in `spec`'s denied packages (used by C9 to
/// tell a denied-reference placeholder from an ordinary external one).
pub fn is_denied_class(class_name: &str, spec: &ScanSpec) -> bool {
    let relative_path = format!("{}.class", class_name.replace('.', "/"));
    matches!(match_path(&relative_path, spec), MatchResult::WithinDenied)
}

/// A classfile candidate handed off to C7 for decoding.
pub struct ClassfileResource {
    pub relative_path: String,
    pub bytes: Vec<u8>,
}

/// A non-classfile hit against a registered [`PathPredicate`].
pub struct ResourceMatch {
    pub relative_path: String,
    pub handler_name: String,
    pub bytes: Vec<u8>,
}

/// Everything one CE's scan produced.
pub struct ScanUnitOutput {
    pub classfiles: Vec<ClassfileResource>,
    pub resources: Vec<ResourceMatch>,
    pub file_timestamps: HashMap<String, SystemTime>,
    pub children: Vec<RelativePath>,
}

/// Walk `element`, classify every candidate against `spec`, and collect
/// emitted hits plus manifest-declared children.
pub fn scan_element(element: &ClasspathElement, spec: &ScanSpec) -> Result<ScanUnitOutput> {
    let candidates = element.resources()?;
    let mut classfiles = Vec::new();
    let mut resources = Vec::new();
    let mut file_timestamps = HashMap::new();
    let mut seen = HashSet::new();

    for candidate in candidates {
        // First occurrence wins per-resource within this CE.
        if !seen.insert(candidate.relative_path.clone()) {
            debug!(path = %candidate.relative_path, "duplicate resource path shadowed within classpath element");
            continue;
        }

        if let Some(modified) = candidate.last_modified {
            file_timestamps.insert(candidate.relative_path.clone(), modified);
        }

        let is_class = candidate.relative_path.ends_with(".class");
        let outcome = if is_class {
            match_path(&candidate.relative_path, spec)
        } else {
            MatchResult::WithinAllowed
        };

        if is_class {
            if !outcome.should_emit() {
                continue;
            }
            let bytes = candidate.open()?;
            classfiles.push(ClassfileResource { relative_path: candidate.relative_path, bytes });
            continue;
        }

        for predicate in &spec.resource_predicates {
            if predicate.matches(&candidate.relative_path) {
                let bytes = candidate.open()?;
                resources.push(ResourceMatch {
                    relative_path: candidate.relative_path.clone(),
                    handler_name: predicate.name.clone(),
                    bytes,
                });
                break;
            }
        }
    }

    let children = element
        .children()?
        .into_iter()
        .map(|path| RelativePath::new(path.to_string_lossy().to_string()))
        .collect();

    Ok(ScanUnitOutput { classfiles, resources, file_timestamps, children })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_resolver::{LocationKind, ResolvedLocation};
    use std::fs;

    #[test]
    fn match_path_honors_deny_list() {
        let spec = ScanSpec::builder().deny_package("com.bad").build();
        assert_eq!(match_path("com/bad/Thing.class", &spec), MatchResult::WithinDenied);
    }

    #[test]
    fn match_path_with_empty_allow_list_allows_everything() {
        let spec = ScanSpec::builder().build();
        assert_eq!(match_path("com/any/Thing.class", &spec), MatchResult::WithinAllowed);
    }

    #[test]
    fn match_path_recognizes_ancestor_of_allowed() {
        let spec = ScanSpec::builder().allow_package("com.good.deep").build();
        assert_eq!(match_path("com/good/Thing.class", &spec), MatchResult::AncestorOfAllowed);
        assert_eq!(match_path("com/good/deep/Thing.class", &spec), MatchResult::WithinAllowed);
        assert_eq!(match_path("com/other/Thing.class", &spec), MatchResult::NotWithinAllowed);
    }

    #[test]
    fn specifically_allowed_class_overrides_deny() {
        let spec = ScanSpec::builder()
            .deny_package("com.bad")
            .allow_class("com.bad.Exception")
            .build();
        assert_eq!(match_path("com/bad/Exception.class", &spec), MatchResult::AtAllowedClassPackage);
    }

    #[test]
    fn scan_element_collects_classfiles_and_timestamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("pkg")).expect("mkdir");
        fs::write(dir.path().join("pkg/A.class"), b"classbytes").expect("write");
        fs::write(dir.path().join("pkg/notes.txt"), b"ignored").expect("write");

        let location = ResolvedLocation {
            canonical_path: dir.path().to_path_buf(),
            zip_base_dir: None,
            kind: LocationKind::Directory,
            nested_chain: Vec::new(),
        };
        let element = ClasspathElement::new(location, dir.path().to_path_buf(), "000".to_string());
        let spec = ScanSpec::builder().build();
        let output = scan_element(&element, &spec).expect("scan");

        assert_eq!(output.classfiles.len(), 1);
        assert_eq!(output.classfiles[0].relative_path, "pkg/A.class");
        assert!(output.file_timestamps.contains_key("pkg/A.class"));
        assert!(output.resources.is_empty());
    }

    #[test]
    fn scan_element_runs_resource_predicates() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("app.properties"), b"k=v").expect("write");

        let location = ResolvedLocation {
            canonical_path: dir.path().to_path_buf(),
            zip_base_dir: None,
            kind: LocationKind::Directory,
            nested_chain: Vec::new(),
        };
        let element = ClasspathElement::new(location, dir.path().to_path_buf(), "000".to_string());
        let predicate = PathPredicate::new("properties", |path: &str| path.ends_with(".properties"));
        let spec = ScanSpec::builder().resource_predicate(predicate).build();
        let output = scan_element(&element, &spec).expect("scan");

        assert_eq!(output.resources.len(), 1);
        assert_eq!(output.resources[0].handler_name, "properties");
    }
}
