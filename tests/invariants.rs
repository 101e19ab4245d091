use std::sync::Arc;

use classpath_scan::test_support::{build_classfile, write_jar, ACC_ANNOTATION};
use classpath_scan::{scan, ArchiveFetcher, EnvironmentConfig, RelativePath, ScanOptions, ScanSpec};

fn build_fixture_jar(dir: &std::path::Path) -> std::path::PathBuf {
    let jar_path = dir.join("fixture.jar");
    write_jar(
        &jar_path,
        &[
            ("pkg/Base.class", &build_classfile("pkg.Base", Some("java.lang.Object"), &[], 0x0021)),
            ("pkg/Derived.class", &build_classfile("pkg.Derived", Some("pkg.Base"), &[], 0x0021)),
            ("pkg/Derived2.class", &build_classfile("pkg.Derived2", Some("pkg.Base"), &[], 0x0021)),
            ("pkg/Ann.class", &build_classfile("pkg.Ann", Some("java.lang.annotation.Annotation"), &[], ACC_ANNOTATION)),
        ],
    );
    jar_path
}

fn run_scan(jar_path: &std::path::Path) -> classpath_scan::ScanResult {
    scan(ScanOptions {
        classpath: vec![RelativePath::new(jar_path.to_string_lossy().to_string())],
        environment: EnvironmentConfig::default(),
        spec: ScanSpec::builder().build(),
        fetcher: None::<Arc<dyn ArchiveFetcher>>,
    })
    .expect("scan should succeed")
}

/// Invariant 3: superclass/subclass edges are inverse.
#[test]
fn subclass_and_superclass_edges_are_mutually_consistent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let jar_path = build_fixture_jar(dir.path());
    let result = run_scan(&jar_path);

    assert!(result.subclasses_of("pkg.Base").contains(&std::sync::Arc::from("pkg.Derived")));
    assert!(result.superclasses_of("pkg.Derived").contains(&std::sync::Arc::from("pkg.Base")));
}

/// Invariant 5: repeated scans of identical inputs serialize to identical
/// bytes once every collection is sorted deterministically. `pkg.Base` has
/// two subclasses, so this actually exercises the edge-set ordering — a
/// leaf class with only empty sets would pass vacuously.
#[test]
fn repeated_scans_serialize_byte_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let jar_path = build_fixture_jar(dir.path());

    let first = run_scan(&jar_path);
    let second = run_scan(&jar_path);

    let first_json = serde_json::to_string(first.class("pkg.Base").unwrap()).expect("serialize");
    let second_json = serde_json::to_string(second.class("pkg.Base").unwrap()).expect("serialize");
    assert_eq!(first_json, second_json);
    assert_eq!(first.environment_fingerprint(), second.environment_fingerprint());
}

/// Invariant 1: one CE per canonical path even when the same path is listed
/// twice on the input classpath.
#[test]
fn duplicate_classpath_entries_collapse_to_one_ce() {
    let dir = tempfile::tempdir().expect("tempdir");
    let jar_path = build_fixture_jar(dir.path());

    let result = scan(ScanOptions {
        classpath: vec![
            RelativePath::new(jar_path.to_string_lossy().to_string()),
            RelativePath::new(jar_path.to_string_lossy().to_string()),
        ],
        environment: EnvironmentConfig::default(),
        spec: ScanSpec::builder().build(),
        fetcher: None::<Arc<dyn ArchiveFetcher>>,
    })
    .expect("scan should succeed");

    assert_eq!(result.classpath_elements().len(), 1);
}
