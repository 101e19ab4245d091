use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use classpath_scan::test_support::{build_classfile, write_jar};
use classpath_scan::{scan, EnvironmentConfig, RelativePath, ScanOptions, ScanSpec};

struct Fixture {
    id: &'static str,
    jar_name: &'static str,
    entries: Vec<(&'static str, Vec<u8>)>,
    expected_class_count: usize,
}

fn build_fixtures() -> Vec<Fixture> {
    let dep_classes: Vec<(&'static str, Vec<u8>)> = vec![
        ("pkg/A.class", build_classfile("pkg.A", Some("java.lang.Object"), &[], 0x0021)),
        ("pkg/B.class", build_classfile("pkg.B", Some("pkg.A"), &[], 0x0021)),
        ("pkg/C.class", build_classfile("pkg.C", Some("pkg.A"), &["java.io.Serializable"], 0x0021)),
    ];

    let wide_classes: Vec<(&'static str, Vec<u8>)> = (0..50)
        .map(|i| {
            let name: &'static str = Box::leak(format!("pkg/wide/Class{i}.class").into_boxed_str());
            (name, build_classfile(&format!("pkg.wide.Class{i}"), Some("java.lang.Object"), &[], 0x0021))
        })
        .collect();

    vec![
        Fixture { id: "small_jar", jar_name: "dep.jar", entries: dep_classes, expected_class_count: 3 },
        Fixture { id: "wide_jar_50_classes", jar_name: "wide.jar", entries: wide_classes, expected_class_count: 50 },
    ]
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("classpath_scan");
    group.measurement_time(Duration::from_secs(3));
    group.warm_up_time(Duration::from_secs(1));
    group.sample_size(10);

    for fixture in build_fixtures() {
        let dir = tempfile::tempdir().expect("tempdir for bench fixture");
        let jar_path = dir.path().join(fixture.jar_name);
        let entry_refs: Vec<(&str, &[u8])> = fixture.entries.iter().map(|(name, bytes)| (*name, bytes.as_slice())).collect();
        write_jar(&jar_path, &entry_refs);

        let result = scan(ScanOptions {
            classpath: vec![RelativePath::new(jar_path.to_string_lossy().to_string())],
            environment: EnvironmentConfig::default(),
            spec: ScanSpec::builder().build(),
            fetcher: None::<Arc<dyn classpath_scan::ArchiveFetcher>>,
        })
        .expect("scan must succeed for bench fixtures");

        assert_eq!(result.class_count(), fixture.expected_class_count, "fixture {} indexed unexpected class count", fixture.id);

        group.throughput(Throughput::Elements(fixture.expected_class_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fixture.id), &jar_path, |b, path| {
            b.iter(|| {
                black_box(
                    scan(ScanOptions {
                        classpath: vec![RelativePath::new(path.to_string_lossy().to_string())],
                        environment: EnvironmentConfig::default(),
                        spec: ScanSpec::builder().build(),
                        fetcher: None::<Arc<dyn classpath_scan::ArchiveFetcher>>,
                    })
                    .expect("scan must succeed"),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
