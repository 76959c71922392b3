use std::fs;
use std::path::Path;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use dupliscan_cache::HashCache;
use dupliscan_core::{CancelToken, ScanConfig, StatSignature};
use dupliscan_discovery::discover;
use dupliscan_hashing::quick_hash;

fn create_test_tree(root: &Path, depth: usize, breadth: usize) {
    fn recursive_create(parent: &Path, depth: usize, breadth: usize) {
        if depth == 0 {
            return;
        }
        for i in 0..breadth {
            let dir = parent.join(format!("dir_{:03}_{:03}", depth, i));
            fs::create_dir_all(&dir).unwrap();
            for f in 0..3 {
                fs::write(dir.join(format!("file_{f}.bin")), vec![b'x'; 256]).unwrap();
            }
            recursive_create(&dir, depth - 1, breadth / 2);
        }
    }
    recursive_create(root, depth, breadth);
}

/// Discovery throughput over trees of increasing directory/file counts.
fn bench_discovery(c: &mut Criterion) {
    let temp_dir = std::env::temp_dir().join("dupliscan_bench_discovery");
    let _ = fs::remove_dir_all(&temp_dir);
    fs::create_dir_all(&temp_dir).unwrap();

    let mut group = c.benchmark_group("discovery");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    for (depth, breadth) in &[(3, 4), (4, 3)] {
        let root = temp_dir.join(format!("tree_d{depth}_b{breadth}"));
        fs::create_dir_all(&root).unwrap();
        create_test_tree(&root, *depth, *breadth);

        let config = ScanConfig {
            roots: vec![root.clone()],
            min_size_bytes: 0,
            ..ScanConfig::default()
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("d{depth}_b{breadth}")),
            &config,
            |b, config| {
                b.iter(|| {
                    let cancel = CancelToken::new();
                    let (files, stats) = discover(black_box(config), &cancel, None, None);
                    black_box((files.len(), stats.files_scanned))
                })
            },
        );
    }

    group.finish();
    let _ = fs::remove_dir_all(&temp_dir);
}

/// Quick-hash throughput across file sizes that cross the whole-file vs
/// windowed-read boundary (3 MiB).
fn bench_quick_hash(c: &mut Criterion) {
    let temp_dir = std::env::temp_dir().join("dupliscan_bench_quick_hash");
    let _ = fs::remove_dir_all(&temp_dir);
    fs::create_dir_all(&temp_dir).unwrap();

    let mut group = c.benchmark_group("quick_hash");
    group.sample_size(20);

    for size in [64 * 1024, 1024 * 1024, 4 * 1024 * 1024, 16 * 1024 * 1024].iter() {
        let path = temp_dir.join(format!("file_{size}.bin"));
        fs::write(&path, vec![b'x'; *size]).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(format!("{size} bytes")), size, |b, _| {
            b.iter(|| black_box(quick_hash(black_box(&path), *size as u64).unwrap()))
        });
        let _ = fs::remove_file(&path);
    }

    group.finish();
    let _ = fs::remove_dir_all(&temp_dir);
}

/// Hash cache write/read round trip at increasing row counts, exercising the
/// thread-local SQLite connection and WAL commit path.
fn bench_cache_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_operations");

    for rows in [100, 1000, 5000].iter() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("bench_cache.sqlite3")).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(format!("set_quick_{rows}")), rows, |b, rows| {
            b.iter(|| {
                for i in 0..*rows {
                    let path = std::path::PathBuf::from(format!("/bench/path/{i}.bin"));
                    let sig = StatSignature {
                        size: 1024,
                        mtime_ns: 0,
                        dev: 0,
                        inode: i as u64,
                    };
                    cache.set_quick(black_box(&path), &sig, "deadbeef", "md5", 1024);
                }
            })
        });

        group.bench_with_input(BenchmarkId::from_parameter(format!("get_quick_{rows}")), rows, |b, rows| {
            b.iter(|| {
                for i in 0..*rows {
                    let path = std::path::PathBuf::from(format!("/bench/path/{i}.bin"));
                    let sig = StatSignature {
                        size: 1024,
                        mtime_ns: 0,
                        dev: 0,
                        inode: i as u64,
                    };
                    black_box(cache.get_quick(black_box(&path), &sig));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_discovery, bench_quick_hash, bench_cache_operations);
criterion_main!(benches);
