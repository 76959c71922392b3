use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use rayon::prelude::*;
use tracing::warn;

use dupliscan_cache::HashCache;
use dupliscan_core::{CancelToken, ScanConfig, StatSignature};
use dupliscan_discovery::DiscoveredFile;

use crate::full_hash::full_hash;
use crate::quick_hash::quick_hash;
use crate::types::{DuplicateGroup, HashingEvent, HashingStats};

/// Progress events are throttled to roughly this cadence.
const PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Run the size-bucket -> quick-hash -> (optional) full-hash sieve over
/// `files` and return the surviving duplicate groups.
pub fn run(
    files: &[DiscoveredFile],
    config: &ScanConfig,
    cache: &HashCache,
    cancel: &CancelToken,
    events: Option<&Sender<HashingEvent>>,
) -> (Vec<DuplicateGroup>, HashingStats) {
    let mut stats = HashingStats::default();

    let mut by_size: HashMap<u64, Vec<usize>> = HashMap::new();
    for (i, f) in files.iter().enumerate() {
        by_size.entry(f.size).or_default().push(i);
    }
    let candidate_indices: Vec<usize> = by_size
        .into_values()
        .filter(|v| v.len() >= 2)
        .flatten()
        .collect();
    stats.candidates = candidate_indices.len() as u64;

    if candidate_indices.is_empty() {
        return (Vec::new(), stats);
    }

    let num_workers = if config.max_workers > 0 {
        config.max_workers
    } else {
        dupliscan_core::default_hashing_workers(config.engine)
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build()
        .expect("failed to build hashing thread pool");

    let total = candidate_indices.len() as u64;
    let done = Arc::new(AtomicU64::new(0));
    let warnings = Arc::new(AtomicU64::new(0));
    let cache_hits = Arc::new(AtomicU64::new(0));
    let start = Instant::now();
    let last_emit = Arc::new(Mutex::new(Instant::now() - PROGRESS_MIN_INTERVAL));

    let quick_results: Vec<(usize, Option<String>)> = pool.install(|| {
        candidate_indices
            .par_iter()
            .map(|&idx| {
                if cancel.is_cancelled() {
                    return (idx, None);
                }
                let file = &files[idx];
                let digest = compute_quick_with_cache(file, cache, &warnings, &cache_hits, events);

                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                maybe_emit_progress(n, total, start, &last_emit, &file.path, events);

                (idx, digest)
            })
            .collect()
    });

    stats.hashed = done.load(Ordering::Relaxed);
    stats.warnings = warnings.load(Ordering::Relaxed);
    stats.cache_hits = cache_hits.load(Ordering::Relaxed);

    if cancel.is_cancelled() {
        return (Vec::new(), stats);
    }

    let mut by_quick: HashMap<(u64, String), Vec<usize>> = HashMap::new();
    for (idx, digest) in quick_results {
        if let Some(d) = digest {
            by_quick.entry((files[idx].size, d)).or_default().push(idx);
        }
    }

    let quick_buckets: Vec<((u64, String), Vec<usize>)> = by_quick
        .into_iter()
        .filter(|(_, idxs)| idxs.len() >= 2)
        .collect();

    if !config.full_hash_escalation {
        let groups = quick_buckets
            .into_iter()
            .map(|((size, digest), idxs)| DuplicateGroup {
                digest,
                size,
                paths: idxs.into_iter().map(|i| files[i].path.clone()).collect(),
            })
            .collect();
        return (groups, stats);
    }

    let full_candidate_indices: Vec<usize> = quick_buckets
        .iter()
        .flat_map(|(_, idxs)| idxs.iter().copied())
        .collect();

    let full_results: Vec<(usize, Option<String>)> = pool.install(|| {
        full_candidate_indices
            .par_iter()
            .map(|&idx| {
                if cancel.is_cancelled() {
                    return (idx, None);
                }
                let file = &files[idx];
                (idx, compute_full_with_cache(file, cache, &warnings, events))
            })
            .collect()
    });

    stats.warnings = warnings.load(Ordering::Relaxed);

    if cancel.is_cancelled() {
        return (Vec::new(), stats);
    }

    let mut by_full: HashMap<(u64, String), Vec<usize>> = HashMap::new();
    for (idx, digest) in full_results {
        if let Some(d) = digest {
            by_full.entry((files[idx].size, d)).or_default().push(idx);
        }
    }

    let groups = by_full
        .into_iter()
        .filter(|(_, idxs)| idxs.len() >= 2)
        .map(|((size, digest), idxs)| DuplicateGroup {
            digest,
            size,
            paths: idxs.into_iter().map(|i| files[i].path.clone()).collect(),
        })
        .collect();

    (groups, stats)
}

/// Quick-hash one candidate, consulting and then populating the cache.
/// A stat snapshot that changed between discovery and hashing is retried
/// once; a persistent mismatch yields a warning and a skip.
fn compute_quick_with_cache(
    file: &DiscoveredFile,
    cache: &HashCache,
    warnings: &AtomicU64,
    cache_hits: &AtomicU64,
    events: Option<&Sender<HashingEvent>>,
) -> Option<String> {
    for attempt in 0..2 {
        let sig = match StatSignature::from_path(&file.path) {
            Ok(s) => s,
            Err(e) => {
                warn_file(&file.path, &e.to_string(), warnings, events);
                return None;
            }
        };

        if let Some(cached) = cache.get_quick(&file.path, &sig) {
            cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(cached);
        }

        match quick_hash(&file.path, sig.size) {
            Ok((digest, sampled_bytes)) => match StatSignature::from_path(&file.path) {
                Ok(post_sig) if post_sig == sig => {
                    cache.set_quick(&file.path, &sig, &digest, "md5", sampled_bytes);
                    return Some(digest);
                }
                Ok(_) if attempt == 0 => continue,
                _ => {
                    warn_file(&file.path, "stat signature changed during hashing", warnings, events);
                    return None;
                }
            },
            Err(e) => {
                warn_file(&file.path, &e.to_string(), warnings, events);
                return None;
            }
        }
    }
    None
}

fn compute_full_with_cache(
    file: &DiscoveredFile,
    cache: &HashCache,
    warnings: &AtomicU64,
    events: Option<&Sender<HashingEvent>>,
) -> Option<String> {
    let sig = match StatSignature::from_path(&file.path) {
        Ok(s) => s,
        Err(e) => {
            warn_file(&file.path, &e.to_string(), warnings, events);
            return None;
        }
    };

    if let Some(cached) = cache.get_full(&file.path, &sig) {
        return Some(cached);
    }

    match full_hash(&file.path) {
        Ok(digest) => {
            cache.set_full(&file.path, &sig, &digest, "sha256");
            Some(digest)
        }
        Err(e) => {
            warn_file(&file.path, &e.to_string(), warnings, events);
            None
        }
    }
}

fn warn_file(path: &Path, reason: &str, warnings: &AtomicU64, events: Option<&Sender<HashingEvent>>) {
    warnings.fetch_add(1, Ordering::Relaxed);
    warn!(path = %path.display(), %reason, "hashing warning");
    if let Some(tx) = events {
        let _ = tx.send(HashingEvent::Warning {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }
}

fn maybe_emit_progress(
    done: u64,
    total: u64,
    start: Instant,
    last_emit: &Mutex<Instant>,
    current_path: &Path,
    events: Option<&Sender<HashingEvent>>,
) {
    let Some(tx) = events else { return };
    let Ok(mut last) = last_emit.try_lock() else {
        return;
    };
    let now = Instant::now();
    if done < total && now.duration_since(*last) < PROGRESS_MIN_INTERVAL {
        return;
    }
    *last = now;
    let elapsed = start.elapsed().as_secs_f64().max(0.001);
    let rate = done as f64 / elapsed;
    let _ = tx.send(HashingEvent::Progress {
        done,
        total,
        rate_files_per_second: rate,
        current_path: current_path.to_path_buf(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupliscan_cache::HashCache;

    fn write(dir: &Path, name: &str, content: &[u8]) -> DiscoveredFile {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        let sig = StatSignature::from_metadata(&meta).unwrap();
        DiscoveredFile { path, size: sig.size, mtime_ns: sig.mtime_ns }
    }

    #[test]
    fn duplicate_content_forms_one_group() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("cache.sqlite3")).unwrap();

        let a = write(dir.path(), "a.bin", &[b'x'; 100]);
        let b = write(dir.path(), "b.bin", &[b'x'; 100]);
        let c = write(dir.path(), "c.bin", &[b'y'; 100]);
        let files = vec![a, b, c];

        let config = ScanConfig { min_size_bytes: 0, ..ScanConfig::default() };
        let cancel = CancelToken::new();
        let (groups, stats) = run(&files, &config, &cache, &cancel, None);

        assert_eq!(stats.candidates, 3);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].paths.len(), 2);
        assert_eq!(groups[0].size, 100);
    }

    #[test]
    fn unique_sizes_are_eliminated_before_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("cache.sqlite3")).unwrap();

        let p1 = write(dir.path(), "p1.bin", &[0u8; 1024]);
        let p2 = write(dir.path(), "p2.bin", &[0u8; 1024]);
        let p3 = write(dir.path(), "p3.bin", &[0u8; 1025]);
        let files = vec![p1, p2, p3];

        let config = ScanConfig { min_size_bytes: 0, ..ScanConfig::default() };
        let cancel = CancelToken::new();
        let (groups, stats) = run(&files, &config, &cache, &cancel, None);

        assert_eq!(stats.candidates, 2);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].paths.len(), 2);
    }

    #[test]
    fn full_hash_escalation_still_requires_agreement() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("cache.sqlite3")).unwrap();

        let a = write(dir.path(), "a.bin", &[b'x'; 200]);
        let b = write(dir.path(), "b.bin", &[b'x'; 200]);
        let files = vec![a, b];

        let config = ScanConfig {
            min_size_bytes: 0,
            full_hash_escalation: true,
            ..ScanConfig::default()
        };
        let cancel = CancelToken::new();
        let (groups, _stats) = run(&files, &config, &cache, &cancel, None);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].paths.len(), 2);
    }

    #[test]
    fn warm_cache_second_run_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("cache.sqlite3")).unwrap();

        let a = write(dir.path(), "a.bin", &[b'x'; 100]);
        let b = write(dir.path(), "b.bin", &[b'x'; 100]);
        let files = vec![a, b];
        let config = ScanConfig { min_size_bytes: 0, ..ScanConfig::default() };
        let cancel = CancelToken::new();

        let (_groups, stats1) = run(&files, &config, &cache, &cancel, None);
        assert_eq!(stats1.cache_hits, 0);

        let (_groups, stats2) = run(&files, &config, &cache, &cancel, None);
        assert_eq!(stats2.cache_hits, 2);
    }
}
