use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, warn};

use dupliscan_core::{CancelToken, ScanConfig, StatSignature};

use crate::dir_cache::DirSignatureCache;
use crate::filter::DiscoveryFilter;
use crate::types::{DiscoveredFile, DiscoveryEvent, DiscoveryStats};

/// Entries are checked against the cancellation flag at least this often,
/// independent of directory boundaries.
const CANCEL_CHECK_INTERVAL: usize = 64;
/// Progress is emitted after this many newly discovered files.
const PROGRESS_EMIT_INTERVAL: u64 = 5_000;
/// Per-worker buffer of discovered files flushed into the shared result set.
const FLUSH_THRESHOLD: usize = 500;

struct SharedState {
    work_queue: Mutex<VecDeque<PathBuf>>,
    in_progress: Mutex<HashSet<PathBuf>>,
    results: Mutex<Vec<DiscoveredFile>>,
    stats: Mutex<DiscoveryStats>,
    files_since_last_emit: Mutex<u64>,
}

/// Walk `config.roots` in parallel, applying discovery's filter predicates,
/// and return every file that survives them.
///
/// A root that is itself a regular file (not a directory) is reported
/// directly, bypassing traversal entirely, matching the single-file-root
/// behavior of earlier discovery implementations this one replaces.
pub fn discover(
    config: &ScanConfig,
    cancel: &CancelToken,
    dir_cache: Option<&DirSignatureCache>,
    events: Option<&Sender<DiscoveryEvent>>,
) -> (Vec<DiscoveredFile>, DiscoveryStats) {
    let filter = DiscoveryFilter::from_config(config);
    let mut initial_dirs = Vec::new();
    let mut single_file_results = Vec::new();
    let mut stats = DiscoveryStats::default();

    for root in &config.roots {
        let meta = match fs::symlink_metadata(root) {
            Ok(m) => m,
            Err(e) => {
                emit_warning(events, root.clone(), e.to_string());
                stats.warnings += 1;
                continue;
            }
        };
        if meta.is_file() {
            if let Ok(sig) = StatSignature::from_metadata(&meta) {
                if filter.passes_size(sig.size) {
                    single_file_results.push(DiscoveredFile {
                        path: root.clone(),
                        size: sig.size,
                        mtime_ns: sig.mtime_ns,
                    });
                }
            }
            continue;
        }
        if meta.is_dir() {
            initial_dirs.push(root.clone());
        }
    }

    if initial_dirs.is_empty() {
        stats.files_scanned = single_file_results.len() as u64;
        return (single_file_results, stats);
    }

    let num_workers = if config.max_workers > 0 {
        config.max_workers
    } else {
        dupliscan_core::default_discovery_workers()
    };

    let mut work_queue = VecDeque::new();
    work_queue.extend(initial_dirs);

    let shared = Arc::new(SharedState {
        work_queue: Mutex::new(work_queue),
        in_progress: Mutex::new(HashSet::new()),
        results: Mutex::new(single_file_results),
        stats: Mutex::new(stats),
        files_since_last_emit: Mutex::new(0),
    });

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build()
        .expect("failed to build discovery thread pool");

    pool.in_place_scope(|scope| {
        for _ in 0..num_workers {
            let shared = Arc::clone(&shared);
            let filter_ref = &filter;
            let cancel_ref = cancel.clone();
            let dir_cache_ref = dir_cache;
            scope.spawn(move |_| {
                worker_loop(&shared, filter_ref, &cancel_ref, dir_cache_ref, events);
            });
        }
    });

    let results = Arc::try_unwrap(shared)
        .map(|s| (s.results.into_inner(), s.stats.into_inner()))
        .unwrap_or_else(|arc| (arc.results.lock().clone(), *arc.stats.lock()));

    results
}

fn emit_warning(events: Option<&Sender<DiscoveryEvent>>, path: PathBuf, reason: String) {
    warn!(path = %path.display(), %reason, "discovery warning");
    if let Some(tx) = events {
        let _ = tx.send(DiscoveryEvent::Warning { path, reason });
    }
}

fn worker_loop(
    shared: &SharedState,
    filter: &DiscoveryFilter,
    cancel: &CancelToken,
    dir_cache: Option<&DirSignatureCache>,
    events: Option<&Sender<DiscoveryEvent>>,
) {
    let mut file_buffer: Vec<DiscoveredFile> = Vec::with_capacity(FLUSH_THRESHOLD);
    let mut local_warnings: u64 = 0;
    let mut local_dirs_scanned: u64 = 0;
    let mut local_dirs_skipped_cache: u64 = 0;
    let mut entries_since_cancel_check: usize = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let batch: Vec<PathBuf> = {
            let mut queue = shared.work_queue.lock();
            let mut batch = Vec::new();
            for _ in 0..10 {
                match queue.pop_front() {
                    Some(p) => batch.push(p),
                    None => break,
                }
            }
            batch
        };

        if batch.is_empty() {
            break;
        }

        for dir in batch {
            if cancel.is_cancelled() {
                break;
            }

            let acquired = {
                let mut in_progress = shared.in_progress.lock();
                in_progress.insert(dir.clone())
            };
            if !acquired {
                continue;
            }

            if let Some(cache) = dir_cache {
                if !cache.has_changed(&dir) {
                    local_dirs_skipped_cache += 1;
                    shared.in_progress.lock().remove(&dir);
                    continue;
                }
            }

            let read_dir = match fs::read_dir(&dir) {
                Ok(rd) => rd,
                Err(e) => {
                    emit_warning(events, dir.clone(), e.to_string());
                    local_warnings += 1;
                    shared.in_progress.lock().remove(&dir);
                    continue;
                }
            };

            let mut subdirs = Vec::new();

            for entry_result in read_dir {
                entries_since_cancel_check += 1;
                if entries_since_cancel_check >= CANCEL_CHECK_INTERVAL {
                    entries_since_cancel_check = 0;
                    if cancel.is_cancelled() {
                        break;
                    }
                }

                let entry = match entry_result {
                    Ok(e) => e,
                    Err(e) => {
                        emit_warning(events, dir.clone(), e.to_string());
                        local_warnings += 1;
                        continue;
                    }
                };

                let name = entry.file_name();
                let name_str = name.to_string_lossy();

                if filter.is_hidden_name(&name_str) {
                    continue;
                }

                let file_type = match entry.file_type() {
                    Ok(ft) => ft,
                    Err(e) => {
                        emit_warning(events, entry.path(), e.to_string());
                        local_warnings += 1;
                        continue;
                    }
                };

                if file_type.is_dir() {
                    if !filter.is_excluded_dir(&name_str) {
                        subdirs.push(entry.path());
                    }
                    continue;
                }

                if file_type.is_symlink() {
                    if !filter.follow_symlinks {
                        continue;
                    }
                    match fs::metadata(entry.path()) {
                        Ok(target_meta) if target_meta.is_dir() => {
                            if !filter.is_excluded_dir(&name_str) {
                                subdirs.push(entry.path());
                            }
                            continue;
                        }
                        Ok(target_meta) if target_meta.is_file() => {
                            process_file(
                                entry.path(),
                                &target_meta,
                                &name_str,
                                filter,
                                &mut file_buffer,
                            );
                        }
                        _ => continue,
                    }
                    continue;
                }

                if !file_type.is_file() {
                    continue;
                }

                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        emit_warning(events, entry.path(), e.to_string());
                        local_warnings += 1;
                        continue;
                    }
                };
                process_file(entry.path(), &meta, &name_str, filter, &mut file_buffer);

                if file_buffer.len() >= FLUSH_THRESHOLD {
                    flush_files(shared, &mut file_buffer, events);
                }
            }

            if !subdirs.is_empty() {
                let mut queue = shared.work_queue.lock();
                queue.extend(subdirs);
            }

            if let Some(cache) = dir_cache {
                if let Some(sig) = DirSignatureCache::compute(&dir) {
                    cache.put(&dir, sig);
                }
            }

            local_dirs_scanned += 1;
            shared.in_progress.lock().remove(&dir);
        }
    }

    flush_files(shared, &mut file_buffer, events);

    let mut stats = shared.stats.lock();
    stats.warnings += local_warnings;
    stats.dirs_scanned += local_dirs_scanned;
    stats.dirs_skipped_cache += local_dirs_skipped_cache;
    debug!(
        dirs_scanned = local_dirs_scanned,
        dirs_skipped_cache = local_dirs_skipped_cache,
        "discovery worker exiting"
    );
}

fn process_file(
    path: PathBuf,
    meta: &fs::Metadata,
    name: &str,
    filter: &DiscoveryFilter,
    buffer: &mut Vec<DiscoveredFile>,
) {
    if !filter.passes_extension(name) {
        return;
    }
    let Ok(sig) = StatSignature::from_metadata(meta) else {
        return;
    };
    if !filter.passes_size(sig.size) {
        return;
    }
    buffer.push(DiscoveredFile {
        path,
        size: sig.size,
        mtime_ns: sig.mtime_ns,
    });
}

fn flush_files(
    shared: &SharedState,
    buffer: &mut Vec<DiscoveredFile>,
    events: Option<&Sender<DiscoveryEvent>>,
) {
    if buffer.is_empty() {
        return;
    }
    let mut results = shared.results.lock();
    results.extend(buffer.drain(..));
    let found_so_far = results.len() as u64;
    drop(results);

    shared.stats.lock().files_scanned = found_so_far;

    let mut since_emit = shared.files_since_last_emit.lock();
    *since_emit += 1;
    if found_so_far >= PROGRESS_EMIT_INTERVAL && *since_emit * FLUSH_THRESHOLD as u64 >= PROGRESS_EMIT_INTERVAL {
        *since_emit = 0;
        if let Some(tx) = events {
            let _ = tx.send(DiscoveryEvent::Progress {
                files_found_so_far: found_so_far,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn make_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.txt")).unwrap().write_all(b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub").join("b.txt")).unwrap().write_all(b"world").unwrap();
        dir
    }

    #[test]
    fn discovers_all_files_under_min_size_zero() {
        let dir = make_tree();
        let config = ScanConfig {
            roots: vec![dir.path().to_path_buf()],
            min_size_bytes: 0,
            ..ScanConfig::default()
        };
        let cancel = CancelToken::new();
        let (files, stats) = discover(&config, &cancel, None, None);
        assert_eq!(files.len(), 2);
        assert_eq!(stats.files_scanned, 2);
    }

    #[test]
    fn hidden_files_are_excluded_by_default() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join(".hidden")).unwrap().write_all(b"x").unwrap();
        File::create(dir.path().join("visible.txt")).unwrap().write_all(b"x").unwrap();

        let config = ScanConfig {
            roots: vec![dir.path().to_path_buf()],
            min_size_bytes: 0,
            ..ScanConfig::default()
        };
        let cancel = CancelToken::new();
        let (files, _) = discover(&config, &cancel, None, None);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path.file_name().unwrap(), "visible.txt");
    }

    #[test]
    fn single_file_root_is_reported_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("only.bin");
        File::create(&file_path).unwrap().write_all(b"hello").unwrap();

        let config = ScanConfig {
            roots: vec![file_path.clone()],
            min_size_bytes: 0,
            ..ScanConfig::default()
        };
        let cancel = CancelToken::new();
        let (files, _) = discover(&config, &cancel, None, None);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, file_path);
    }

    #[test]
    fn cancellation_stops_traversal_early() {
        let dir = make_tree();
        let config = ScanConfig {
            roots: vec![dir.path().to_path_buf()],
            min_size_bytes: 0,
            ..ScanConfig::default()
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        let (files, _) = discover(&config, &cancel, None, None);
        assert!(files.is_empty());
    }

    #[test]
    fn exclude_dirs_skips_matching_subdirectory() {
        let dir = make_tree();
        let mut config = ScanConfig {
            roots: vec![dir.path().to_path_buf()],
            min_size_bytes: 0,
            ..ScanConfig::default()
        };
        config.exclude_dirs.insert("sub".to_string());
        let cancel = CancelToken::new();
        let (files, _) = discover(&config, &cancel, None, None);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path.file_name().unwrap(), "a.txt");
    }
}
