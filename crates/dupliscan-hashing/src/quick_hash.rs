use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use md5::{Digest, Md5};

/// One sample window: 1 MiB.
const SAMPLE_BYTES: u64 = 1024 * 1024;
/// Files up to this size are hashed in full instead of sampled.
const WHOLE_FILE_THRESHOLD: u64 = 3 * SAMPLE_BYTES;

/// Quick digest for `path`, given its already-known size.
///
/// Files of `size <= 3 MiB` are hashed in full; larger files are sampled at
/// three fixed 1 MiB windows (head, middle, tail) into a single MD5 digest.
/// Returns the lowercase hex digest and the number of content bytes that
/// were actually read (for bookkeeping, not cryptographic security).
pub fn quick_hash(path: &Path, size: u64) -> io::Result<(String, u64)> {
    let mut file = File::open(path)?;

    if size <= WHOLE_FILE_THRESHOLD {
        let mut hasher = Md5::new();
        let mut buf = [0u8; 1024 * 1024];
        let mut read_total = 0u64;
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            read_total += n as u64;
        }
        return Ok((hex(hasher.finalize()), read_total));
    }

    let mut hasher = Md5::new();
    let mut read_total = 0u64;

    read_total += read_window(&mut file, 0, SAMPLE_BYTES, &mut hasher)?;

    let mid_start = (size / 2).saturating_sub(SAMPLE_BYTES / 2);
    read_total += read_window(&mut file, mid_start, SAMPLE_BYTES, &mut hasher)?;

    let tail_start = size.saturating_sub(SAMPLE_BYTES);
    read_total += read_window(&mut file, tail_start, SAMPLE_BYTES, &mut hasher)?;

    Ok((hex(hasher.finalize()), read_total))
}

fn read_window(file: &mut File, offset: u64, len: u64, hasher: &mut Md5) -> io::Result<u64> {
    file.seek(SeekFrom::Start(offset))?;
    let mut remaining = len;
    let mut buf = [0u8; 64 * 1024];
    let mut read_total = 0u64;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        read_total += n as u64;
        remaining -= n as u64;
    }
    Ok(read_total)
}

fn hex(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
}
