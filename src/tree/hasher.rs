//! Content identity computation for files

use crate::error::ResolveError;
use crate::session::Resolution;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default read buffer for hashing
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Compute the content identity of the file at `path`.
///
/// The cancel flag is checked between buffer reads; a raised flag aborts with
/// [`ResolveError::Canceled`].
pub fn compute_content_id(
    path: &Path,
    buffer_size: usize,
    cancel: &AtomicBool,
) -> Result<Resolution, ResolveError> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(ResolveError::NotAFile);
    }

    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut size = 0u64;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(ResolveError::Canceled);
        }
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }

    Ok(Resolution {
        identity: hasher.finalize().into(),
        size,
    })
}
