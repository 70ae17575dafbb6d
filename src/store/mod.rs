
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use sha1::{Digest, Sha1};
use tracing::debug;

/// Characters preserved in stored filenames; everything else becomes `_`.
const FILENAME_ALLOWED: &str = "-_.() ";

/// Hex length of the content identifier.
const DOCUMENT_ID_LEN: usize = 12;

/// Compute the content identifier for a document: the first 12 hex
/// characters of the SHA-1 digest of its bytes. Identical bytes always map
/// to the same identifier, which makes indexing idempotent.
#[inline]
pub fn document_id(bytes: &[u8]) -> String {
    let digest = Sha1::digest(bytes);
    let mut id = hex::encode(digest);
    id.truncate(DOCUMENT_ID_LEN);
    id
}

/// Replace any character outside the allow-list with an underscore.
#[inline]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || FILENAME_ALLOWED.contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Persist uploaded bytes under a timestamped, sanitized filename.
///
/// The UTC timestamp prefix (down to microseconds) keeps repeated uploads of
/// same-named files from colliding.
#[inline]
pub fn save_upload(uploads_dir: &Path, bytes: &[u8], filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(uploads_dir).with_context(|| {
        format!(
            "Failed to create uploads directory: {}",
            uploads_dir.display()
        )
    })?;

    let safe = sanitize_filename(filename);
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S-%6f");
    let path = uploads_dir.join(format!("{}-{}", timestamp, safe));

    fs::write(&path, bytes)
        .with_context(|| format!("Failed to write upload: {}", path.display()))?;

    debug!("Saved upload ({} bytes) to {}", bytes.len(), path.display());
    Ok(path)
}
