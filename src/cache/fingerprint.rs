use sha2::{Digest, Sha256};

use crate::format::OutputFormat;

/// Deterministic cache key for a resize request.
///
/// The key is the hex SHA-256 of `"{url}_{width}_{height}_{format}"`, so it is
/// stable across restarts and safe to use as a file name. Quality is not part
/// of the key.
pub fn fingerprint(source_url: &str, width: u32, height: u32, format: OutputFormat) -> String {
    let input = format!("{}_{}_{}_{}", source_url, width, height, format.name());
    hex::encode(Sha256::digest(input.as_bytes()))
}
