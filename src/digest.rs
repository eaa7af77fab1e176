//! Content addressing.
//!
//! The SHA-256 hex digest of a stored file is its identity key in the
//! metadata store, so the algorithm and encoding here must never change for
//! an existing vault.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Bytes read per step when hashing a file.
pub const CHUNK_SIZE: usize = 1024 * 1024;
/// Length of a hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Hashes a file in bounded chunks without loading it into memory.
pub async fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// True if `s` looks like a digest produced by this module.
pub fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
