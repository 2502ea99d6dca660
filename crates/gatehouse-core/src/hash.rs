//! Streaming SHA-256 over arbitrary byte sources.

use gatehouse_schema::Sha256Digest;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Digest a reader to completion with bounded memory (64 KiB chunks).
pub fn hash_reader<R: Read>(reader: &mut R) -> std::io::Result<Sha256Digest> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Sha256Digest::from_bytes(&hasher.finalize()))
}

/// Digest a file on disk.
pub fn hash_file(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut file = std::fs::File::open(path)?;
    hash_reader(&mut file)
}
