//! Streaming downloads with SHA-256 computed as bytes arrive.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use gatehouse_schema::Sha256Digest;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Failure modes of a single transfer.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport-level failure: unreachable host, TLS, non-success status.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure while persisting the stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The downloaded bytes do not hash to what the caller expected.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Digest the caller required.
        expected: Sha256Digest,
        /// Digest of the bytes actually received.
        actual: Sha256Digest,
    },
}

/// Stream a URL into `dest`, hashing as bytes arrive.
///
/// Returns the digest of the bytes written. The caller decides what a
/// mismatch means; the file is left in place so failed bytes can be moved
/// to quarantine instead of silently discarded. On a transport error the
/// partial file is removed.
pub async fn fetch_to(
    client: &Client,
    url: &str,
    dest: &Path,
) -> Result<Sha256Digest, DownloadError> {
    let result = stream_to_file(client, url, dest).await;
    if result.is_err() {
        tokio::fs::remove_file(dest).await.ok();
    }
    result
}

async fn stream_to_file(
    client: &Client,
    url: &str,
    dest: &Path,
) -> Result<Sha256Digest, DownloadError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
    }

    file.flush().await?;
    Ok(Sha256Digest::from_bytes(&hasher.finalize()))
}

/// Download to `<dest>.part`, verify against `expected`, and promote to
/// `dest` by rename only on a match. A partial or mismatching temp file is
/// never left at the final location.
pub async fn fetch_verified(
    client: &Client,
    url: &str,
    dest: &Path,
    expected: &Sha256Digest,
) -> Result<(), DownloadError> {
    let tmp = part_path(dest);
    let actual = fetch_to(client, url, &tmp).await?;

    if actual != *expected {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(DownloadError::HashMismatch {
            expected: expected.clone(),
            actual,
        });
    }

    tokio::fs::rename(&tmp, dest).await?;
    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_instead_of_replacing_extension() {
        assert_eq!(
            part_path(Path::new("/builds/b1/Game.exe")),
            Path::new("/builds/b1/Game.exe.part")
        );
    }

    #[tokio::test]
    async fn fetch_to_returns_digest_of_received_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/fog.zip")
            .with_body(b"hello world")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("fog.zip");
        let client = Client::new();

        let digest = fetch_to(&client, &format!("{}/fog.zip", server.url()), &dest)
            .await
            .unwrap();
        assert_eq!(
            digest.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn fetch_to_cleans_up_on_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gone.zip")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.zip");
        let client = Client::new();

        let result = fetch_to(&client, &format!("{}/gone.zip", server.url()), &dest).await;
        assert!(matches!(result, Err(DownloadError::Http(_))));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn fetch_verified_rejects_mismatching_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/tampered.pak")
            .with_body(b"not what you ordered")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tampered.pak");
        let client = Client::new();
        let expected = Sha256Digest::new(
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
        )
        .unwrap();

        let result = fetch_verified(
            &client,
            &format!("{}/tampered.pak", server.url()),
            &dest,
            &expected,
        )
        .await;

        assert!(matches!(result, Err(DownloadError::HashMismatch { .. })));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }
}
