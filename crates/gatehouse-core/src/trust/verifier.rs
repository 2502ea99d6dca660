//! Detached-signature verification for package archives.
//!
//! RSA-PSS over SHA-256. The key set is a disjunction of trust anchors: a
//! single matching key is sufficient. Unsigned packages pass vacuously --
//! free packages may omit a signature, which is a deliberate trust gap the
//! server-side marketplace compensates for.

use crate::trust::TrustedKeys;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::pss::{Signature, VerifyingKey};
use rsa::signature::DigestVerifier;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Validates detached package signatures against the trusted key set.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    keys: TrustedKeys,
}

impl SignatureVerifier {
    /// A verifier bound to an immutable key set.
    pub fn new(keys: TrustedKeys) -> Self {
        Self { keys }
    }

    /// Verify `signature` (base64) over in-memory bytes.
    ///
    /// Failure causes -- missing keys, malformed encoding, no key match --
    /// are distinguishable in the logs but collapse to `false` for the
    /// caller.
    pub fn verify(&self, data: &[u8], signature: Option<&str>) -> bool {
        let mut digest = Sha256::new();
        digest.update(data);
        self.verify_digest(digest, signature)
    }

    /// Verify `signature` (base64) over a file's bytes, streamed.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file cannot be read; a signature that
    /// fails to check is `Ok(false)`.
    pub fn verify_file(&self, path: &Path, signature: Option<&str>) -> std::io::Result<bool> {
        // Skip the read entirely when there is nothing to check.
        if signature.is_none() {
            tracing::debug!("unsigned package accepted at {}", path.display());
            return Ok(true);
        }

        let mut file = std::fs::File::open(path)?;
        let mut digest = Sha256::new();
        std::io::copy(&mut file, &mut digest)?;
        Ok(self.verify_digest(digest, signature))
    }

    fn verify_digest(&self, digest: Sha256, signature: Option<&str>) -> bool {
        let Some(sig_b64) = signature else {
            tracing::debug!("unsigned package accepted");
            return true;
        };

        if self.keys.is_empty() {
            tracing::warn!("signature present but no trusted keys loaded");
            return false;
        }

        let sig_bytes = match BASE64.decode(sig_b64) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!("malformed signature encoding: {err}");
                return false;
            }
        };
        let sig = match Signature::try_from(sig_bytes.as_slice()) {
            Ok(sig) => sig,
            Err(err) => {
                tracing::warn!("malformed signature: {err}");
                return false;
            }
        };

        for key in self.keys.iter() {
            let verifying_key = VerifyingKey::<Sha256>::new(key.clone());
            if verifying_key.verify_digest(digest.clone(), &sig).is_ok() {
                return true;
            }
        }

        tracing::warn!("no trusted key matched the package signature");
        false
    }
}
