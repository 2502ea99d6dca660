//! Trust anchors for package signatures.

use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use std::path::Path;

/// The set of public keys a signature may verify against.
///
/// Loaded once from the key directory at startup and passed into the
/// [`SignatureVerifier`](crate::trust::SignatureVerifier) by value; nothing
/// in the gateway reads keys through ambient state, and the set never
/// changes for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct TrustedKeys {
    keys: Vec<RsaPublicKey>,
}

impl TrustedKeys {
    /// A set holding the given keys.
    pub fn from_keys(keys: Vec<RsaPublicKey>) -> Self {
        Self { keys }
    }

    /// Read every `*.pem` file in `dir` as an RSA public key.
    ///
    /// Files that fail to parse are skipped with a warning; a missing or
    /// unreadable directory yields an empty set. An empty set means any
    /// signed package will fail verification (fail-closed).
    pub fn load(dir: &Path) -> Self {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("key directory {} unreadable: {err}", dir.display());
                return Self::default();
            }
        };

        let mut keys = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "pem") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .ok()
                .and_then(|pem| RsaPublicKey::from_public_key_pem(&pem).ok());
            match parsed {
                Some(key) => keys.push(key),
                None => tracing::warn!("ignoring invalid key file {}", path.display()),
            }
        }

        tracing::debug!("loaded {} trusted key(s) from {}", keys.len(), dir.display());
        Self { keys }
    }

    /// Whether no trust anchors are available.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of loaded trust anchors.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Iterate the anchors in load order.
    pub fn iter(&self) -> impl Iterator<Item = &RsaPublicKey> {
        self.keys.iter()
    }
}
