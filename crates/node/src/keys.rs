//! Member key files
//!
//! A key file holds one BLS key pair as hex. Members load the secret half
//! through their config (or `ANYTRUST_BLS_SECRET_KEY`); the public half goes
//! into the aggregator's committee config.

use anyhow::{anyhow, Context, Result};
use anytrust_crypto::{BlsKeyPair, BlsSecretKey};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// BLS key pair as written to disk
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyFile {
    /// Secret key, 32 bytes hex
    pub bls_secret_key_hex: String,
    /// Public key, 48 bytes compressed hex
    pub bls_public_key_hex: String,
}

impl KeyFile {
    /// Fresh random key pair
    pub fn generate() -> Self {
        Self::from_keypair(&BlsKeyPair::generate(&mut rand::thread_rng()))
    }

    /// Encode an existing key pair
    pub fn from_keypair(keypair: &BlsKeyPair) -> Self {
        Self {
            bls_secret_key_hex: hex::encode(keypair.secret_key.to_bytes()),
            bls_public_key_hex: keypair.public_key.to_hex(),
        }
    }

    /// Decode and check that the halves belong together
    pub fn keypair(&self) -> Result<BlsKeyPair> {
        let secret = BlsSecretKey::from_hex(&self.bls_secret_key_hex)
            .map_err(|e| anyhow!("invalid secret key: {e}"))?;
        let keypair = BlsKeyPair::from_secret_key(secret);
        let expected = self
            .bls_public_key_hex
            .strip_prefix("0x")
            .unwrap_or(&self.bls_public_key_hex);
        if keypair.public_key.to_hex() != expected.to_lowercase() {
            anyhow::bail!("public key does not match secret key");
        }
        Ok(keypair)
    }

    /// Write as JSON, refusing to replace an existing file unless `overwrite`
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<()> {
        if path.exists() && !overwrite {
            anyhow::bail!("{} already exists", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Read and check a key file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        file.keypair()?;
        Ok(file)
    }
}

impl std::fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFile")
            .field("bls_public_key_hex", &self.bls_public_key_hex)
            .finish_non_exhaustive()
    }
}
