//! Node configuration
//!
//! Member and aggregator nodes each read one JSON file. The member's BLS
//! secret key may live in the file or come from `ANYTRUST_BLS_SECRET_KEY`,
//! which wins when both are present.

use anyhow::{anyhow, Context, Result};
use anytrust_aggregator::AggregatorConfig;
use anytrust_crypto::{BlsKeyPair, BlsPublicKey, BlsSecretKey};
use anytrust_member::MemberConfig;
use anytrust_types::{Committee, CommitteeConfig, CommitteeMember};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable for home directory override.
///
/// ```bash
/// export ANYTRUST_HOME=/srv/anytrust
/// anytrustd member start
/// ```
pub const ANYTRUST_HOME_ENV: &str = "ANYTRUST_HOME";

/// Environment variable carrying the member's BLS secret key (hex)
pub const ANYTRUST_BLS_SECRET_KEY_ENV: &str = "ANYTRUST_BLS_SECRET_KEY";

/// Default home directory name, relative to the user's home
pub const DEFAULT_HOME_DIR: &str = ".anytrust";

/// Member config filename under `{home}/config`
pub const MEMBER_CONFIG_FILENAME: &str = "member.json";

/// Aggregator config filename under `{home}/config`
pub const AGGREGATOR_CONFIG_FILENAME: &str = "aggregator.json";

/// Default store retry attempts
pub const DEFAULT_STORE_RETRY_ATTEMPTS: u32 = 3;

/// Default pause between store retries
pub const DEFAULT_STORE_RETRY_BACKOFF_MS: u64 = 50;

/// Default deadline for each member call made by the aggregator
pub const DEFAULT_MEMBER_TIMEOUT_MS: u64 = 5000;

/// Resolve the home directory.
///
/// `ANYTRUST_HOME` if set, `~/.anytrust` otherwise.
pub fn default_home_dir() -> PathBuf {
    if let Ok(home) = std::env::var(ANYTRUST_HOME_ENV) {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_HOME_DIR)
}

/// Where a member keeps blobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// redb database under `data_dir`
    #[default]
    Redb,
    /// Process memory; lost on restart
    Memory,
}

fn default_store_retry_attempts() -> u32 {
    DEFAULT_STORE_RETRY_ATTEMPTS
}

fn default_store_retry_backoff_ms() -> u64 {
    DEFAULT_STORE_RETRY_BACKOFF_MS
}

fn default_member_timeout_ms() -> u64 {
    DEFAULT_MEMBER_TIMEOUT_MS
}

/// Member node configuration file
#[derive(Clone, Serialize, Deserialize)]
pub struct MemberNodeConfig {
    /// HTTP listen address
    pub listen: SocketAddr,
    /// Database directory for the redb backend
    pub data_dir: PathBuf,
    /// BLS secret key (hex); `ANYTRUST_BLS_SECRET_KEY` overrides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bls_secret_key_hex: Option<String>,
    /// When set, only submissions signed by this key are accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_public_key_hex: Option<String>,
    /// Store attempts per blob
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,
    /// Pause between store attempts, multiplied by the attempt number
    #[serde(default = "default_store_retry_backoff_ms")]
    pub store_retry_backoff_ms: u64,
    /// Storage backend
    #[serde(default)]
    pub storage: StorageBackend,
}

impl MemberNodeConfig {
    /// Configuration with defaults and no key
    pub fn new(listen: SocketAddr, data_dir: PathBuf) -> Self {
        Self {
            listen,
            data_dir,
            bls_secret_key_hex: None,
            submitter_public_key_hex: None,
            store_retry_attempts: DEFAULT_STORE_RETRY_ATTEMPTS,
            store_retry_backoff_ms: DEFAULT_STORE_RETRY_BACKOFF_MS,
            storage: StorageBackend::Redb,
        }
    }

    /// Resolve the secret key: environment first, then the file
    pub fn secret_key(&self) -> Result<BlsSecretKey> {
        let hex = match std::env::var(ANYTRUST_BLS_SECRET_KEY_ENV) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => self.bls_secret_key_hex.clone().ok_or_else(|| {
                anyhow!(
                    "no BLS secret key: set bls_secret_key_hex or {}",
                    ANYTRUST_BLS_SECRET_KEY_ENV
                )
            })?,
        };
        BlsSecretKey::from_hex(hex.trim()).map_err(|e| anyhow!("invalid BLS secret key: {e}"))
    }

    /// Parsed submitter key, if configured
    pub fn submitter_public_key(&self) -> Result<Option<BlsPublicKey>> {
        self.submitter_public_key_hex
            .as_deref()
            .map(|hex| {
                BlsPublicKey::from_hex(hex).map_err(|e| anyhow!("invalid submitter public key: {e}"))
            })
            .transpose()
    }

    /// Check everything except the secret key, which may arrive later via the environment
    pub fn validate(&self) -> Result<()> {
        if self.store_retry_attempts == 0 {
            anyhow::bail!("store_retry_attempts must be at least 1");
        }
        self.submitter_public_key()?;
        Ok(())
    }

    /// Build the service configuration
    pub fn to_member_config(&self) -> Result<MemberConfig> {
        let mut config = MemberConfig::new(self.secret_key()?).with_store_retry(
            self.store_retry_attempts,
            Duration::from_millis(self.store_retry_backoff_ms),
        );
        if let Some(key) = self.submitter_public_key()? {
            config = config.with_submitter_public_key(key);
        }
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    /// Load and validate config from file
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_json(path)?;
        config
            .validate()
            .with_context(|| format!("invalid member config {}", path.display()))?;
        Ok(config)
    }
}

impl std::fmt::Debug for MemberNodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberNodeConfig")
            .field("listen", &self.listen)
            .field("data_dir", &self.data_dir)
            .field(
                "bls_secret_key_hex",
                &self.bls_secret_key_hex.as_ref().map(|_| "<redacted>"),
            )
            .field("submitter_public_key_hex", &self.submitter_public_key_hex)
            .field("store_retry_attempts", &self.store_retry_attempts)
            .field("store_retry_backoff_ms", &self.store_retry_backoff_ms)
            .field("storage", &self.storage)
            .finish()
    }
}

/// Aggregator node configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorNodeConfig {
    /// HTTP listen address
    pub listen: SocketAddr,
    /// Committee members and assumed honest count
    pub committee: CommitteeConfig,
    /// Deadline for each member call
    #[serde(default = "default_member_timeout_ms")]
    pub member_timeout_ms: u64,
}

impl AggregatorNodeConfig {
    /// Validate the committee
    pub fn validate(&self) -> Result<Committee> {
        if self.member_timeout_ms == 0 {
            anyhow::bail!("member_timeout_ms must be positive");
        }
        Committee::new(self.committee.clone()).map_err(|e| anyhow!("invalid committee: {e}"))
    }

    /// Build the service configuration
    pub fn to_aggregator_config(&self) -> Result<AggregatorConfig> {
        Ok(AggregatorConfig::new(self.validate()?)
            .with_member_timeout(Duration::from_millis(self.member_timeout_ms)))
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    /// Load and validate config from file
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_json(path)?;
        config
            .validate()
            .with_context(|| format!("invalid aggregator config {}", path.display()))?;
        Ok(config)
    }
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}

/// Generated local committee
#[derive(Debug, Clone)]
pub struct TestnetConfigs {
    /// One config per member, in committee order
    pub members: Vec<MemberNodeConfig>,
    /// Aggregator config listing every member
    pub aggregator: AggregatorNodeConfig,
}

/// Generate configs for a local committee of `n` members on loopback.
///
/// The aggregator listens on `starting_port`, member `i` on
/// `starting_port + 1 + i`. Member data lives in `{output}/member{i}/data`.
pub fn generate_testnet_configs(
    n: usize,
    assumed_honest_count: usize,
    output: &Path,
    starting_port: u16,
) -> Result<TestnetConfigs> {
    let last_port = starting_port as usize + n;
    if last_port > u16::MAX as usize {
        anyhow::bail!("{n} members do not fit above port {starting_port}");
    }

    let mut members = Vec::with_capacity(n);
    let mut committee = Vec::with_capacity(n);
    for i in 0..n {
        let keypair = BlsKeyPair::generate(&mut rand::thread_rng());
        let listen: SocketAddr = ([127, 0, 0, 1], starting_port + 1 + i as u16).into();

        let mut member = MemberNodeConfig::new(listen, output.join(format!("member{i}")).join("data"));
        member.bls_secret_key_hex = Some(hex::encode(keypair.secret_key.to_bytes()));

        committee.push(CommitteeMember::new(
            format!("http://{listen}"),
            keypair.public_key.clone(),
        ));
        members.push(member);
    }

    let aggregator = AggregatorNodeConfig {
        listen: ([127, 0, 0, 1], starting_port).into(),
        committee: CommitteeConfig::new(committee, assumed_honest_count),
        member_timeout_ms: DEFAULT_MEMBER_TIMEOUT_MS,
    };
    aggregator.validate()?;

    Ok(TestnetConfigs {
        members,
        aggregator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Serializes tests touching environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn member_config() -> MemberNodeConfig {
        MemberNodeConfig::new("127.0.0.1:9701".parse().unwrap(), PathBuf::from("/tmp/m0"))
    }

    #[test]
    fn test_home_dir_env_override() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var(ANYTRUST_HOME_ENV, "/srv/anytrust");
        let home = default_home_dir();
        env::remove_var(ANYTRUST_HOME_ENV);

        assert_eq!(home, PathBuf::from("/srv/anytrust"));
        assert!(default_home_dir().ends_with(DEFAULT_HOME_DIR));
    }

    #[test]
    fn test_member_defaults_in_serde() {
        let json = r#"{
            "listen": "127.0.0.1:9701",
            "data_dir": "/tmp/m0"
        }"#;

        let config: MemberNodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.store_retry_attempts, 3);
        assert_eq!(config.store_retry_backoff_ms, 50);
        assert_eq!(config.storage, StorageBackend::Redb);
        assert!(config.bls_secret_key_hex.is_none());
    }

    #[test]
    fn test_storage_backend_names() {
        let json = r#"{ "listen": "127.0.0.1:9701", "data_dir": "/x", "storage": "memory" }"#;
        let config: MemberNodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn test_secret_key_env_overrides_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let from_file = BlsSecretKey::generate(&mut rand::thread_rng());
        let from_env = BlsSecretKey::generate(&mut rand::thread_rng());

        let mut config = member_config();
        config.bls_secret_key_hex = Some(hex::encode(from_file.to_bytes()));

        env::remove_var(ANYTRUST_BLS_SECRET_KEY_ENV);
        assert_eq!(
            config.secret_key().unwrap().public_key(),
            from_file.public_key()
        );

        env::set_var(ANYTRUST_BLS_SECRET_KEY_ENV, hex::encode(from_env.to_bytes()));
        let resolved = config.secret_key();
        env::remove_var(ANYTRUST_BLS_SECRET_KEY_ENV);

        assert_eq!(resolved.unwrap().public_key(), from_env.public_key());
    }

    #[test]
    fn test_missing_secret_key() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::remove_var(ANYTRUST_BLS_SECRET_KEY_ENV);

        assert!(member_config().secret_key().is_err());
        assert!(member_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_submitter_key_rejected() {
        let mut config = member_config();
        config.submitter_public_key_hex = Some("00".repeat(48));
        assert!(config.validate().is_err());

        config.submitter_public_key_hex = None;
        config.store_retry_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_key_not_in_debug() {
        let mut config = member_config();
        config.bls_secret_key_hex = Some("ab".repeat(32));
        assert!(!format!("{config:?}").contains(&"ab".repeat(32)));
    }

    #[test]
    fn test_testnet_configs() {
        let dir = tempfile::tempdir().unwrap();
        let net = generate_testnet_configs(4, 1, dir.path(), 9700).unwrap();

        assert_eq!(net.members.len(), 4);
        assert_eq!(net.aggregator.listen.port(), 9700);
        assert_eq!(net.members[3].listen.port(), 9704);
        assert_eq!(net.aggregator.committee.members[3].endpoint, "http://127.0.0.1:9704");

        let committee = net.aggregator.validate().unwrap();
        assert_eq!(committee.quorum_threshold(), 4);

        let _guard = ENV_MUTEX.lock().unwrap();
        env::remove_var(ANYTRUST_BLS_SECRET_KEY_ENV);
        for (member, entry) in net.members.iter().zip(&net.aggregator.committee.members) {
            assert_eq!(
                Some(member.secret_key().unwrap().public_key()),
                entry.public_key
            );
        }
    }

    #[test]
    fn test_testnet_rejects_bad_assumption() {
        let dir = tempfile::tempdir().unwrap();
        assert!(generate_testnet_configs(3, 4, dir.path(), 9700).is_err());
        assert!(generate_testnet_configs(3, 1, dir.path(), u16::MAX - 1).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let net = generate_testnet_configs(2, 1, dir.path(), 9800).unwrap();

        let member_path = dir.path().join("member0").join(MEMBER_CONFIG_FILENAME);
        net.members[0].save(&member_path).unwrap();
        let loaded = MemberNodeConfig::load(&member_path).unwrap();
        assert_eq!(loaded.listen, net.members[0].listen);
        assert_eq!(loaded.bls_secret_key_hex, net.members[0].bls_secret_key_hex);

        let agg_path = dir.path().join(AGGREGATOR_CONFIG_FILENAME);
        net.aggregator.save(&agg_path).unwrap();
        let loaded = AggregatorNodeConfig::load(&agg_path).unwrap();
        assert_eq!(loaded.committee, net.aggregator.committee);
    }

    #[test]
    fn test_aggregator_load_rejects_invalid_committee() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AGGREGATOR_CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"{ "listen": "127.0.0.1:9700", "committee": { "members": [], "assumed_honest_count": 1 } }"#,
        )
        .unwrap();

        assert!(AggregatorNodeConfig::load(&path).is_err());
    }
}
