//! Anytrust DAC node
//!
//! Configuration, key files and process plumbing for running a committee
//! member or an aggregator as a standalone `anytrustd` process.

pub mod config;
pub mod keys;
pub mod node;
pub mod supervisor;

pub use config::{
    default_home_dir, generate_testnet_configs, AggregatorNodeConfig, MemberNodeConfig,
    StorageBackend, TestnetConfigs, AGGREGATOR_CONFIG_FILENAME, ANYTRUST_BLS_SECRET_KEY_ENV,
    ANYTRUST_HOME_ENV, DEFAULT_HOME_DIR, DEFAULT_MEMBER_TIMEOUT_MS, MEMBER_CONFIG_FILENAME,
};
pub use keys::KeyFile;
pub use node::{start_aggregator, start_member};
pub use supervisor::{NodeSupervisor, ShutdownError};
