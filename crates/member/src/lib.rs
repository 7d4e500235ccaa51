//! Anytrust DAC member node.
//!
//! A member hashes each blob it receives, signs the hash with its BLS key,
//! stores the blob and later serves it back by hash. It has no dependency on
//! other members or on the aggregator.

pub mod api;
pub mod config;
pub mod error;
pub mod service;

pub use api::create_router;
pub use config::MemberConfig;
pub use error::{MemberError, Result};
pub use service::Member;
