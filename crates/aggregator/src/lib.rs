//! Anytrust DAC aggregator.
//!
//! The aggregator fans each blob out to every committee member, collects
//! their attestations, and issues an [`AggregateCertificate`] once a quorum
//! of `N - F + 1` members agree on the data hash. Retrieval races all members
//! and returns the first blob whose hash checks out.
//!
//! [`DacClient`] is the rollup-side counterpart: it talks to an aggregator
//! but verifies everything against its own committee key set.
//!
//! [`AggregateCertificate`]: anytrust_types::AggregateCertificate

pub mod api;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod member_client;
pub mod service;

pub use api::create_router;
pub use client::DacClient;
pub use collector::{MemberResponse, SignatureCollector};
pub use config::AggregatorConfig;
pub use error::{AggregatorError, ClientError, MemberClientError, Result};
pub use member_client::{HttpMemberClient, LocalMemberClient, MemberClient};
pub use service::Aggregator;
