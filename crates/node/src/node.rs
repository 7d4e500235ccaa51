//! Node assembly: configuration in, supervised HTTP server out

use crate::config::{AggregatorNodeConfig, MemberNodeConfig, StorageBackend};
use crate::supervisor::NodeSupervisor;
use anyhow::{Context, Result};
use anytrust_aggregator::Aggregator;
use anytrust_member::Member;
use anytrust_storage::{BlobStore, InMemoryStore, RedbStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Start a member node under `supervisor`; returns the bound address
pub async fn start_member(
    config: &MemberNodeConfig,
    supervisor: &NodeSupervisor,
) -> Result<SocketAddr> {
    let member_config = config.to_member_config()?;

    match config.storage {
        StorageBackend::Redb => {
            let store = RedbStore::open(&config.data_dir)
                .await
                .with_context(|| format!("failed to open store at {}", config.data_dir.display()))?;
            info!(path = %store.path().display(), "Using redb store");
            serve_member(Member::new(member_config, store), config.listen, supervisor).await
        }
        StorageBackend::Memory => {
            info!("Using in-memory store; blobs are lost on restart");
            serve_member(
                Member::new(member_config, InMemoryStore::new()),
                config.listen,
                supervisor,
            )
            .await
        }
    }
}

async fn serve_member<S: BlobStore + 'static>(
    member: Member<S>,
    listen: SocketAddr,
    supervisor: &NodeSupervisor,
) -> Result<SocketAddr> {
    let public_key = member.public_key().to_hex();
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    let addr = listener.local_addr()?;

    info!(%addr, %public_key, "Starting member");
    supervisor.serve(
        "member-http",
        listener,
        anytrust_member::create_router(Arc::new(member)),
    );
    Ok(addr)
}

/// Start an aggregator node under `supervisor`; returns the bound address
pub async fn start_aggregator(
    config: &AggregatorNodeConfig,
    supervisor: &NodeSupervisor,
) -> Result<SocketAddr> {
    let aggregator = Aggregator::connect(config.to_aggregator_config()?)?;
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    let addr = listener.local_addr()?;

    info!(
        %addr,
        committee = aggregator.committee().size(),
        quorum = aggregator.committee().quorum_threshold(),
        "Starting aggregator"
    );
    supervisor.serve(
        "aggregator-http",
        listener,
        anytrust_aggregator::create_router(Arc::new(aggregator)),
    );
    Ok(addr)
}
