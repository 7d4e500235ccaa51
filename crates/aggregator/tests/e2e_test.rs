//! End-to-end committee tests: real member HTTP servers on loopback, an
//! aggregator reaching them with `HttpMemberClient`, and a `DacClient` on top.

use anytrust_aggregator::{
    create_router, Aggregator, AggregatorConfig, AggregatorError, ClientError, DacClient,
    LocalMemberClient, MemberClient,
};
use anytrust_crypto::{BlsKeyPair, BlsSecretKey};
use anytrust_member::{Member, MemberConfig};
use anytrust_storage::InMemoryStore;
use anytrust_types::{
    AggregateCertificate, BatchResponse, Committee, CommitteeConfig, CommitteeMember, DataHash,
    ErrorResponse, SubmitBatchRequest,
};
use axum::http::StatusCode;
use axum_test::TestServer;
use rand::RngCore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Start a member on an ephemeral loopback port
async fn spawn_member(config: MemberConfig) -> SocketAddr {
    let member = Arc::new(Member::new(config, InMemoryStore::new()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, anytrust_member::create_router(member))
            .await
            .unwrap();
    });
    addr
}

/// An address nothing listens on
async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn spawn_aggregator(aggregator: Aggregator) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(Arc::new(aggregator)))
            .await
            .unwrap();
    });
    addr
}

struct Testnet {
    committee: Committee,
    aggregator: SocketAddr,
}

/// `live` members running, `down` members configured but unreachable
async fn testnet(live: usize, down: usize, assumed_honest: usize) -> Testnet {
    testnet_with_timeout(live, down, assumed_honest, TIMEOUT).await
}

async fn testnet_with_timeout(
    live: usize,
    down: usize,
    assumed_honest: usize,
    member_timeout: Duration,
) -> Testnet {
    let mut members = Vec::new();
    for _ in 0..live {
        let secret = BlsSecretKey::generate(&mut rand::thread_rng());
        let public_key = secret.public_key();
        let addr = spawn_member(MemberConfig::new(secret)).await;
        members.push(CommitteeMember::new(format!("http://{addr}"), public_key));
    }
    for _ in 0..down {
        let public_key = BlsKeyPair::generate(&mut rand::thread_rng()).public_key;
        let addr = dead_address().await;
        members.push(CommitteeMember::new(format!("http://{addr}"), public_key));
    }

    let committee = Committee::new(CommitteeConfig::new(members, assumed_honest)).unwrap();
    let config = AggregatorConfig::new(committee.clone()).with_member_timeout(member_timeout);
    let aggregator = Aggregator::connect(config).unwrap();

    Testnet {
        committee,
        aggregator: spawn_aggregator(aggregator).await,
    }
}

#[tokio::test]
async fn test_committee_certifies_and_serves_blob() {
    let net = testnet(3, 0, 1).await;
    let client = DacClient::for_committee(
        format!("http://{}", net.aggregator),
        &net.committee,
        TIMEOUT,
    )
    .unwrap();

    let blob = b"rollup batch #1".to_vec();
    let batch_ref = client.post_batch(&blob).await.unwrap();

    assert_eq!(batch_ref.data_hash, DataHash::compute(&blob));
    assert_eq!(batch_ref.signers_mask, 0b111);
    assert!(batch_ref.verify(&net.committee.key_set().unwrap()));

    assert_eq!(client.get_batch(&batch_ref).await.unwrap(), blob);
}

#[tokio::test]
async fn test_committee_certifies_multi_megabyte_blob() {
    let net = testnet_with_timeout(3, 0, 1, Duration::from_secs(30)).await;
    let client = DacClient::for_committee(
        format!("http://{}", net.aggregator),
        &net.committee,
        Duration::from_secs(60),
    )
    .unwrap();

    // Hex on the wire doubles this past axum's default 2 MB body limit
    let mut blob = vec![0u8; 3 * 1024 * 1024];
    rand::thread_rng().fill_bytes(&mut blob);

    let batch_ref = client.post_batch(&blob).await.unwrap();
    assert_eq!(batch_ref.signers_mask, 0b111);
    assert_eq!(client.get_batch(&batch_ref).await.unwrap(), blob);
}

#[tokio::test]
async fn test_certificate_json_from_aggregator() {
    let net = testnet(3, 0, 1).await;
    let http = reqwest::Client::new();

    let cert: AggregateCertificate = http
        .post(format!("http://{}/batch", net.aggregator))
        .json(&SubmitBatchRequest::new(b"payload".to_vec()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(cert.signer_count(), 3);
    assert_eq!(cert.signatures.len(), 3);
    assert!(cert.verify());
    for (i, member) in net.committee.members().iter().enumerate() {
        assert_eq!(Some(&cert.public_keys[i]), member.public_key.as_ref());
    }
}

#[tokio::test]
async fn test_member_down_fails_quorum() {
    let net = testnet(2, 1, 1).await;
    let client = DacClient::for_committee(
        format!("http://{}", net.aggregator),
        &net.committee,
        TIMEOUT,
    )
    .unwrap();

    match client.post_batch(b"batch").await {
        Err(ClientError::Api { status, code, .. }) => {
            assert_eq!(status, 503);
            assert_eq!(code, "QUORUM_NOT_MET");
        }
        other => panic!("expected quorum failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_member_down_tolerated_with_lower_threshold() {
    // N = 3, F = 2: Q = 2
    let net = testnet(2, 1, 2).await;
    let client = DacClient::for_committee(
        format!("http://{}", net.aggregator),
        &net.committee,
        TIMEOUT,
    )
    .unwrap();

    let batch_ref = client.post_batch(b"batch").await.unwrap();
    assert_eq!(batch_ref.signers_mask, 0b011);
    assert_eq!(client.get_batch(&batch_ref).await.unwrap(), b"batch");
}

#[tokio::test]
async fn test_client_rejects_certificate_from_unknown_committee() {
    let net = testnet(3, 0, 1).await;
    let foreign = testnet(3, 0, 1).await;
    let client = DacClient::for_committee(
        format!("http://{}", net.aggregator),
        &foreign.committee,
        TIMEOUT,
    )
    .unwrap();

    assert!(matches!(
        client.post_batch(b"batch").await,
        Err(ClientError::InvalidCertificate(_))
    ));
}

#[tokio::test]
async fn test_unknown_blob_is_not_found() {
    let net = testnet(3, 0, 1).await;
    let client = DacClient::for_committee(
        format!("http://{}", net.aggregator),
        &net.committee,
        TIMEOUT,
    )
    .unwrap();

    match client.get_batch_by_hash(&DataHash::compute(b"never posted")).await {
        Err(ClientError::Api { status, code, .. }) => {
            assert_eq!(status, 404);
            assert_eq!(code, "UNAVAILABLE");
        }
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_health() {
    let net = testnet(3, 0, 1).await;
    let client = DacClient::for_committee(
        format!("http://{}", net.aggregator),
        &net.committee,
        TIMEOUT,
    )
    .unwrap();

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.committee_size, Some(3));
}

fn in_process_server(n: usize, assumed_honest: usize) -> TestServer {
    let mut members = Vec::new();
    let mut clients: Vec<Arc<dyn MemberClient>> = Vec::new();
    for _ in 0..n {
        let secret = BlsSecretKey::generate(&mut rand::thread_rng());
        let member = Arc::new(Member::new(MemberConfig::new(secret), InMemoryStore::new()));
        let client = LocalMemberClient::new(Arc::clone(&member));
        members.push(CommitteeMember::new(
            client.endpoint().to_string(),
            member.public_key().clone(),
        ));
        clients.push(Arc::new(client));
    }

    let committee = Committee::new(CommitteeConfig::new(members, assumed_honest)).unwrap();
    let aggregator = Aggregator::new(AggregatorConfig::new(committee), clients).unwrap();
    TestServer::new(create_router(Arc::new(aggregator))).unwrap()
}

#[tokio::test]
async fn test_router_submit_and_fetch() {
    let server = in_process_server(4, 1);

    let response = server
        .post("/batch")
        .json(&SubmitBatchRequest::new(b"in process".to_vec()))
        .await;
    response.assert_status_ok();
    let cert: AggregateCertificate = response.json();
    assert_eq!(cert.signer_count(), 4);

    let body: BatchResponse = server
        .get(&format!("/batch/{}", cert.data_hash))
        .await
        .json();
    assert_eq!(body.data, b"in process");
}

#[tokio::test]
async fn test_router_error_mapping() {
    let server = in_process_server(2, 1);

    let response = server
        .post("/batch")
        .json(&serde_json::json!({ "data": "" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "INVALID_INPUT");

    server
        .get("/batch/zz")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get(&format!("/batch/{}", DataHash::compute(b"absent")))
        .await;
    response.assert_status_not_found();
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "UNAVAILABLE");
}

#[test]
fn test_error_status_codes() {
    use axum::response::IntoResponse;

    let cases = [
        (
            AggregatorError::QuorumNotMet {
                got: 1,
                threshold: 3,
            },
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            AggregatorError::AllMembersUnreachable { count: 3 },
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            AggregatorError::HashMismatch {
                member: 0,
                expected: DataHash::compute(b"a"),
                got: DataHash::compute(b"b"),
            },
            StatusCode::BAD_GATEWAY,
        ),
        (
            AggregatorError::InvalidAggregate {
                invalid_signers: vec![1],
            },
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (error, status) in cases {
        assert_eq!(error.into_response().status(), status);
    }
}
