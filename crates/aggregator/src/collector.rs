//! Signature collector for submissions
//!
//! Takes the settled member responses for one submission and decides: drop
//! failures, check that every signer attested the locally computed hash,
//! enforce Q = N - F + 1, aggregate, and verify the aggregate.

use crate::error::{AggregatorError, MemberClientError, Result};
use anytrust_metrics::aggregator::AGGREGATOR_MEMBER_FAILURES;
use anytrust_types::{AggregateCertificate, CertificateError, Committee, DataHash, MemberSignature};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of one member call, tagged with the member's committee index
pub type MemberResponse = (usize, std::result::Result<MemberSignature, MemberClientError>);

/// Turns settled member responses into a certificate
pub struct SignatureCollector<'a> {
    committee: &'a Committee,
}

impl<'a> SignatureCollector<'a> {
    /// Create a collector for `committee`
    pub fn new(committee: &'a Committee) -> Self {
        Self { committee }
    }

    /// Decide on a submission of the blob hashing to `data_hash`.
    ///
    /// Order of checks: consistency, then reachability, then quorum, then
    /// aggregate verification.
    pub fn collect(
        &self,
        data_hash: DataHash,
        responses: Vec<MemberResponse>,
    ) -> Result<AggregateCertificate> {
        let successes = self.partition(responses);

        // Every signer must agree with the hash of the blob we sent
        for (index, attestation) in &successes {
            if attestation.data_hash != data_hash {
                warn!(
                    member = index,
                    expected = %data_hash,
                    got = %attestation.data_hash,
                    "Member attested a different hash"
                );
                return Err(AggregatorError::HashMismatch {
                    member: *index,
                    expected: data_hash,
                    got: attestation.data_hash,
                });
            }
        }

        if successes.is_empty() {
            return Err(AggregatorError::AllMembersUnreachable {
                count: self.committee.size(),
            });
        }

        let threshold = self.committee.quorum_threshold();
        if successes.len() < threshold {
            return Err(AggregatorError::QuorumNotMet {
                got: successes.len(),
                threshold,
            });
        }

        let certificate = AggregateCertificate::aggregate(&successes, self.committee.size())
            .map_err(aggregation_failed)?;

        if !certificate.verify() {
            let invalid_signers = certificate.invalid_signers();
            for index in &invalid_signers {
                warn!(
                    member = index,
                    endpoint = self.endpoint(*index),
                    %data_hash,
                    "Member returned an invalid signature"
                );
            }
            return Err(AggregatorError::InvalidAggregate { invalid_signers });
        }

        debug!(
            %data_hash,
            signers = certificate.signer_count(),
            threshold,
            "Aggregate signature verified"
        );

        Ok(certificate)
    }

    /// Keep usable signatures; log and count everything else
    fn partition(&self, responses: Vec<MemberResponse>) -> Vec<(usize, MemberSignature)> {
        let mut successes = Vec::with_capacity(responses.len());
        let mut seen_keys: HashMap<[u8; 48], usize> = HashMap::new();

        for (index, result) in responses {
            let outcome = result.and_then(|attestation| self.check_identity(index, attestation));
            let outcome = outcome.and_then(|attestation| {
                match seen_keys.insert(attestation.public_key.to_bytes(), index) {
                    Some(previous) => Err(MemberClientError::DuplicateIdentity(
                        attestation.public_key,
                        previous,
                    )),
                    None => Ok(attestation),
                }
            });

            match outcome {
                Ok(attestation) => successes.push((index, attestation)),
                Err(e) => {
                    let endpoint = self.endpoint(index);
                    warn!(member = index, endpoint, error = %e, "Member failed to sign");
                    AGGREGATOR_MEMBER_FAILURES
                        .with_label_values(&[endpoint, "sign", e.reason()])
                        .inc();
                }
            }
        }

        successes
    }

    fn check_identity(
        &self,
        index: usize,
        attestation: MemberSignature,
    ) -> std::result::Result<MemberSignature, MemberClientError> {
        match self.committee.member(index).and_then(|m| m.public_key.as_ref()) {
            Some(expected) if *expected != attestation.public_key => {
                Err(MemberClientError::IdentityMismatch {
                    expected: expected.clone(),
                    got: attestation.public_key,
                })
            }
            _ => Ok(attestation),
        }
    }

    fn endpoint(&self, index: usize) -> &str {
        self.committee
            .member(index)
            .map(|m| m.endpoint.as_str())
            .unwrap_or("unknown")
    }
}

/// Hashes and signer indices were checked before aggregating; anything the
/// certificate still rejects is reported without naming a member.
fn aggregation_failed(error: CertificateError) -> AggregatorError {
    warn!(%error, "Signature aggregation failed");
    AggregatorError::InvalidAggregate {
        invalid_signers: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anytrust_crypto::BlsKeyPair;
    use anytrust_types::{CommitteeConfig, CommitteeMember};
    use std::time::Duration;

    struct Fixture {
        keypairs: Vec<BlsKeyPair>,
        committee: Committee,
    }

    fn fixture(n: usize, f: usize) -> Fixture {
        let keypairs: Vec<_> = (0..n)
            .map(|_| BlsKeyPair::generate(&mut rand::thread_rng()))
            .collect();
        let members = keypairs
            .iter()
            .enumerate()
            .map(|(i, kp)| CommitteeMember::new(format!("http://member-{i}"), kp.public_key.clone()))
            .collect();
        let committee = Committee::new(CommitteeConfig::new(members, f)).unwrap();
        Fixture {
            keypairs,
            committee,
        }
    }

    impl Fixture {
        fn honest(&self, index: usize, blob: &[u8]) -> MemberResponse {
            (
                index,
                Ok(MemberSignature::sign(
                    DataHash::compute(blob),
                    &self.keypairs[index],
                )),
            )
        }

        fn down(&self, index: usize) -> MemberResponse {
            (index, Err(MemberClientError::Timeout(Duration::from_secs(5))))
        }
    }

    #[test]
    fn test_full_quorum_produces_certificate() {
        let fx = fixture(4, 1);
        let hash = DataHash::compute(b"blob");
        let responses = (0..4).map(|i| fx.honest(i, b"blob")).collect();

        let cert = SignatureCollector::new(&fx.committee)
            .collect(hash, responses)
            .unwrap();

        assert_eq!(cert.data_hash, hash);
        assert_eq!(cert.signer_count(), 4);
        assert!(cert.verify());
    }

    #[test]
    fn test_one_short_of_quorum() {
        let fx = fixture(4, 1);
        let responses = vec![
            fx.honest(0, b"blob"),
            fx.honest(1, b"blob"),
            fx.down(2),
            fx.honest(3, b"blob"),
        ];

        assert_eq!(
            SignatureCollector::new(&fx.committee).collect(DataHash::compute(b"blob"), responses),
            Err(AggregatorError::QuorumNotMet {
                got: 3,
                threshold: 4
            })
        );
    }

    #[test]
    fn test_lower_threshold_tolerates_failures() {
        let fx = fixture(4, 3);
        let responses = vec![fx.down(0), fx.honest(1, b"blob"), fx.honest(2, b"blob"), fx.down(3)];

        let cert = SignatureCollector::new(&fx.committee)
            .collect(DataHash::compute(b"blob"), responses)
            .unwrap();
        assert_eq!(cert.signer_indices(), vec![1, 2]);
    }

    #[test]
    fn test_all_members_down() {
        let fx = fixture(3, 1);
        let responses = (0..3).map(|i| fx.down(i)).collect();

        assert_eq!(
            SignatureCollector::new(&fx.committee).collect(DataHash::compute(b"blob"), responses),
            Err(AggregatorError::AllMembersUnreachable { count: 3 })
        );
    }

    #[test]
    fn test_diverging_hash_is_mismatch_regardless_of_count() {
        let fx = fixture(4, 4);
        let responses = vec![
            fx.honest(0, b"blob"),
            fx.honest(1, b"blob"),
            fx.honest(2, b"blob"),
            fx.honest(3, b"something else"),
        ];

        assert!(matches!(
            SignatureCollector::new(&fx.committee).collect(DataHash::compute(b"blob"), responses),
            Err(AggregatorError::HashMismatch { member: 3, .. })
        ));
    }

    #[test]
    fn test_single_response_with_wrong_hash_is_mismatch() {
        let fx = fixture(3, 3);
        let responses = vec![fx.down(0), fx.honest(1, b"other"), fx.down(2)];

        assert!(matches!(
            SignatureCollector::new(&fx.committee).collect(DataHash::compute(b"blob"), responses),
            Err(AggregatorError::HashMismatch { member: 1, .. })
        ));
    }

    #[test]
    fn test_aggregation_failure_names_no_member() {
        let error = CertificateError::HashMismatch {
            expected: DataHash::compute(b"blob"),
            got: DataHash::compute(b"other"),
        };
        assert_eq!(
            aggregation_failed(error),
            AggregatorError::InvalidAggregate {
                invalid_signers: Vec::new()
            }
        );
        assert_eq!(
            aggregation_failed(CertificateError::Empty),
            AggregatorError::InvalidAggregate {
                invalid_signers: Vec::new()
            }
        );
    }

    #[test]
    fn test_invalid_signature_reported() {
        let fx = fixture(3, 1);
        let hash = DataHash::compute(b"blob");
        let mut forged = MemberSignature::sign(hash, &fx.keypairs[2]);
        forged.signature = fx.keypairs[2].sign_attestation(b"not the hash");

        let responses = vec![fx.honest(0, b"blob"), fx.honest(1, b"blob"), (2, Ok(forged))];

        assert_eq!(
            SignatureCollector::new(&fx.committee).collect(hash, responses),
            Err(AggregatorError::InvalidAggregate {
                invalid_signers: vec![2]
            })
        );
    }

    #[test]
    fn test_identity_mismatch_counts_as_failure() {
        let fx = fixture(3, 1);
        let impostor = BlsKeyPair::generate(&mut rand::thread_rng());
        let hash = DataHash::compute(b"blob");

        let responses = vec![
            fx.honest(0, b"blob"),
            fx.honest(1, b"blob"),
            (2, Ok(MemberSignature::sign(hash, &impostor))),
        ];

        assert_eq!(
            SignatureCollector::new(&fx.committee).collect(hash, responses),
            Err(AggregatorError::QuorumNotMet {
                got: 2,
                threshold: 3
            })
        );
    }

    #[test]
    fn test_unkeyed_members_cannot_reuse_an_identity() {
        let keypair = BlsKeyPair::generate(&mut rand::thread_rng());
        let members = vec![
            CommitteeMember::unkeyed("http://a"),
            CommitteeMember::unkeyed("http://b"),
        ];
        let committee = Committee::new(CommitteeConfig::new(members, 1)).unwrap();
        let hash = DataHash::compute(b"blob");

        let responses = vec![
            (0, Ok(MemberSignature::sign(hash, &keypair))),
            (1, Ok(MemberSignature::sign(hash, &keypair))),
        ];

        assert_eq!(
            SignatureCollector::new(&committee).collect(hash, responses),
            Err(AggregatorError::QuorumNotMet {
                got: 1,
                threshold: 2
            })
        );
    }
}
