//! Cryptographic error types

use thiserror::Error;

/// BLS12-381 cryptographic errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlsError {
    /// Invalid secret key bytes
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    /// Invalid public key bytes
    #[error("invalid public key bytes")]
    InvalidPublicKey,

    /// Invalid signature bytes
    #[error("invalid signature bytes")]
    InvalidSignature,

    /// Signature aggregation failed
    #[error("signature aggregation failed")]
    AggregationFailed,

    /// Empty input for aggregation
    #[error("cannot aggregate an empty list")]
    EmptyAggregation,

    /// Hex decoding failed
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    /// Decoded bytes have the wrong length
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Decode a hex string (optionally `0x`-prefixed) into a fixed-size array.
pub fn decode_hex_array<const N: usize>(s: &str) -> Result<[u8; N], BlsError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| BlsError::InvalidHex(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| BlsError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex_array_accepts_prefix() {
        let plain: [u8; 2] = decode_hex_array("abcd").unwrap();
        let prefixed: [u8; 2] = decode_hex_array("0xabcd").unwrap();
        assert_eq!(plain, [0xab, 0xcd]);
        assert_eq!(plain, prefixed);
    }

    #[test]
    fn test_decode_hex_array_wrong_length() {
        let result: Result<[u8; 4], _> = decode_hex_array("abcd");
        assert_eq!(
            result,
            Err(BlsError::InvalidLength {
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn test_decode_hex_array_bad_hex() {
        let result: Result<[u8; 1], _> = decode_hex_array("zz");
        assert!(matches!(result, Err(BlsError::InvalidHex(_))));
    }
}
