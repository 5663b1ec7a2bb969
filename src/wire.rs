//! Fixed-size byte layouts for every message that crosses a party boundary.
//!
//! Every message's length is a deterministic function of `(party_id,
//! party_count)` alone; a receiving socket decodes purely by length, never
//! by an embedded tag.

use crate::error::ProtocolError;
use crate::field::FieldElement;

const FIELD_WIDTH: usize = 8;

/// Size in bytes of the `Query` a party at position `p` (1-indexed) receives,
/// out of `n` total parties: the running masked accumulator plus the
/// remaining per-party shares still to be stripped by parties `p..n-1`.
pub fn query_size(p: u32, n: u32) -> usize {
    debug_assert!(1 <= p && p <= n);
    FIELD_WIDTH * (1 + (n - p) as usize)
}

/// Size of the `ForwardQuery` party `p` emits: identical to the next party's
/// incoming `Query` size. `forward_query_size(n, n) == 0`: the last party
/// forwards nothing, it resolves the table lookup instead.
pub fn forward_query_size(p: u32, n: u32) -> usize {
    if p == n {
        0
    } else {
        query_size(p + 1, n)
    }
}

/// Size of a `Response`: one field element, constant across every hop.
pub fn forward_response_size() -> usize {
    FIELD_WIDTH
}

/// The hop-1 query a client sends, and every `ForwardQuery` a party sends
/// onward: a running masked accumulator plus the shares not yet stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireQuery {
    pub accumulator: FieldElement,
    pub shares: Vec<FieldElement>,
}

impl WireQuery {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FIELD_WIDTH * (1 + self.shares.len()));
        bytes.extend_from_slice(&self.accumulator.to_be_bytes());
        for share in &self.shares {
            bytes.extend_from_slice(&share.to_be_bytes());
        }
        bytes
    }

    pub fn decode(bytes: &[u8], modulus: u64, expected_len: usize) -> Result<Self, ProtocolError> {
        if bytes.len() != expected_len {
            return Err(ProtocolError::Decoding { expected: expected_len, actual: bytes.len() });
        }
        let mut chunks = bytes.chunks_exact(FIELD_WIDTH);
        let accumulator = read_field(&mut chunks, modulus)?;
        let shares = chunks
            .map(|chunk| {
                let mut arr = [0u8; FIELD_WIDTH];
                arr.copy_from_slice(chunk);
                Ok(FieldElement::from_be_bytes(arr, modulus)?)
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;
        Ok(WireQuery { accumulator, shares })
    }
}

fn read_field<'a>(
    chunks: &mut std::slice::ChunksExact<'a, u8>,
    modulus: u64,
) -> Result<FieldElement, ProtocolError> {
    let chunk = chunks.next().ok_or(ProtocolError::Decoding { expected: FIELD_WIDTH, actual: 0 })?;
    let mut arr = [0u8; FIELD_WIDTH];
    arr.copy_from_slice(chunk);
    Ok(FieldElement::from_be_bytes(arr, modulus)?)
}

/// A single field element traveling the response path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireResponse(pub FieldElement);

impl WireResponse {
    pub fn encode(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    pub fn decode(bytes: &[u8], modulus: u64) -> Result<Self, ProtocolError> {
        if bytes.len() != forward_response_size() {
            return Err(ProtocolError::Decoding { expected: forward_response_size(), actual: bytes.len() });
        }
        let mut arr = [0u8; FIELD_WIDTH];
        arr.copy_from_slice(bytes);
        Ok(WireResponse(FieldElement::from_be_bytes(arr, modulus)?))
    }
}

/// The batch-size-and-nonce announcement that precedes a batch.
///
/// Extends the original's 4-byte size-only layout with an 8-byte nonce: all
/// shards of a party must observe the identical nonce before calling
/// `Shuffler::initialize`, since the nonce seeds their shared permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchAnnounce {
    pub size: u32,
    pub nonce: u64,
}

impl BatchAnnounce {
    pub const WIRE_SIZE: usize = 4 + 8;

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0..4].copy_from_slice(&self.size.to_be_bytes());
        out[4..12].copy_from_slice(&self.nonce.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != Self::WIRE_SIZE {
            return Err(ProtocolError::Decoding { expected: Self::WIRE_SIZE, actual: bytes.len() });
        }
        let mut size_bytes = [0u8; 4];
        size_bytes.copy_from_slice(&bytes[0..4]);
        let mut nonce_bytes = [0u8; 8];
        nonce_bytes.copy_from_slice(&bytes[4..12]);
        Ok(BatchAnnounce { size: u32::from_be_bytes(size_bytes), nonce: u64::from_be_bytes(nonce_bytes) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sizes_match_spec_formulas() {
        let n = 4;
        assert_eq!(query_size(1, n), 8 * n as usize);
        assert_eq!(query_size(n, n), 8);
        assert_eq!(forward_query_size(n, n), 0);
        assert_eq!(forward_query_size(n - 1, n), query_size(n, n));
        assert_eq!(forward_response_size(), 8);
    }

    #[test]
    fn wire_query_round_trips() {
        let modulus = 1_000_003u64;
        let query = WireQuery {
            accumulator: FieldElement::new(42, modulus),
            shares: vec![FieldElement::new(7, modulus), FieldElement::new(9, modulus)],
        };
        let bytes = query.encode();
        let decoded = WireQuery::decode(&bytes, modulus, bytes.len()).unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn wire_query_rejects_wrong_length() {
        let bytes = vec![0u8; 7];
        assert!(WireQuery::decode(&bytes, 11, 8).is_err());
    }

    #[test]
    fn wire_query_rejects_out_of_range_field_element() {
        let modulus = 11u64;
        let bytes = modulus.to_be_bytes();
        assert!(matches!(WireQuery::decode(&bytes, modulus, 8), Err(ProtocolError::CryptoFailure(_))));
    }

    #[test]
    fn batch_announce_round_trips() {
        let announce = BatchAnnounce { size: 16, nonce: 0xfeed_face_u64 };
        let decoded = BatchAnnounce::decode(&announce.encode()).unwrap();
        assert_eq!(decoded, announce);
    }
}
