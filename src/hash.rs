//! Hashing into Q-space, used for Fiat-Shamir challenges, object hashes and nonce derivation
use crate::group::{ElementModP, ElementModQ, QInt};
use crypto_bigint::Encoding;
use sha3::{Digest, Sha3_256};

/// Anything that can be fed to [`hash_elems`]. The set of implementors is closed and resolved
/// at compile time.
pub trait CryptoHashable {
    fn crypto_hash_bytes(&self) -> Vec<u8>;
}

impl CryptoHashable for ElementModP {
    fn crypto_hash_bytes(&self) -> Vec<u8> {
        return self.to_be_bytes();
    }
}

impl CryptoHashable for ElementModQ {
    fn crypto_hash_bytes(&self) -> Vec<u8> {
        return self.to_be_bytes();
    }
}

impl CryptoHashable for u64 {
    fn crypto_hash_bytes(&self) -> Vec<u8> {
        return self.to_be_bytes().to_vec();
    }
}

impl CryptoHashable for String {
    fn crypto_hash_bytes(&self) -> Vec<u8> {
        return self.as_bytes().to_vec();
    }
}

impl<'a> CryptoHashable for &'a str {
    fn crypto_hash_bytes(&self) -> Vec<u8> {
        return self.as_bytes().to_vec();
    }
}

/// SHA3-256 over the items, each prefixed with its length so that no two different sequences
/// share an encoding, reduced into Q-space
pub fn hash_elems(items: &[&dyn CryptoHashable]) -> ElementModQ {
    let mut hasher = Sha3_256::new();
    for item in items {
        let bytes = item.crypto_hash_bytes();
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    let digest = hasher.finalize();
    return ElementModQ::reduce(&QInt::from_be_slice(&digest));
}

/// A deterministic, unbounded sequence of nonces derived from one secret seed.
///
/// `nonce_i = H(H(seed, header), i)`. Distinct indices give independent-looking nonces, and the
/// whole sequence is reproducible from the seed.
#[derive(Clone)]
pub struct Nonces {
    seed: ElementModQ,
}

impl Nonces {
    pub fn new(seed: &ElementModQ, header: &str) -> Self {
        return Self {
            seed: hash_elems(&[seed, &header]),
        };
    }

    pub fn get(&self, index: u64) -> ElementModQ {
        return hash_elems(&[&self.seed, &index]);
    }

    /// The first `count` nonces
    pub fn take(&self, count: usize) -> Vec<ElementModQ> {
        return (0..count as u64).map(|i| self.get(i)).collect();
    }
}
