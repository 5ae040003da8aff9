//! Exponential ElGamal over the fixed group
//!
//! A message `m` is encrypted under public key `K` with nonce `r` as `(G^r, K^r * G^m)`.
//! Multiplying two ciphertexts component-wise yields an encryption of the sum of their
//! messages, which is what the tally relies on.
use crate::{
    dlog::DiscreteLogTable,
    error::{Error, Result},
    group::{
        div_p, g_pow_p, mult_p, pow_p, rand_range_q, ElementModP, ElementModQ, ONE_MOD_P,
        TWO_MOD_Q,
    },
    hash::hash_elems,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A secret exponent together with its public key `G^secret`
#[derive(Clone, PartialEq, Eq)]
pub struct ElGamalKeyPair {
    secret_key: ElementModQ,
    public_key: ElementModP,
}

impl ElGamalKeyPair {
    pub fn get_secret_key(&self) -> &ElementModQ {
        return &self.secret_key;
    }

    pub fn get_public_key(&self) -> &ElementModP {
        return &self.public_key;
    }
}

impl fmt::Debug for ElGamalKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f
            .debug_struct("ElGamalKeyPair")
            .field("secret_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish();
    }
}

/// Derive the key pair for a secret. Secrets below two are rejected: `0` and `1` give public
/// keys that reveal the secret at a glance.
pub fn elgamal_keypair_from_secret(secret: &ElementModQ) -> Result<ElGamalKeyPair> {
    if *secret < TWO_MOD_Q {
        return Err(Error::InvalidKey(
            "ElGamal secret must lie in [2, Q)".to_string(),
        ));
    }
    return Ok(ElGamalKeyPair {
        secret_key: *secret,
        public_key: g_pow_p(secret),
    });
}

/// A fresh key pair with a uniformly random secret in `[2, Q)`
pub fn elgamal_keypair_random<R: CryptoRng + RngCore>(rng: &mut R) -> ElGamalKeyPair {
    let secret_key = rand_range_q(&TWO_MOD_Q, rng);
    return ElGamalKeyPair {
        secret_key,
        public_key: g_pow_p(&secret_key),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElGamalCiphertext {
    /// `G^nonce`
    pub pad: ElementModP,
    /// `K^nonce * G^message`
    pub data: ElementModP,
}

impl ElGamalCiphertext {
    pub fn new(pad: ElementModP, data: ElementModP) -> Self {
        return Self { pad, data };
    }

    /// `(1, 1)`: the encryption of zero with nonce zero, neutral under [`homomorphic_add`]
    pub fn identity() -> Self {
        return Self::new(ONE_MOD_P, ONE_MOD_P);
    }

    /// Both components belong to the order-`Q` subgroup
    pub fn is_valid_residue(&self) -> bool {
        return self.pad.is_valid_residue() && self.data.is_valid_residue();
    }

    /// `pad ^ secret`: one guardian's share of the blinding factor
    pub fn partial_decrypt(&self, secret_key: &ElementModQ) -> ElementModP {
        return pow_p(&self.pad, secret_key);
    }

    /// Remove a fully reconstructed blinding factor `K^nonce` and look the count up
    pub fn decrypt_known_product(
        &self,
        product: &ElementModP,
        dlog: &DiscreteLogTable,
    ) -> Result<u64> {
        let message = div_p(&self.data, product)?;
        return dlog.find(&message).ok_or_else(|| {
            Error::Decryption(format!(
                "plaintext is not a count in [0, {}]",
                dlog.get_bound()
            ))
        });
    }

    /// Decrypt with the full secret key: `data * (pad^secret)^-1`
    pub fn decrypt_known_secret(
        &self,
        secret_key: &ElementModQ,
        dlog: &DiscreteLogTable,
    ) -> Result<u64> {
        return self.decrypt_known_product(&self.partial_decrypt(secret_key), dlog);
    }

    /// Decrypt with the encryption nonce instead of the secret key
    pub fn decrypt_known_nonce(
        &self,
        public_key: &ElementModP,
        nonce: &ElementModQ,
        dlog: &DiscreteLogTable,
    ) -> Result<u64> {
        return self.decrypt_known_product(&pow_p(public_key, nonce), dlog);
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        return hash_elems(&[&self.pad, &self.data]);
    }
}

/// Encrypt `message` under `public_key`. The nonce must be fresh for every call; it may not be
/// zero, which would leave `G^message` in the clear.
pub fn elgamal_encrypt(
    message: u64,
    nonce: &ElementModQ,
    public_key: &ElementModP,
) -> Result<ElGamalCiphertext> {
    if nonce.is_zero() {
        return Err(Error::InvalidKey(
            "encryption nonce must be non-zero".to_string(),
        ));
    }
    let pad = g_pow_p(nonce);
    let data = mult_p(
        &pow_p(public_key, nonce),
        &g_pow_p(&ElementModQ::from_u64(message)),
    );
    return Ok(ElGamalCiphertext::new(pad, data));
}

/// Component-wise product: an encryption of `m1 + m2`
pub fn homomorphic_add(a: &ElGamalCiphertext, b: &ElGamalCiphertext) -> ElGamalCiphertext {
    return ElGamalCiphertext::new(mult_p(&a.pad, &b.pad), mult_p(&a.data, &b.data));
}

/// Homomorphic sum of any number of ciphertexts; the empty sum is [`ElGamalCiphertext::identity`]
pub fn elgamal_add<'a>(
    ciphertexts: impl IntoIterator<Item = &'a ElGamalCiphertext>,
) -> ElGamalCiphertext {
    return ciphertexts
        .into_iter()
        .fold(ElGamalCiphertext::identity(), |acc, c| homomorphic_add(&acc, c));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{rand_q, ONE_MOD_Q, ZERO_MOD_Q};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_keypair_from_secret_bounds() {
        assert!(elgamal_keypair_from_secret(&ZERO_MOD_Q).is_err());
        assert!(elgamal_keypair_from_secret(&ONE_MOD_Q).is_err());
        let keypair = elgamal_keypair_from_secret(&TWO_MOD_Q).unwrap();
        assert_eq!(*keypair.get_public_key(), g_pow_p(&TWO_MOD_Q));
    }

    #[test]
    fn test_encrypt_decrypt_zero_and_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let dlog = DiscreteLogTable::new(4);
        let keypair = elgamal_keypair_random(&mut rng);
        for message in [0u64, 1] {
            let nonce = rand_q(&mut rng);
            let ciphertext = elgamal_encrypt(message, &nonce, keypair.get_public_key()).unwrap();
            assert!(ciphertext.is_valid_residue());
            assert_eq!(
                ciphertext
                    .decrypt_known_secret(keypair.get_secret_key(), &dlog)
                    .unwrap(),
                message
            );
            assert_eq!(
                ciphertext
                    .decrypt_known_nonce(keypair.get_public_key(), &nonce, &dlog)
                    .unwrap(),
                message
            );
        }
    }

    #[test]
    fn test_zero_nonce_is_rejected() {
        let keypair = elgamal_keypair_from_secret(&TWO_MOD_Q).unwrap();
        assert!(elgamal_encrypt(1, &ZERO_MOD_Q, keypair.get_public_key()).is_err());
    }

    #[test]
    fn test_homomorphic_add() {
        let mut rng = StdRng::seed_from_u64(2);
        let dlog = DiscreteLogTable::new(10);
        let keypair = elgamal_keypair_random(&mut rng);
        let pk = keypair.get_public_key();
        let c1 = elgamal_encrypt(1, &rand_q(&mut rng), pk).unwrap();
        let c2 = elgamal_encrypt(1, &rand_q(&mut rng), pk).unwrap();
        let c3 = elgamal_encrypt(0, &rand_q(&mut rng), pk).unwrap();
        let sum = homomorphic_add(&c1, &c2);
        assert_eq!(sum.decrypt_known_secret(keypair.get_secret_key(), &dlog).unwrap(), 2);
        let total = elgamal_add([&c1, &c2, &c3]);
        assert_eq!(total, homomorphic_add(&sum, &c3));
        assert_eq!(elgamal_add([]), ElGamalCiphertext::identity());
    }

    #[test]
    fn test_count_outside_table_is_a_decryption_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let keypair = elgamal_keypair_random(&mut rng);
        let ciphertext = elgamal_encrypt(7, &rand_q(&mut rng), keypair.get_public_key()).unwrap();
        let result =
            ciphertext.decrypt_known_secret(keypair.get_secret_key(), &DiscreteLogTable::new(5));
        assert!(matches!(result, Err(Error::Decryption(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let keypair = elgamal_keypair_from_secret(&ElementModQ::from_u64(123456789)).unwrap();
        assert!(!format!("{keypair:?}").contains("123456789"));
    }
}
