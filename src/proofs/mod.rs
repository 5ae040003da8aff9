//! Non-interactive zero-knowledge proofs used by guardians and by the ballot encryptor. All of
//! them are sigma protocols (commit, challenge, response) made non-interactive with Fiat-Shamir.

pub mod chaum_pedersen; // ballot validity and correct partial decryption
pub mod schnorr; // knowledge of a secret exponent

pub use chaum_pedersen::{
    ChaumPedersenProof, ConstantChaumPedersenProof, DisjunctiveChaumPedersenProof,
};
pub use schnorr::SchnorrProof;
