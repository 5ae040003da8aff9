//! Threshold ElGamal election cryptography
//!
//! Guardians jointly generate an election key in a key ceremony, voters' selections are
//! encrypted under that key with zero-knowledge proofs of well-formedness, cast ballots are
//! summed homomorphically, and any quorum of guardians can decrypt the sums. Guardians who are
//! absent at decryption time are compensated for by the others using the key backups exchanged
//! during the ceremony.
pub mod ballot;
pub mod ballot_box;
pub mod decryption;
pub mod decryption_mediator;
pub mod dlog;
pub mod election;
pub mod elgamal;
pub mod encrypt;
pub mod error;
pub mod group;
pub mod guardian;
pub mod hash;
pub mod key_ceremony;
pub mod key_ceremony_mediator;
pub mod polynomial;
pub mod proofs;
pub mod tally;

pub use error::{Error, Result};
