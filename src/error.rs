//! Errors raised by the election core
use thiserror::Error;

/// Every failure the core can report. Protocol-sequencing errors abort the operation that raised
/// them; nothing partially valid (a key, a tally) is ever returned alongside one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{value} is outside the range of integers mod {modulus}")]
    OutOfRange { value: String, modulus: &'static str },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("guardian {0} has already been announced")]
    DuplicateGuardian(String),

    #[error("key ceremony incomplete: {0}")]
    IncompleteCeremony(String),

    #[error("quorum not met for {context}: {available} valid contributions, {quorum} required")]
    QuorumNotMet {
        context: String,
        available: usize,
        quorum: usize,
    },

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("ballot does not match its style: {0}")]
    BallotStyleMismatch(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid ballot: {0}")]
    InvalidBallot(String),

    #[error("invalid election configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown guardian: {0}")]
    UnknownGuardian(String),

    #[error("auxiliary encryption failed: {0}")]
    Auxiliary(String),
}

pub type Result<T> = std::result::Result<T, Error>;
