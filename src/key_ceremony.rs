//! Data exchanged during the key ceremony, and the checks that can be run on it without holding
//! any guardian's secrets
use crate::{
    elgamal::{elgamal_keypair_from_secret, ElGamalKeyPair},
    error::{Error, Result},
    group::{mult_all_p, ElementModP, ElementModQ},
    polynomial::{
        compute_polynomial_coordinate, generate_polynomial, verify_polynomial_coordinate,
        ElectionPolynomial,
    },
    proofs::SchnorrProof,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Size of the guardian set and the number of guardians needed to decrypt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyDetails {
    number_of_guardians: usize,
    quorum: usize,
}

impl CeremonyDetails {
    /// Requires `1 <= quorum <= number_of_guardians`
    pub fn new(number_of_guardians: usize, quorum: usize) -> Result<Self> {
        if quorum == 0 || quorum > number_of_guardians {
            return Err(Error::InvalidConfiguration(format!(
                "quorum {quorum} must lie in [1, {number_of_guardians}]"
            )));
        }
        return Ok(Self {
            number_of_guardians,
            quorum,
        });
    }

    pub fn get_number_of_guardians(&self) -> usize {
        return self.number_of_guardians;
    }

    pub fn get_quorum(&self) -> usize {
        return self.quorum;
    }
}

/// What happens to partial key backups once a tally has been decrypted. Backups are only needed
/// to compensate for absent guardians, so after a decryption in which every guardian took part
/// they can be dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupRetention {
    #[default]
    Retain,
    DiscardAfterDirectDecryption,
}

/// Key pair of the guardian-to-guardian encryption scheme. The scheme itself is supplied by the
/// caller; the core only moves the bytes around.
#[derive(Clone, PartialEq, Eq)]
pub struct AuxiliaryKeyPair {
    secret_key: Vec<u8>,
    public_key: Vec<u8>,
}

impl AuxiliaryKeyPair {
    pub fn new(secret_key: Vec<u8>, public_key: Vec<u8>) -> Self {
        return Self {
            secret_key,
            public_key,
        };
    }

    pub fn get_secret_key(&self) -> &[u8] {
        return &self.secret_key;
    }

    pub fn get_public_key(&self) -> &[u8] {
        return &self.public_key;
    }
}

impl fmt::Debug for AuxiliaryKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f
            .debug_struct("AuxiliaryKeyPair")
            .field("secret_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish();
    }
}

/// An auxiliary public key as announced by its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryPublicKey {
    pub owner_id: String,
    pub sequence_order: u64,
    pub key: Vec<u8>,
}

/// Random key material for the identity scheme below
pub fn generate_identity_auxiliary_key_pair<R: CryptoRng + RngCore>(
    rng: &mut R,
) -> AuxiliaryKeyPair {
    let mut key = vec![0u8; 32];
    rng.fill_bytes(&mut key);
    return AuxiliaryKeyPair::new(key.clone(), key);
}

/// Auxiliary "encryption" that returns its input. Only for tests and demos.
pub fn identity_auxiliary_encrypt(
    message: &[u8],
    _recipient: &AuxiliaryPublicKey,
) -> Result<Vec<u8>> {
    return Ok(message.to_vec());
}

/// Inverse of [`identity_auxiliary_encrypt`]
pub fn identity_auxiliary_decrypt(message: &[u8], _keys: &AuxiliaryKeyPair) -> Result<Vec<u8>> {
    return Ok(message.to_vec());
}

/// A guardian's election secret `a_0` with its public key, the proof of `a_0`, and the
/// polynomial the backups are drawn from
#[derive(Debug, Clone)]
pub struct ElectionKeyPair {
    pub(crate) key_pair: ElGamalKeyPair,
    pub(crate) proof: SchnorrProof,
    pub(crate) polynomial: ElectionPolynomial,
}

impl ElectionKeyPair {
    pub fn get_public_key(&self) -> &ElementModP {
        return self.key_pair.get_public_key();
    }

    pub fn get_proof(&self) -> &SchnorrProof {
        return &self.proof;
    }

    pub fn get_polynomial(&self) -> &ElectionPolynomial {
        return &self.polynomial;
    }
}

/// The public half of an [`ElectionKeyPair`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPublicKey {
    pub owner_id: String,
    pub sequence_order: u64,
    pub proof: SchnorrProof,
    pub key: ElementModP,
}

impl ElectionPublicKey {
    /// The proof must be valid and about this key
    pub fn is_valid(&self) -> bool {
        return self.proof.public_key == self.key && self.proof.is_valid();
    }
}

/// Public commitments to every coefficient of a guardian's polynomial, with proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefficientValidationSet {
    pub owner_id: String,
    pub sequence_order: u64,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

impl CoefficientValidationSet {
    pub fn is_valid(&self) -> bool {
        return coefficient_proofs_match(&self.coefficient_commitments, &self.coefficient_proofs);
    }
}

fn coefficient_proofs_match(commitments: &[ElementModP], proofs: &[SchnorrProof]) -> bool {
    return !commitments.is_empty()
        && commitments.len() == proofs.len()
        && commitments
            .iter()
            .zip(proofs)
            .all(|(commitment, proof)| proof.public_key == *commitment && proof.is_valid());
}

/// `f_owner(designated_sequence_order)`, encrypted for the designated guardian
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPartialKeyBackup {
    pub owner_id: String,
    pub owner_sequence_order: u64,
    pub designated_id: String,
    pub designated_sequence_order: u64,
    pub encrypted_value: Vec<u8>,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// Why a backup (or a challenge) did not check out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupFailure {
    /// The auxiliary decryption failed or produced something that is not a Q-element
    Undecryptable(String),
    /// The backup is addressed to someone else
    WrongRecipient,
    /// Commitments and proofs do not match up
    InvalidCoefficientProof,
    /// `G^value` does not equal the product of commitments
    CommitmentMismatch,
    /// The commitments are not the ones the owner announced
    UnannouncedCommitments,
}

/// Outcome of checking one backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPartialKeyVerification {
    pub owner_id: String,
    pub designated_id: String,
    pub verifier_id: String,
    pub verified: bool,
    pub failure: Option<BackupFailure>,
}

impl ElectionPartialKeyVerification {
    fn from_failure(
        owner_id: &str,
        designated_id: &str,
        verifier_id: &str,
        failure: Option<BackupFailure>,
    ) -> Self {
        return Self {
            owner_id: owner_id.to_string(),
            designated_id: designated_id.to_string(),
            verifier_id: verifier_id.to_string(),
            verified: failure.is_none(),
            failure,
        };
    }

    /// The same record, marked as failed
    pub(crate) fn fail(mut self, failure: BackupFailure) -> Self {
        self.verified = false;
        self.failure = Some(failure);
        return self;
    }
}

/// Published by a backup's owner when the designated guardian rejected it: the coordinate in
/// the clear, so that anyone can settle the dispute against the public commitments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPartialKeyChallenge {
    pub owner_id: String,
    pub owner_sequence_order: u64,
    pub designated_id: String,
    pub designated_sequence_order: u64,
    pub value: ElementModQ,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// Draw the polynomial for a guardian with the given quorum and derive its key pair from `a_0`
pub fn generate_election_key_pair<R: CryptoRng + RngCore>(
    quorum: usize,
    rng: &mut R,
) -> Result<ElectionKeyPair> {
    let polynomial = generate_polynomial(quorum, rng);
    let (secret, proof) = match (
        polynomial.coefficients.first(),
        polynomial.coefficient_proofs.first(),
    ) {
        (Some(secret), Some(proof)) => (*secret, proof.clone()),
        _ => {
            return Err(Error::InvalidConfiguration(
                "a polynomial needs at least one coefficient".to_string(),
            ))
        }
    };
    return Ok(ElectionKeyPair {
        key_pair: elgamal_keypair_from_secret(&secret)?,
        proof,
        polynomial,
    });
}

/// Evaluate the owner's polynomial at the designated guardian's sequence order and encrypt the
/// result for them. The value travels as its base-10 string.
pub fn generate_election_partial_key_backup<E>(
    owner_id: &str,
    owner_sequence_order: u64,
    polynomial: &ElectionPolynomial,
    designated: &AuxiliaryPublicKey,
    encrypt: E,
) -> Result<ElectionPartialKeyBackup>
where
    E: Fn(&[u8], &AuxiliaryPublicKey) -> Result<Vec<u8>>,
{
    let value = compute_polynomial_coordinate(designated.sequence_order, polynomial);
    let encrypted_value = encrypt(value.to_decimal_string().as_bytes(), designated)?;
    return Ok(ElectionPartialKeyBackup {
        owner_id: owner_id.to_string(),
        owner_sequence_order,
        designated_id: designated.owner_id.clone(),
        designated_sequence_order: designated.sequence_order,
        encrypted_value,
        coefficient_commitments: polynomial.coefficient_commitments.clone(),
        coefficient_proofs: polynomial.coefficient_proofs.clone(),
    });
}

/// Recover the plaintext coordinate of a backup with the designated guardian's auxiliary keys
pub fn decrypt_backup_value<D>(
    backup: &ElectionPartialKeyBackup,
    auxiliary_keys: &AuxiliaryKeyPair,
    decrypt: D,
) -> std::result::Result<ElementModQ, BackupFailure>
where
    D: Fn(&[u8], &AuxiliaryKeyPair) -> Result<Vec<u8>>,
{
    let bytes = decrypt(&backup.encrypted_value, auxiliary_keys)
        .map_err(|err| BackupFailure::Undecryptable(err.to_string()))?;
    let text = String::from_utf8(bytes)
        .map_err(|err| BackupFailure::Undecryptable(err.to_string()))?;
    return ElementModQ::from_decimal_str(&text)
        .map_err(|err| BackupFailure::Undecryptable(err.to_string()));
}

/// Decrypt a backup and check it against the owner's commitments. A failed check is reported in
/// the returned value, not as an error.
pub fn verify_election_partial_key_backup<D>(
    verifier_id: &str,
    backup: &ElectionPartialKeyBackup,
    auxiliary_keys: &AuxiliaryKeyPair,
    decrypt: D,
) -> ElectionPartialKeyVerification
where
    D: Fn(&[u8], &AuxiliaryKeyPair) -> Result<Vec<u8>>,
{
    let failure = if verifier_id != backup.designated_id {
        Some(BackupFailure::WrongRecipient)
    } else if !coefficient_proofs_match(&backup.coefficient_commitments, &backup.coefficient_proofs)
    {
        Some(BackupFailure::InvalidCoefficientProof)
    } else {
        match decrypt_backup_value(backup, auxiliary_keys, decrypt) {
            Err(failure) => Some(failure),
            Ok(value) => {
                if verify_polynomial_coordinate(
                    &value,
                    backup.designated_sequence_order,
                    &backup.coefficient_commitments,
                ) {
                    None
                } else {
                    Some(BackupFailure::CommitmentMismatch)
                }
            }
        }
    };
    if let Some(failure) = &failure {
        warn!(
            owner = %backup.owner_id,
            designated = %backup.designated_id,
            ?failure,
            "partial key backup rejected"
        );
    }
    return ElectionPartialKeyVerification::from_failure(
        &backup.owner_id,
        &backup.designated_id,
        verifier_id,
        failure,
    );
}

/// Reveal the coordinate of a disputed backup
pub fn generate_election_partial_key_challenge(
    backup: &ElectionPartialKeyBackup,
    polynomial: &ElectionPolynomial,
) -> ElectionPartialKeyChallenge {
    return ElectionPartialKeyChallenge {
        owner_id: backup.owner_id.clone(),
        owner_sequence_order: backup.owner_sequence_order,
        designated_id: backup.designated_id.clone(),
        designated_sequence_order: backup.designated_sequence_order,
        value: compute_polynomial_coordinate(backup.designated_sequence_order, polynomial),
        coefficient_commitments: polynomial.coefficient_commitments.clone(),
        coefficient_proofs: polynomial.coefficient_proofs.clone(),
    };
}

/// Settle a dispute. Anyone can run this; no keys are needed.
pub fn verify_election_partial_key_challenge(
    verifier_id: &str,
    challenge: &ElectionPartialKeyChallenge,
) -> ElectionPartialKeyVerification {
    let failure = if !coefficient_proofs_match(
        &challenge.coefficient_commitments,
        &challenge.coefficient_proofs,
    ) {
        Some(BackupFailure::InvalidCoefficientProof)
    } else if !verify_polynomial_coordinate(
        &challenge.value,
        challenge.designated_sequence_order,
        &challenge.coefficient_commitments,
    ) {
        Some(BackupFailure::CommitmentMismatch)
    } else {
        None
    };
    return ElectionPartialKeyVerification::from_failure(
        &challenge.owner_id,
        &challenge.designated_id,
        verifier_id,
        failure,
    );
}

/// The joint key `prod_i K_i = G^(sum_i a_0,i)`
pub fn combine_election_public_keys<'a>(
    keys: impl IntoIterator<Item = &'a ElectionPublicKey>,
) -> ElementModP {
    return mult_all_p(keys.into_iter().map(|key| &key.key));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{add_q, g_pow_p, mult_p, ONE_MOD_Q};
    use rand::{rngs::StdRng, SeedableRng};
    use rstest::rstest;

    fn recipient(sequence_order: u64) -> AuxiliaryPublicKey {
        return AuxiliaryPublicKey {
            owner_id: format!("guardian_{sequence_order}"),
            sequence_order,
            key: vec![],
        };
    }

    #[rstest]
    #[case(1, 1, true)]
    #[case(5, 3, true)]
    #[case(5, 5, true)]
    #[case(3, 0, false)]
    #[case(3, 4, false)]
    fn test_ceremony_details(
        #[case] number_of_guardians: usize,
        #[case] quorum: usize,
        #[case] ok: bool,
    ) {
        let details = CeremonyDetails::new(number_of_guardians, quorum);
        assert_eq!(details.is_ok(), ok);
        if let Err(err) = details {
            assert!(matches!(err, Error::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn test_election_key_pair() {
        let mut rng = StdRng::seed_from_u64(1);
        let keys = generate_election_key_pair(3, &mut rng).unwrap();
        assert_eq!(keys.get_polynomial().len(), 3);
        assert_eq!(
            *keys.get_public_key(),
            keys.get_polynomial().get_coefficient_commitments()[0]
        );
        assert!(keys.get_proof().is_valid());
        assert!(generate_election_key_pair(0, &mut rng).is_err());
    }

    #[test]
    fn test_backup_round_trip_verifies() {
        let mut rng = StdRng::seed_from_u64(2);
        let keys = generate_election_key_pair(2, &mut rng).unwrap();
        let aux = generate_identity_auxiliary_key_pair(&mut rng);
        let backup = generate_election_partial_key_backup(
            "guardian_1",
            1,
            keys.get_polynomial(),
            &recipient(4),
            identity_auxiliary_encrypt,
        )
        .unwrap();
        let verification = verify_election_partial_key_backup(
            "guardian_4",
            &backup,
            &aux,
            identity_auxiliary_decrypt,
        );
        assert!(verification.verified);
        assert_eq!(verification.failure, None);

        // Verifying again gives the same answer
        let again = verify_election_partial_key_backup(
            "guardian_4",
            &backup,
            &aux,
            identity_auxiliary_decrypt,
        );
        assert_eq!(verification, again);
    }

    #[test]
    fn test_tampered_backups_are_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let keys = generate_election_key_pair(2, &mut rng).unwrap();
        let aux = generate_identity_auxiliary_key_pair(&mut rng);
        let backup = generate_election_partial_key_backup(
            "guardian_1",
            1,
            keys.get_polynomial(),
            &recipient(2),
            identity_auxiliary_encrypt,
        )
        .unwrap();

        let value = decrypt_backup_value(&backup, &aux, identity_auxiliary_decrypt).unwrap();
        let mut shifted = backup.clone();
        shifted.encrypted_value = add_q(&value, &ONE_MOD_Q)
            .to_decimal_string()
            .into_bytes();
        let verification = verify_election_partial_key_backup(
            "guardian_2",
            &shifted,
            &aux,
            identity_auxiliary_decrypt,
        );
        assert_eq!(verification.failure, Some(BackupFailure::CommitmentMismatch));

        let mut garbage = backup.clone();
        garbage.encrypted_value = b"not a number".to_vec();
        let verification = verify_election_partial_key_backup(
            "guardian_2",
            &garbage,
            &aux,
            identity_auxiliary_decrypt,
        );
        assert!(matches!(verification.failure, Some(BackupFailure::Undecryptable(_))));

        let mut forged = backup.clone();
        forged.coefficient_commitments[1] =
            mult_p(&forged.coefficient_commitments[1], &g_pow_p(&ONE_MOD_Q));
        let verification = verify_election_partial_key_backup(
            "guardian_2",
            &forged,
            &aux,
            identity_auxiliary_decrypt,
        );
        assert_eq!(verification.failure, Some(BackupFailure::InvalidCoefficientProof));

        let verification = verify_election_partial_key_backup(
            "guardian_3",
            &backup,
            &aux,
            identity_auxiliary_decrypt,
        );
        assert_eq!(verification.failure, Some(BackupFailure::WrongRecipient));
    }

    #[test]
    fn test_failing_auxiliary_decryption_is_reported() {
        let mut rng = StdRng::seed_from_u64(4);
        let keys = generate_election_key_pair(1, &mut rng).unwrap();
        let aux = generate_identity_auxiliary_key_pair(&mut rng);
        let backup = generate_election_partial_key_backup(
            "guardian_1",
            1,
            keys.get_polynomial(),
            &recipient(2),
            identity_auxiliary_encrypt,
        )
        .unwrap();
        let verification = verify_election_partial_key_backup("guardian_2", &backup, &aux, |_, _| {
            Err(Error::Auxiliary("wrong key".to_string()))
        });
        assert!(!verification.verified);
        assert!(matches!(verification.failure, Some(BackupFailure::Undecryptable(_))));
    }

    #[test]
    fn test_challenge() {
        let mut rng = StdRng::seed_from_u64(5);
        let keys = generate_election_key_pair(2, &mut rng).unwrap();
        let backup = generate_election_partial_key_backup(
            "guardian_1",
            1,
            keys.get_polynomial(),
            &recipient(3),
            |_, _| Ok(b"lost in transit".to_vec()),
        )
        .unwrap();
        let challenge = generate_election_partial_key_challenge(&backup, keys.get_polynomial());
        assert!(verify_election_partial_key_challenge("mediator", &challenge).verified);

        let mut lie = challenge.clone();
        lie.value = add_q(&lie.value, &ONE_MOD_Q);
        let verification = verify_election_partial_key_challenge("mediator", &lie);
        assert_eq!(verification.failure, Some(BackupFailure::CommitmentMismatch));
    }

    #[test]
    fn test_combine_public_keys() {
        let mut rng = StdRng::seed_from_u64(6);
        let shares: Vec<ElectionPublicKey> = (1..=3u64)
            .map(|i| {
                let keys = generate_election_key_pair(2, &mut rng).unwrap();
                return ElectionPublicKey {
                    owner_id: format!("guardian_{i}"),
                    sequence_order: i,
                    proof: keys.get_proof().clone(),
                    key: *keys.get_public_key(),
                };
            })
            .collect();
        assert!(shares.iter().all(|share| share.is_valid()));
        let joint = combine_election_public_keys(&shares);
        assert_eq!(
            joint,
            mult_p(&mult_p(&shares[0].key, &shares[1].key), &shares[2].key)
        );
    }

    #[test]
    fn test_debug_redacts_auxiliary_secret() {
        let keys = AuxiliaryKeyPair::new(b"hunter2".to_vec(), b"public".to_vec());
        assert!(!format!("{keys:?}").contains("104, 117"));
    }
}
