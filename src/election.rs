//! The election manifest, its internal form used for encryption, and the cryptographic context
//! every proof is bound to
//!
//! Manifest objects are created through constructors that check their invariants (unique ids
//! and sequence orders, sane vote limits, resolvable references), so an invalid manifest never
//! exists in memory. A deserialized manifest is re-checked by [`ElectionDescription::validate`]
//! before [`ElectionBuilder::build`] accepts it.
use crate::{
    error::{Error, Result},
    group::{ElementModP, ElementModQ, G, P, Q, R},
    hash::{hash_elems, CryptoHashable},
};
use crypto_bigint::Encoding;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionType {
    Unknown,
    General,
    Partisan,
    Primary,
    Special,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingUnitType {
    Unknown,
    County,
    Municipality,
    Precinct,
    School,
    State,
    Township,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteVariationType {
    /// Exactly one vote allowed
    OneOfM,
    NOfM,
    Approval,
    Other,
}

impl VoteVariationType {
    fn name(&self) -> &'static str {
        return match self {
            Self::OneOfM => "one_of_m",
            Self::NOfM => "n_of_m",
            Self::Approval => "approval",
            Self::Other => "other",
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeopoliticalUnit {
    pub object_id: String,
    pub name: String,
    pub unit_type: ReportingUnitType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub object_id: String,
    pub name: String,
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub object_id: String,
    pub name: String,
    pub party_id: Option<String>,
    pub is_write_in: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotStyle {
    pub object_id: String,
    pub geopolitical_unit_ids: Vec<String>,
}

/// One option of a contest, pointing at a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDescription {
    pub object_id: String,
    pub candidate_id: String,
    pub sequence_order: u64,
}

impl SelectionDescription {
    pub fn new(object_id: &str, candidate_id: &str, sequence_order: u64) -> Self {
        return Self {
            object_id: object_id.to_string(),
            candidate_id: candidate_id.to_string(),
            sequence_order,
        };
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        return hash_elems(&[&self.object_id, &self.sequence_order, &self.candidate_id]);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDescription {
    pub object_id: String,
    /// The geopolitical unit whose ballot styles carry this contest
    pub electoral_district_id: String,
    pub sequence_order: u64,
    pub vote_variation: VoteVariationType,
    pub number_elected: u64,
    pub votes_allowed: u64,
    pub name: String,
    pub ballot_selections: Vec<SelectionDescription>,
}

impl ContestDescription {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        object_id: &str,
        electoral_district_id: &str,
        sequence_order: u64,
        vote_variation: VoteVariationType,
        number_elected: u64,
        votes_allowed: u64,
        name: &str,
        ballot_selections: Vec<SelectionDescription>,
    ) -> Result<Self> {
        let contest = Self {
            object_id: object_id.to_string(),
            electoral_district_id: electoral_district_id.to_string(),
            sequence_order,
            vote_variation,
            number_elected,
            votes_allowed,
            name: name.to_string(),
            ballot_selections,
        };
        contest.validate()?;
        return Ok(contest);
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| {
            return Err(Error::InvalidConfiguration(format!(
                "contest {}: {reason}",
                self.object_id
            )));
        };
        if self.ballot_selections.is_empty() {
            return invalid("has no selections".to_string());
        }
        if self.number_elected == 0 || self.votes_allowed < self.number_elected {
            return invalid(format!(
                "{} votes allowed for {} elected",
                self.votes_allowed, self.number_elected
            ));
        }
        if self.number_elected > self.ballot_selections.len() as u64 {
            return invalid("more winners than selections".to_string());
        }
        if self.vote_variation == VoteVariationType::OneOfM && self.votes_allowed != 1 {
            return invalid("one-of-m contests allow exactly one vote".to_string());
        }
        let mut ids = BTreeSet::new();
        let mut orders = BTreeSet::new();
        for selection in &self.ballot_selections {
            if !ids.insert(&selection.object_id) {
                return invalid(format!("duplicate selection {}", selection.object_id));
            }
            if !orders.insert(selection.sequence_order) {
                return invalid(format!(
                    "duplicate selection sequence order {}",
                    selection.sequence_order
                ));
            }
        }
        return Ok(());
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        let selection_hashes: Vec<ElementModQ> = self
            .ballot_selections
            .iter()
            .map(|selection| selection.crypto_hash())
            .collect();
        let vote_variation = self.vote_variation.name().to_string();
        let header: [&dyn CryptoHashable; 7] = [
            &self.object_id,
            &self.sequence_order,
            &self.electoral_district_id,
            &vote_variation,
            &self.number_elected,
            &self.votes_allowed,
            &self.name,
        ];
        let mut items = header.to_vec();
        items.extend(selection_hashes.iter().map(|h| h as &dyn CryptoHashable));
        return hash_elems(&items);
    }
}

/// The full manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub election_scope_id: String,
    pub election_type: ElectionType,
    /// ISO 8601
    pub start_date: String,
    pub end_date: String,
    pub geopolitical_units: Vec<GeopoliticalUnit>,
    pub parties: Vec<Party>,
    pub candidates: Vec<Candidate>,
    pub contests: Vec<ContestDescription>,
    pub ballot_styles: Vec<BallotStyle>,
    pub name: Option<String>,
}

impl ElectionDescription {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        election_scope_id: &str,
        election_type: ElectionType,
        start_date: &str,
        end_date: &str,
        geopolitical_units: Vec<GeopoliticalUnit>,
        parties: Vec<Party>,
        candidates: Vec<Candidate>,
        contests: Vec<ContestDescription>,
        ballot_styles: Vec<BallotStyle>,
        name: Option<String>,
    ) -> Result<Self> {
        let description = Self {
            election_scope_id: election_scope_id.to_string(),
            election_type,
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            geopolitical_units,
            parties,
            candidates,
            contests,
            ballot_styles,
            name,
        };
        description.validate()?;
        return Ok(description);
    }

    /// Every id is unique within its kind, every reference resolves, and selection ids are
    /// unique across the whole manifest (tallies are keyed by them).
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| {
            return Err(Error::InvalidConfiguration(format!(
                "election {}: {reason}",
                self.election_scope_id
            )));
        };
        let unit_ids = match unique_ids(self.geopolitical_units.iter().map(|u| &u.object_id)) {
            Ok(ids) => ids,
            Err(duplicate) => return invalid(format!("duplicate geopolitical unit {duplicate}")),
        };
        let party_ids = match unique_ids(self.parties.iter().map(|p| &p.object_id)) {
            Ok(ids) => ids,
            Err(duplicate) => return invalid(format!("duplicate party {duplicate}")),
        };
        let candidate_ids = match unique_ids(self.candidates.iter().map(|c| &c.object_id)) {
            Ok(ids) => ids,
            Err(duplicate) => return invalid(format!("duplicate candidate {duplicate}")),
        };
        if let Err(duplicate) = unique_ids(self.ballot_styles.iter().map(|s| &s.object_id)) {
            return invalid(format!("duplicate ballot style {duplicate}"));
        }
        if let Err(duplicate) = unique_ids(self.contests.iter().map(|c| &c.object_id)) {
            return invalid(format!("duplicate contest {duplicate}"));
        }
        if let Err(duplicate) = unique_ids(
            self.contests
                .iter()
                .flat_map(|c| c.ballot_selections.iter().map(|s| &s.object_id)),
        ) {
            return invalid(format!("duplicate selection {duplicate}"));
        }

        for candidate in &self.candidates {
            if let Some(party_id) = &candidate.party_id {
                if !party_ids.contains(party_id) {
                    return invalid(format!(
                        "candidate {} references unknown party {party_id}",
                        candidate.object_id
                    ));
                }
            }
        }
        for style in &self.ballot_styles {
            for unit in &style.geopolitical_unit_ids {
                if !unit_ids.contains(unit) {
                    return invalid(format!(
                        "ballot style {} references unknown unit {unit}",
                        style.object_id
                    ));
                }
            }
        }
        let mut contest_orders = BTreeSet::new();
        for contest in &self.contests {
            contest.validate()?;
            if !contest_orders.insert(contest.sequence_order) {
                return invalid(format!(
                    "duplicate contest sequence order {}",
                    contest.sequence_order
                ));
            }
            if !unit_ids.contains(&contest.electoral_district_id) {
                return invalid(format!(
                    "contest {} references unknown unit {}",
                    contest.object_id, contest.electoral_district_id
                ));
            }
            for selection in &contest.ballot_selections {
                if !candidate_ids.contains(&selection.candidate_id) {
                    return invalid(format!(
                        "selection {} references unknown candidate {}",
                        selection.object_id, selection.candidate_id
                    ));
                }
            }
        }
        return Ok(());
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        let contest_hashes: Vec<ElementModQ> =
            self.contests.iter().map(|c| c.crypto_hash()).collect();
        let style_hashes: Vec<ElementModQ> = self
            .ballot_styles
            .iter()
            .map(|style| {
                let mut items = vec![&style.object_id as &dyn CryptoHashable];
                items.extend(
                    style
                        .geopolitical_unit_ids
                        .iter()
                        .map(|id| id as &dyn CryptoHashable),
                );
                return hash_elems(&items);
            })
            .collect();
        let unit_ids: Vec<&String> = self
            .geopolitical_units
            .iter()
            .map(|unit| &unit.object_id)
            .collect();
        let candidate_ids: Vec<&String> = self
            .candidates
            .iter()
            .map(|candidate| &candidate.object_id)
            .collect();

        let election_type = format!("{:?}", self.election_type);
        let header: [&dyn CryptoHashable; 4] = [
            &self.election_scope_id,
            &election_type,
            &self.start_date,
            &self.end_date,
        ];
        let mut items = header.to_vec();
        items.extend(unit_ids.iter().map(|id| *id as &dyn CryptoHashable));
        items.extend(candidate_ids.iter().map(|id| *id as &dyn CryptoHashable));
        items.extend(contest_hashes.iter().map(|h| h as &dyn CryptoHashable));
        items.extend(style_hashes.iter().map(|h| h as &dyn CryptoHashable));
        return hash_elems(&items);
    }
}

/// The set of ids, or the first duplicate
fn unique_ids<'a>(
    ids: impl Iterator<Item = &'a String>,
) -> std::result::Result<BTreeSet<&'a String>, &'a String> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(id);
        }
    }
    return Ok(seen);
}

/// A contest together with its placeholder selections. A voter who uses fewer than
/// `votes_allowed` votes has the remainder cast for placeholders, so that the encrypted sum of a
/// contest is always exactly `votes_allowed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDescriptionWithPlaceholders {
    pub description: ContestDescription,
    pub placeholder_selections: Vec<SelectionDescription>,
}

impl ContestDescriptionWithPlaceholders {
    fn new(description: ContestDescription) -> Self {
        let next_order = description
            .ballot_selections
            .iter()
            .map(|selection| selection.sequence_order)
            .max()
            .unwrap_or(0)
            + 1;
        let placeholder_selections = (0..description.votes_allowed)
            .map(|i| {
                let sequence_order = next_order + i;
                return SelectionDescription::new(
                    &format!("{}-{sequence_order}-placeholder", description.object_id),
                    &format!("{}-{sequence_order}-candidate", description.object_id),
                    sequence_order,
                );
            })
            .collect();
        return Self {
            description,
            placeholder_selections,
        };
    }

    pub fn get_object_id(&self) -> &str {
        return &self.description.object_id;
    }

    pub fn is_placeholder(&self, selection_id: &str) -> bool {
        return self
            .placeholder_selections
            .iter()
            .any(|placeholder| placeholder.object_id == selection_id);
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        return self.description.crypto_hash();
    }
}

/// The manifest reduced to what encryption and tallying need
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalElectionDescription {
    pub description_hash: ElementModQ,
    pub geopolitical_units: Vec<GeopoliticalUnit>,
    pub contests: Vec<ContestDescriptionWithPlaceholders>,
    pub ballot_styles: Vec<BallotStyle>,
}

impl InternalElectionDescription {
    pub fn new(description: &ElectionDescription) -> Self {
        let mut contests: Vec<ContestDescriptionWithPlaceholders> = description
            .contests
            .iter()
            .cloned()
            .map(ContestDescriptionWithPlaceholders::new)
            .collect();
        contests.sort_by_key(|contest| contest.description.sequence_order);
        return Self {
            description_hash: description.crypto_hash(),
            geopolitical_units: description.geopolitical_units.clone(),
            contests,
            ballot_styles: description.ballot_styles.clone(),
        };
    }

    pub fn get_ballot_style(&self, ballot_style_id: &str) -> Result<&BallotStyle> {
        return self
            .ballot_styles
            .iter()
            .find(|style| style.object_id == ballot_style_id)
            .ok_or_else(|| {
                Error::BallotStyleMismatch(format!("unknown ballot style {ballot_style_id}"))
            });
    }

    /// The contests that appear on ballots of the given style, in sequence order
    pub fn get_contests_for(
        &self,
        ballot_style_id: &str,
    ) -> Result<Vec<&ContestDescriptionWithPlaceholders>> {
        let style = self.get_ballot_style(ballot_style_id)?;
        return Ok(self
            .contests
            .iter()
            .filter(|contest| {
                style
                    .geopolitical_unit_ids
                    .contains(&contest.description.electoral_district_id)
            })
            .collect());
    }

    pub fn get_contest(&self, contest_id: &str) -> Option<&ContestDescriptionWithPlaceholders> {
        return self
            .contests
            .iter()
            .find(|contest| contest.description.object_id == contest_id);
    }
}

/// The group parameters, published with the election record as base-10 strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConstants {
    pub large_prime: String,
    pub small_prime: String,
    pub cofactor: String,
    pub generator: String,
}

impl Default for ElectionConstants {
    fn default() -> Self {
        let decimal = |bytes: &[u8]| BigUint::from_bytes_be(bytes).to_str_radix(10);
        return Self {
            large_prime: decimal(&P.to_be_bytes()),
            small_prime: decimal(&Q.to_be_bytes()),
            cofactor: decimal(&R.to_be_bytes()),
            generator: decimal(&G.to_be_bytes()),
        };
    }
}

/// Everything a proof is bound to: the guardian setup, the joint key and the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextElectionContext {
    pub number_of_guardians: usize,
    pub quorum: usize,
    pub elgamal_public_key: ElementModP,
    pub description_hash: ElementModQ,
    /// H(P, Q, G, n, k, description hash)
    pub crypto_base_hash: ElementModQ,
    /// H(base hash, joint key)
    pub crypto_extended_base_hash: ElementModQ,
}

pub fn make_ciphertext_election_context(
    number_of_guardians: usize,
    quorum: usize,
    elgamal_public_key: &ElementModP,
    description_hash: &ElementModQ,
) -> CiphertextElectionContext {
    let constants = ElectionConstants::default();
    let crypto_base_hash = hash_elems(&[
        &constants.large_prime,
        &constants.small_prime,
        &constants.generator,
        &(number_of_guardians as u64),
        &(quorum as u64),
        description_hash,
    ]);
    let crypto_extended_base_hash = hash_elems(&[&crypto_base_hash, elgamal_public_key]);
    return CiphertextElectionContext {
        number_of_guardians,
        quorum,
        elgamal_public_key: *elgamal_public_key,
        description_hash: *description_hash,
        crypto_base_hash,
        crypto_extended_base_hash,
    };
}

/// Assembles the internal description and the context once the joint key is known
#[derive(Debug, Clone)]
pub struct ElectionBuilder {
    number_of_guardians: usize,
    quorum: usize,
    description: ElectionDescription,
    elgamal_public_key: Option<ElementModP>,
}

impl ElectionBuilder {
    pub fn new(
        number_of_guardians: usize,
        quorum: usize,
        description: ElectionDescription,
    ) -> Result<Self> {
        if quorum == 0 || quorum > number_of_guardians {
            return Err(Error::InvalidConfiguration(format!(
                "quorum {quorum} must lie in [1, {number_of_guardians}]"
            )));
        }
        description.validate()?;
        return Ok(Self {
            number_of_guardians,
            quorum,
            description,
            elgamal_public_key: None,
        });
    }

    pub fn set_public_key(&mut self, elgamal_public_key: ElementModP) -> &mut Self {
        self.elgamal_public_key = Some(elgamal_public_key);
        return self;
    }

    pub fn build(&self) -> Result<(InternalElectionDescription, CiphertextElectionContext)> {
        let key = self.elgamal_public_key.ok_or_else(|| {
            Error::IncompleteCeremony("the joint public key has not been set".to_string())
        })?;
        if !key.is_valid_residue() {
            return Err(Error::InvalidKey(
                "joint public key is not a member of the group".to_string(),
            ));
        }
        let internal = InternalElectionDescription::new(&self.description);
        let context = make_ciphertext_election_context(
            self.number_of_guardians,
            self.quorum,
            &key,
            &internal.description_hash,
        );
        return Ok((internal, context));
    }
}

/// Summary of the selections on one contest, by id, for quick lookups
pub(crate) fn selection_index(
    contest: &ContestDescriptionWithPlaceholders,
) -> BTreeMap<&str, (&SelectionDescription, bool)> {
    let mut index = BTreeMap::new();
    for selection in &contest.description.ballot_selections {
        index.insert(selection.object_id.as_str(), (selection, false));
    }
    for placeholder in &contest.placeholder_selections {
        index.insert(placeholder.object_id.as_str(), (placeholder, true));
    }
    return index;
}
