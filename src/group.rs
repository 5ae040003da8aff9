//! Arithmetic in the fixed prime-order subgroup of the integers modulo `P`
//!
//! Elements of the large group ("P-space") are integers in `[0, P)`; exponents ("Q-space") are
//! integers in `[0, Q)`. Every value handed out by this module has already been reduced, and
//! every value coming in from the outside is range-checked when it is constructed, so nothing
//! downstream ever sees a silently wrapped number.
use crate::error::{Error, Result};
use crypto_bigint::{
    modular::runtime_mod::{DynResidue, DynResidueParams},
    Encoding, Limb, Random, U256, U4096,
};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// Big integer backing P-space elements
pub type PInt = U4096;
/// Big integer backing Q-space elements
pub type QInt = U256;

pub const P_LIMBS: usize = U4096::LIMBS;
pub const Q_LIMBS: usize = U256::LIMBS;
pub const Q_BITS: usize = U256::BITS;

/// The large prime modulus of the group
pub const P: U4096 = U4096::from_be_hex(concat!(
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffba",
    "fffffffffffffffffffffffffffffffffe0175e30b1b0e791db502994f24dfb1",
));

/// The prime order of the subgroup generated by `G`; `Q = 2^256 - 189`
pub const Q: U256 = U256::from_be_hex(concat!(
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff43",
));

/// The cofactor `R = (P - 1) / Q`
pub const R: U4096 = U4096::from_be_hex(concat!(
    "0000000000000000000000000000000000000000000000000000000000000001",
    "00000000000000000000000000000000000000000000000000000000000000bd",
    "0000000000000000000000000000000000000000000000000000000000008b89",
    "0000000000000000000000000000000000000000000000000000000000670425",
    "000000000000000000000000000000000000000000000000000000004c0e0f51",
    "0000000000000000000000000000000000000000000000000000003826614ecd",
    "0000000000000000000000000000000000000000000000000000297455d72d59",
    "000000000000000000000000000000000000000000000000001e9ae35fdc7ab5",
    "000000000000000000000000000000000000000000000000169859ddc5c697a1",
    "000000000000000000000000000000000000000000000010ae7a58bb039df1dd",
    "000000000000000000000000000000000000000000000c50d0538211ab9b9029",
    "0000000000000000000000000000000000000000000917a9cda7070bb1d96e45",
    "000000000000000000000000000000000000000006b6785cd45033a24d8668f1",
    "0000000000000000000000000000000000000004f4b6dc88bf361ed33c3b79ed",
    "00000000000000000000000000000000000003a8ab00d0f52af4c1f377e903f9",
    "000000000000000000000000000000000002b3863f9a4500b6b330bf8707ee90",
));

/// Generator of the order-`Q` subgroup, `G = 2^R mod P`
pub const G: U4096 = U4096::from_be_hex(concat!(
    "9b61c275e06f3e38372f9a9ade0cdc4c82f4ce5337b3ef0ed28bedbc01342eb8",
    "9977c8116d741270d45b0ebe12d96c5aee997fefdea18569018afe1284e702bb",
    "9b8c78e03e697f378d25bcbcb94fefd12b7f97047f63423268881c3b96b389e1",
    "34cb3162cb73ed8052f7946c7e72907fd8b96862d443b5c26f7b0e3fdc9f035c",
    "bf0f5aab670b79011a8bcdebcf421cc9cbbe12c788e50328041eb59d81079497",
    "b667b96049da04c79d60f527b1c02f7ecba66849179cb5cfbe7c990cd888b69c",
    "44171e4f54c21a8cfe9d821f195f7553b73a705707263eaea3b7afa7ded79acf",
    "5a64f3bfb939b815c52085f40714f4c6460b0b0c3598e31746a06c2a3457676c",
    "b345c8a390ebb9428ceecefa6fcb1c27a9e527a6c55b8d6b2b1868d6ec719e18",
    "9a799605c540f8641f135d5dc7fb62d58e0de0b6ae3ab90e91fb996505d7d928",
    "3da833ff0cb6cc8ca7bafa0e90bb1adb81545a801f0016dc7088a4df2cfb7d6d",
    "d876a2a5807bdaa4000dafa2dfb6fbb0ed9d775589156ddbfc24ff2203fff9c5",
    "cf7c85c68f66de94c98331f50fef59cf8e7ce9d95fa008f7c1672d269c163751",
    "012826c4c8f5b5f4c11edb62550f3cf93d86f3cc6e22b0e769ac659157f40383",
    "b5df9db9f8414f6cb5fa7d17bddd3bc90dc7bdc39baf3be602a99e2a37ce3a5c",
    "098a8c1efd3cd28a6b79306ca2c20c55174218a3935f697e813628d2d861be54",
));

/// Montgomery parameters for P, computed once per process
fn p_params() -> DynResidueParams<P_LIMBS> {
    static PARAMS: OnceLock<DynResidueParams<P_LIMBS>> = OnceLock::new();
    return *PARAMS.get_or_init(|| DynResidueParams::new(&P));
}

/// Montgomery parameters for Q, computed once per process
fn q_params() -> DynResidueParams<Q_LIMBS> {
    static PARAMS: OnceLock<DynResidueParams<Q_LIMBS>> = OnceLock::new();
    return *PARAMS.get_or_init(|| DynResidueParams::new(&Q));
}

/// Zero-extend a Q-space integer so that it can be used as an exponent of a P-space residue
fn widen(value: &QInt) -> PInt {
    let mut limbs = [Limb::ZERO; P_LIMBS];
    limbs[..Q_LIMBS].copy_from_slice(value.as_limbs());
    return PInt::new(limbs);
}

/// An exponent: an integer in `[0, Q)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ElementModQ(QInt);

/// A member of the large group: an integer in `[0, P)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ElementModP(PInt);

pub const ZERO_MOD_Q: ElementModQ = ElementModQ(QInt::ZERO);
pub const ONE_MOD_Q: ElementModQ = ElementModQ(QInt::ONE);
pub const TWO_MOD_Q: ElementModQ = ElementModQ(QInt::from_u8(2));
pub const ZERO_MOD_P: ElementModP = ElementModP(PInt::ZERO);
pub const ONE_MOD_P: ElementModP = ElementModP(PInt::ONE);
pub const G_MOD_P: ElementModP = ElementModP(G);

impl ElementModQ {
    /// Wrap an integer, rejecting anything outside `[0, Q)`
    pub fn new(value: QInt) -> Result<Self> {
        if value >= Q {
            return Err(Error::OutOfRange {
                value: BigUint::from_bytes_be(&value.to_be_bytes()).to_string(),
                modulus: "Q",
            });
        }
        return Ok(Self(value));
    }

    /// Every `u64` is smaller than `Q`, so this cannot fail
    pub fn from_u64(value: u64) -> Self {
        return Self(QInt::from_u64(value));
    }

    /// Reduce an arbitrary 256-bit integer modulo `Q`.
    pub(crate) fn reduce(value: &QInt) -> Self {
        return Self(DynResidue::new(value, q_params()).retrieve());
    }

    pub fn get_value(&self) -> &QInt {
        return &self.0;
    }

    pub fn is_zero(&self) -> bool {
        return self.0 == QInt::ZERO;
    }

    pub fn to_be_bytes(&self) -> Vec<u8> {
        return self.0.to_be_bytes().to_vec();
    }

    /// Canonical base-10 representation
    pub fn to_decimal_string(&self) -> String {
        return BigUint::from_bytes_be(&self.0.to_be_bytes()).to_str_radix(10);
    }

    pub fn from_decimal_str(value: &str) -> Result<Self> {
        let bytes = parse_decimal(value, QInt::BYTES, "Q")?;
        return Self::new(QInt::from_be_slice(&bytes));
    }

    fn to_residue(&self) -> DynResidue<Q_LIMBS> {
        return DynResidue::new(&self.0, q_params());
    }
}

impl ElementModP {
    /// Wrap an integer, rejecting anything outside `[0, P)`
    pub fn new(value: PInt) -> Result<Self> {
        if value >= P {
            return Err(Error::OutOfRange {
                value: BigUint::from_bytes_be(&value.to_be_bytes()).to_string(),
                modulus: "P",
            });
        }
        return Ok(Self(value));
    }

    pub fn from_u64(value: u64) -> Self {
        return Self(PInt::from_u64(value));
    }

    pub fn get_value(&self) -> &PInt {
        return &self.0;
    }

    pub fn to_be_bytes(&self) -> Vec<u8> {
        return self.0.to_be_bytes().to_vec();
    }

    /// Canonical base-10 representation
    pub fn to_decimal_string(&self) -> String {
        return BigUint::from_bytes_be(&self.0.to_be_bytes()).to_str_radix(10);
    }

    pub fn from_decimal_str(value: &str) -> Result<Self> {
        let bytes = parse_decimal(value, PInt::BYTES, "P")?;
        return Self::new(PInt::from_be_slice(&bytes));
    }

    /// True iff the element is a member of the order-`Q` subgroup generated by `G`, which is
    /// required of every public key and ciphertext component
    pub fn is_valid_residue(&self) -> bool {
        if self.0 == PInt::ZERO || self.0 >= P {
            return false;
        }
        let order_check = self.to_residue().pow_bounded_exp(&widen(&Q), Q_BITS);
        return order_check.retrieve() == PInt::ONE;
    }

    fn to_residue(&self) -> DynResidue<P_LIMBS> {
        return DynResidue::new(&self.0, p_params());
    }
}

/// Parse a non-negative base-10 integer into exactly `width` big-endian bytes
fn parse_decimal(value: &str, width: usize, modulus: &'static str) -> Result<Vec<u8>> {
    let out_of_range = || Error::OutOfRange {
        value: value.to_string(),
        modulus,
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(out_of_range());
    }
    let parsed = BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(out_of_range)?;
    let digits = parsed.to_bytes_be();
    if digits.len() > width {
        return Err(out_of_range());
    }
    let mut bytes = vec![0u8; width - digits.len()];
    bytes.extend_from_slice(&digits);
    return Ok(bytes);
}

/// Convert a machine integer into Q-space, rejecting negative values
pub fn int_to_q(value: i128) -> Result<ElementModQ> {
    if value < 0 {
        return Err(Error::OutOfRange {
            value: value.to_string(),
            modulus: "Q",
        });
    }
    return ElementModQ::new(QInt::from_u128(value as u128));
}

/// Convert a machine integer into P-space, rejecting negative values
pub fn int_to_p(value: i128) -> Result<ElementModP> {
    if value < 0 {
        return Err(Error::OutOfRange {
            value: value.to_string(),
            modulus: "P",
        });
    }
    return ElementModP::new(PInt::from_u128(value as u128));
}

/// (a + b) mod Q
pub fn add_q(a: &ElementModQ, b: &ElementModQ) -> ElementModQ {
    return ElementModQ(a.0.add_mod(&b.0, &Q));
}

/// (a - b) mod Q
pub fn a_minus_b_q(a: &ElementModQ, b: &ElementModQ) -> ElementModQ {
    return ElementModQ(a.0.sub_mod(&b.0, &Q));
}

/// (-a) mod Q
pub fn negate_q(a: &ElementModQ) -> ElementModQ {
    return ElementModQ(a.0.neg_mod(&Q));
}

/// (a * b) mod Q
pub fn mult_q(a: &ElementModQ, b: &ElementModQ) -> ElementModQ {
    return ElementModQ(a.to_residue().mul(&b.to_residue()).retrieve());
}

/// (a + b * c) mod Q, the shape of every sigma-protocol response
pub fn a_plus_bc_q(a: &ElementModQ, b: &ElementModQ, c: &ElementModQ) -> ElementModQ {
    return add_q(a, &mult_q(b, c));
}

/// (a / b) mod Q. Fails when `b` is zero.
pub fn div_q(a: &ElementModQ, b: &ElementModQ) -> Result<ElementModQ> {
    let (inverse, invertible) = b.to_residue().invert();
    let invertible: bool = invertible.into();
    if !invertible {
        return Err(Error::OutOfRange {
            value: b.to_decimal_string(),
            modulus: "Q (divisor must be invertible)",
        });
    }
    return Ok(ElementModQ(a.to_residue().mul(&inverse).retrieve()));
}

/// (a * b) mod P
pub fn mult_p(a: &ElementModP, b: &ElementModP) -> ElementModP {
    return ElementModP(a.to_residue().mul(&b.to_residue()).retrieve());
}

/// Product of any number of P-space elements; the empty product is one
pub fn mult_all_p<'a>(elements: impl IntoIterator<Item = &'a ElementModP>) -> ElementModP {
    let product = elements
        .into_iter()
        .fold(ONE_MOD_P.to_residue(), |acc, elem| acc.mul(&elem.to_residue()));
    return ElementModP(product.retrieve());
}

/// base ^ exponent mod P
pub fn pow_p(base: &ElementModP, exponent: &ElementModQ) -> ElementModP {
    let power = base
        .to_residue()
        .pow_bounded_exp(&widen(&exponent.0), Q_BITS);
    return ElementModP(power.retrieve());
}

/// base ^ exponent mod P for a small machine-word exponent
pub fn pow_p_small(base: &ElementModP, exponent: u64) -> ElementModP {
    let power = base
        .to_residue()
        .pow_bounded_exp(&PInt::from_u64(exponent), u64::BITS as usize);
    return ElementModP(power.retrieve());
}

/// G ^ exponent mod P
pub fn g_pow_p(exponent: &ElementModQ) -> ElementModP {
    return pow_p(&G_MOD_P, exponent);
}

/// Multiplicative inverse mod P. Fails for zero.
pub fn mult_inv_p(a: &ElementModP) -> Result<ElementModP> {
    let (inverse, invertible) = a.to_residue().invert();
    let invertible: bool = invertible.into();
    if !invertible {
        return Err(Error::OutOfRange {
            value: a.to_decimal_string(),
            modulus: "P (element must be invertible)",
        });
    }
    return Ok(ElementModP(inverse.retrieve()));
}

/// (a / b) mod P
pub fn div_p(a: &ElementModP, b: &ElementModP) -> Result<ElementModP> {
    return Ok(mult_p(a, &mult_inv_p(b)?));
}

/// Uniformly sample from `[1, Q)`. Rejection sampling over 256-bit integers; since `Q` is
/// `2^256 - 189` a redraw almost never happens.
pub fn rand_q<R: CryptoRng + RngCore>(rng: &mut R) -> ElementModQ {
    return rand_range_q(&ONE_MOD_Q, rng);
}

/// Uniformly sample from `[start, Q)`
pub fn rand_range_q<R: CryptoRng + RngCore>(start: &ElementModQ, rng: &mut R) -> ElementModQ {
    loop {
        let candidate = QInt::random(rng);
        if candidate >= start.0 && candidate < Q {
            return ElementModQ(candidate);
        }
    }
}

/// Check that the fixed constants describe a prime-order subgroup: P and Q are prime,
/// `P = Q * R + 1`, and `G` is a non-trivial element of order `Q`.
pub fn validate_parameters() -> bool {
    if !crypto_primes::is_prime(&Q) || !crypto_primes::is_prime(&P) {
        return false;
    }
    if widen(&Q).wrapping_mul(&R).wrapping_add(&PInt::ONE) != P {
        return false;
    }
    return G != PInt::ONE && G_MOD_P.is_valid_residue();
}

impl fmt::Display for ElementModQ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.to_decimal_string());
    }
}

impl fmt::Display for ElementModP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.to_decimal_string());
    }
}

impl Serialize for ElementModQ {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        return serializer.serialize_str(&self.to_decimal_string());
    }
}

impl<'de> Deserialize<'de> for ElementModQ {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let decimal = String::deserialize(deserializer)?;
        return Self::from_decimal_str(&decimal).map_err(de::Error::custom);
    }
}

impl Serialize for ElementModP {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        return serializer.serialize_str(&self.to_decimal_string());
    }
}

impl<'de> Deserialize<'de> for ElementModP {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let decimal = String::deserialize(deserializer)?;
        return Self::from_decimal_str(&decimal).map_err(de::Error::custom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_parameters_are_consistent() {
        assert!(validate_parameters());
    }

    #[test]
    fn test_range_checks() {
        assert!(int_to_q(-1).is_err());
        assert!(int_to_p(-1).is_err());
        assert_eq!(int_to_q(5).unwrap(), ElementModQ::from_u64(5));
        assert!(ElementModQ::new(Q).is_err());
        assert!(ElementModP::new(P).is_err());
        assert!(ElementModQ::new(Q.wrapping_sub(&QInt::ONE)).is_ok());
    }

    #[test]
    fn test_modular_wraparound() {
        let q_minus_one = ElementModQ::new(Q.wrapping_sub(&QInt::ONE)).unwrap();
        assert_eq!(add_q(&q_minus_one, &ONE_MOD_Q), ZERO_MOD_Q);
        assert_eq!(a_minus_b_q(&ZERO_MOD_Q, &ONE_MOD_Q), q_minus_one);
        assert_eq!(negate_q(&ONE_MOD_Q), q_minus_one);
        assert_eq!(mult_q(&q_minus_one, &q_minus_one), ONE_MOD_Q);
        assert_eq!(
            a_plus_bc_q(&ONE_MOD_Q, &TWO_MOD_Q, &ElementModQ::from_u64(3)),
            ElementModQ::from_u64(7)
        );
    }

    #[test]
    fn test_division() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = rand_q(&mut rng);
        let b = rand_q(&mut rng);
        let quotient = div_q(&a, &b).unwrap();
        assert_eq!(mult_q(&quotient, &b), a);
        assert!(div_q(&a, &ZERO_MOD_Q).is_err());

        let x = g_pow_p(&a);
        let y = g_pow_p(&b);
        assert_eq!(mult_p(&div_p(&x, &y).unwrap(), &y), x);
        assert!(mult_inv_p(&ZERO_MOD_P).is_err());
    }

    #[test]
    fn test_exponent_laws() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = rand_q(&mut rng);
        let b = rand_q(&mut rng);
        assert_eq!(mult_p(&g_pow_p(&a), &g_pow_p(&b)), g_pow_p(&add_q(&a, &b)));
        assert_eq!(pow_p(&g_pow_p(&a), &b), g_pow_p(&mult_q(&a, &b)));
        assert_eq!(pow_p_small(&G_MOD_P, 5), g_pow_p(&ElementModQ::from_u64(5)));
        assert_eq!(g_pow_p(&ZERO_MOD_Q), ONE_MOD_P);
        assert_eq!(mult_all_p([&G_MOD_P, &G_MOD_P]), pow_p_small(&G_MOD_P, 2));
    }

    #[test]
    fn test_residue_membership() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(g_pow_p(&rand_q(&mut rng)).is_valid_residue());
        assert!(!ZERO_MOD_P.is_valid_residue());
        // P - 1 has order 2, which does not divide Q
        let minus_one = ElementModP::new(P.wrapping_sub(&PInt::ONE)).unwrap();
        assert!(!minus_one.is_valid_residue());
    }

    #[test]
    fn test_random_sampling_is_in_range() {
        let mut rng = StdRng::seed_from_u64(19);
        for _ in 0..64 {
            let sample = rand_range_q(&TWO_MOD_Q, &mut rng);
            assert!(sample >= TWO_MOD_Q);
        }
    }

    #[test]
    fn test_decimal_representation() {
        let value = ElementModQ::from_u64(1234567890123);
        assert_eq!(value.to_decimal_string(), "1234567890123");
        assert_eq!(ElementModQ::from_decimal_str("1234567890123").unwrap(), value);
        assert_eq!(ElementModP::from_decimal_str("0").unwrap(), ZERO_MOD_P);
        assert!(ElementModQ::from_decimal_str("-4").is_err());
        assert!(ElementModQ::from_decimal_str("").is_err());

        let q_decimal = BigUint::from_bytes_be(&Q.to_be_bytes()).to_string();
        assert!(ElementModQ::from_decimal_str(&q_decimal).is_err());
    }

    #[test]
    fn test_serde_uses_decimal_strings() {
        let value = ElementModP::from_u64(42);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"42\"");
        let parsed: ElementModP = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
        assert!(serde_json::from_str::<ElementModQ>("\"abc\"").is_err());
    }
}
