//! Bounded discrete log for recovering small counts from `G^count`
//!
//! Tally totals are bounded by the number of ballots, so instead of a general discrete log we
//! precompute `G^0 .. G^bound` once and look the answer up.
use crate::group::{mult_p, ElementModP, G_MOD_P, ONE_MOD_P};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct DiscreteLogTable {
    table: BTreeMap<ElementModP, u64>,
    bound: u64,
    /// `G^bound`, the point the next extension continues from
    last: ElementModP,
}

impl DiscreteLogTable {
    /// Table covering every exponent in `[0, bound]`
    pub fn new(bound: u64) -> Self {
        let mut table = BTreeMap::new();
        table.insert(ONE_MOD_P, 0);
        let mut dlog = Self {
            table,
            bound: 0,
            last: ONE_MOD_P,
        };
        dlog.ensure_bound(bound);
        return dlog;
    }

    pub fn get_bound(&self) -> u64 {
        return self.bound;
    }

    /// Grow the table so that it covers `[0, bound]`. Existing entries are kept; a smaller
    /// bound is a no-op.
    pub fn ensure_bound(&mut self, bound: u64) {
        while self.bound < bound {
            self.last = mult_p(&self.last, &G_MOD_P);
            self.bound += 1;
            self.table.insert(self.last, self.bound);
        }
    }

    /// The exponent `e` with `G^e == element`, if `e` is within the bound
    pub fn find(&self, element: &ElementModP) -> Option<u64> {
        return self.table.get(element).copied();
    }
}
