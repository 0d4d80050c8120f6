use std::marker::PhantomData;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{grammar::Grammar, RIdx, Symbol, TIdx};

/// Which FIRST relation table construction should use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FirstsKind {
    /// For every rule, the leftmost token of each of its productions, wherever in the
    /// production that token appears. This is not transitively closed: a production starting
    /// with a rule contributes the first token found after it instead.
    #[default]
    Approximate,
    /// The classic fixpoint FIRST relation.
    Exact,
}

/// `Firsts` stores a first set for every rule of a grammar. For example, given this grammar:
///
/// ```text
///   S > A t_b
///   A > t_a
///   A > S t_c
/// ```
///
/// the approximate relation is `S: {b}`, `A: {a, c}`, whereas the exact relation is
/// `S: {a}`, `A: {a}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Firsts<StorageT> {
    firsts: Vec<Vob>,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Firsts<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn empty() -> Self {
        Firsts {
            firsts: Vec::new(),
            phantom: PhantomData,
        }
    }

    fn blank(grm: &Grammar<StorageT>) -> Self {
        Firsts {
            firsts: vec![Vob::from_elem(false, usize::from(grm.tokens_len())); usize::from(grm.rules_len())],
            phantom: PhantomData,
        }
    }

    /// Compute the FIRST relation of kind `kind` for `grm`.
    pub fn new(grm: &Grammar<StorageT>, kind: FirstsKind) -> Self {
        match kind {
            FirstsKind::Approximate => Firsts::approximate(grm),
            FirstsKind::Exact => Firsts::exact(grm),
        }
    }

    /// Record, for every production, the leftmost token in its right-hand side against the
    /// production's rule.
    pub fn approximate(grm: &Grammar<StorageT>) -> Self {
        let mut firsts = Firsts::blank(grm);
        for pidx in grm.iter_pidxs() {
            let leftmost = grm.prod(pidx).iter().find_map(|sym| match sym {
                Symbol::Token(tidx) => Some(*tidx),
                Symbol::Rule(_) => None,
            });
            if let Some(tidx) = leftmost {
                firsts.set(grm.prod_to_rule(pidx), tidx);
            }
        }
        firsts
    }

    /// Compute the fixpoint FIRST relation. Productions are never empty, so only the first
    /// symbol of each production matters.
    pub fn exact(grm: &Grammar<StorageT>) -> Self {
        let mut firsts = Firsts::blank(grm);
        loop {
            let mut changed = false;
            for pidx in grm.iter_pidxs() {
                let ridx = usize::from(grm.prod_to_rule(pidx));
                match grm.prod(pidx)[0] {
                    Symbol::Token(tidx) => {
                        if !firsts.firsts[ridx][usize::from(tidx)] {
                            firsts.firsts[ridx].set(usize::from(tidx), true);
                            changed = true;
                        }
                    }
                    Symbol::Rule(first_ridx) => {
                        let first_ridx = usize::from(first_ridx);
                        if first_ridx != ridx {
                            let other = firsts.firsts[first_ridx].clone();
                            changed |= firsts.firsts[ridx].or(&other);
                        }
                    }
                }
            }
            if !changed {
                return firsts;
            }
        }
    }

    /// Returns true if the token `tidx` is in the first set for rule `ridx`.
    pub fn is_set(&self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.firsts[usize::from(ridx)][usize::from(tidx)]
    }

    /// Returns true if rule `ridx` has no tokens in its first set.
    pub fn is_empty(&self, ridx: RIdx<StorageT>) -> bool {
        self.firsts[usize::from(ridx)].iter_set_bits(..).next().is_none()
    }

    /// Get all the firsts for rule `ridx` as a `Vob`.
    pub fn firsts(&self, ridx: RIdx<StorageT>) -> &Vob {
        &self.firsts[usize::from(ridx)]
    }

    /// Ensures that the firsts bit for token `tidx` rule `ridx` is set. Returns true if it was
    /// already set, or false otherwise.
    pub fn set(&mut self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        let r = &mut self.firsts[usize::from(ridx)];
        if r[usize::from(tidx)] {
            true
        } else {
            r.set(usize::from(tidx), true);
            false
        }
    }
}
