#![allow(clippy::new_without_default)]

//! Canonical LR(1) table construction.
//!
//! Given a [`Grammar`], [`from_grammar`] builds the canonical collection of LR(1) item sets (a
//! [`StateGraph`]) and from it the ACTION/GOTO tables and reduction catalog (a
//! [`StateTable`]). Construction is total: every conflict is resolved by the precedence rules
//! described in [`statetable`] and reported through [`StateTable::conflicts`].

use std::hash::Hash;

use log::info;
use lr1grammar::{Firsts, FirstsKind, Grammar};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod canonical;
pub mod itemset;
pub mod reductions;
pub mod stategraph;
pub mod statetable;

pub use crate::{
    itemset::{Item, Itemset},
    reductions::{RedIdx, ReductionCatalog, ReductionEntry, ReductionKeying},
    stategraph::StateGraph,
    statetable::{
        Action, Conflicts, Resolution, StateTable, StateTableError, StateTableErrorKind,
    },
};

type StIdxStorageT = u32;

/// StIdx is a wrapper for a state index. Its internal type is subject to change, but it is
/// guaranteed to be convertible to and from `usize`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StIdx(StIdxStorageT);

impl From<StIdxStorageT> for StIdx {
    fn from(v: StIdxStorageT) -> Self {
        StIdx(v)
    }
}

impl From<usize> for StIdx {
    fn from(v: usize) -> Self {
        match StIdxStorageT::try_from(v) {
            Ok(x) => StIdx(x),
            Err(_) => panic!("Overflow"),
        }
    }
}

impl From<StIdx> for usize {
    fn from(st: StIdx) -> Self {
        st.0 as usize
    }
}

impl From<StIdx> for StIdxStorageT {
    fn from(st: StIdx) -> Self {
        st.0
    }
}

/// Table construction options. The defaults reproduce the classic behaviour of the generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// The FIRST relation closure uses to compute lookaheads.
    pub firsts: FirstsKind,
    /// How REDUCE actions are keyed in the reduction catalog.
    pub reductions: ReductionKeying,
}

impl Options {
    pub fn firsts(mut self, kind: FirstsKind) -> Self {
        self.firsts = kind;
        self
    }

    pub fn reductions(mut self, keying: ReductionKeying) -> Self {
        self.reductions = keying;
        self
    }
}

/// Build the canonical LR(1) state graph and state table for `grm`.
pub fn from_grammar<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    opts: Options,
) -> (StateGraph<StorageT>, StateTable<StorageT>)
where
    usize: AsPrimitive<StorageT>,
{
    let exact;
    let firsts = match opts.firsts {
        FirstsKind::Approximate => grm.firsts(),
        FirstsKind::Exact => {
            exact = Firsts::exact(grm);
            &exact
        }
    };
    let sg = canonical::canonical_stategraph(grm, firsts);
    let st = StateTable::new(grm, &sg, opts.reductions);
    info!(
        "{} states, {} reductions, {} shift/reduce and {} reduce/reduce conflicts",
        usize::from(sg.all_states_len()),
        st.reductions().len(),
        st.conflicts().map_or(0, |c| c.sr_len()),
        st.conflicts().map_or(0, |c| c.rr_len())
    );
    (sg, st)
}
