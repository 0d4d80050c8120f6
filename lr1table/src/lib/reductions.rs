use std::{collections::HashMap, hash::Hash};

use lr1grammar::{Grammar, PIdx, RIdx};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An index into a [`ReductionCatalog`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RedIdx(u32);

impl From<usize> for RedIdx {
    fn from(v: usize) -> Self {
        match u32::try_from(v) {
            Ok(x) => RedIdx(x),
            Err(_) => panic!("Overflow"),
        }
    }
}

impl From<RedIdx> for usize {
    fn from(r: RedIdx) -> Self {
        r.0 as usize
    }
}

/// How REDUCE actions are identified in a [`ReductionCatalog`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReductionKeying {
    /// Reductions with the same left-hand side and the same number of popped symbols share an
    /// entry, whichever production they came from.
    #[default]
    Shape,
    /// Every reduced production has its own entry.
    Production,
}

/// What a parser needs to perform a reduction: the rule to push and how many stack entries to
/// pop. `pidx` is the production that first caused this entry to be created.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReductionEntry<StorageT> {
    lhs: RIdx<StorageT>,
    pop_count: usize,
    pidx: PIdx<StorageT>,
}

impl<StorageT: Copy> ReductionEntry<StorageT> {
    pub fn lhs(&self) -> RIdx<StorageT> {
        self.lhs
    }

    pub fn pop_count(&self) -> usize {
        self.pop_count
    }

    pub fn pidx(&self) -> PIdx<StorageT> {
        self.pidx
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Key<StorageT> {
    Shape(RIdx<StorageT>, usize),
    Production(PIdx<StorageT>),
}

/// The distinct reductions used by a state table, in order of first use.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReductionCatalog<StorageT: Eq + Hash> {
    entries: Vec<ReductionEntry<StorageT>>,
    #[cfg_attr(feature = "serde", serde(skip, default = "HashMap::new"))]
    index: HashMap<Key<StorageT>, RedIdx>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> ReductionCatalog<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new() -> Self {
        ReductionCatalog {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Return the index of the entry for reducing production `pidx`, creating one if needed.
    /// Entries are never moved once created.
    pub(crate) fn intern(
        &mut self,
        grm: &Grammar<StorageT>,
        pidx: PIdx<StorageT>,
        keying: ReductionKeying,
    ) -> RedIdx {
        let lhs = grm.prod_to_rule(pidx);
        let pop_count = grm.prod(pidx).len();
        let key = match keying {
            ReductionKeying::Shape => Key::Shape(lhs, pop_count),
            ReductionKeying::Production => Key::Production(pidx),
        };
        if let Some(redidx) = self.index.get(&key) {
            return *redidx;
        }
        let redidx = RedIdx::from(self.entries.len());
        self.entries.push(ReductionEntry {
            lhs,
            pop_count,
            pidx,
        });
        self.index.insert(key, redidx);
        redidx
    }

    /// Return the entry at `redidx`, or `None` if it doesn't exist.
    pub fn get(&self, redidx: RedIdx) -> Option<&ReductionEntry<StorageT>> {
        self.entries.get(usize::from(redidx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(RedIdx, &ReductionEntry)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (RedIdx, &ReductionEntry<StorageT>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (RedIdx::from(i), e))
    }

    /// Return the first entry reducing to `lhs` by popping `pop_count` symbols.
    pub fn find(&self, lhs: RIdx<StorageT>, pop_count: usize) -> Option<RedIdx> {
        self.entries
            .iter()
            .position(|e| e.lhs == lhs && e.pop_count == pop_count)
            .map(RedIdx::from)
    }
}
