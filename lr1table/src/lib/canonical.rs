use std::{
    collections::{hash_map::HashMap, VecDeque},
    hash::Hash,
};

use fnv::FnvHashMap;
use log::debug;
use lr1grammar::{Firsts, Grammar, SIdx, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{itemset::Itemset, stategraph::StateGraph, StIdx};

/// The order in which unmarked states are taken from the worklist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Exploration {
    /// Oldest first. States are numbered in breadth-first order.
    Fifo,
    #[cfg(test)]
    Lifo,
}

/// The canonical collection under construction.
struct Collection<StorageT> {
    states: Vec<Itemset<StorageT>>,
    edges: Vec<HashMap<Symbol<StorageT>, StIdx>>,
    index: FnvHashMap<Itemset<StorageT>, StIdx>,
    /// Which states have had their gotos computed.
    marked: Vob,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Collection<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Return the state for `is`, registering it if it has not been seen before. The second
    /// element is true if the state is new.
    fn intern(&mut self, is: Itemset<StorageT>) -> (StIdx, bool) {
        if let Some(stidx) = self.index.get(&is) {
            return (*stidx, false);
        }
        let stidx = StIdx::from(self.states.len());
        self.index.insert(is.clone(), stidx);
        self.states.push(is);
        self.edges.push(HashMap::new());
        self.marked.push(false);
        (stidx, true)
    }
}

/// Build the canonical collection of LR(1) item sets for `grm`. State 0 is the closure of every
/// production of the start rule with the end-of-input token as lookahead.
pub(crate) fn canonical_stategraph<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &Firsts<StorageT>,
) -> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    build(grm, firsts, Exploration::Fifo)
}

fn build<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &Firsts<StorageT>,
    exploration: Exploration,
) -> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    let mut coll = Collection {
        states: Vec::new(),
        edges: Vec::new(),
        index: FnvHashMap::default(),
        marked: Vob::new(),
    };

    let mut seed = Itemset::new();
    for &pidx in grm.rule_to_prods(grm.start_rule_idx()) {
        seed.add(pidx, SIdx(StorageT::zero()), grm.eof_token_idx());
    }
    seed.close(grm, firsts);
    let (start_state, _) = coll.intern(seed);

    let mut todo = VecDeque::new();
    todo.push_back(start_state);
    loop {
        let stidx = match exploration {
            Exploration::Fifo => todo.pop_front(),
            #[cfg(test)]
            Exploration::Lifo => todo.pop_back(),
        };
        let stidx = match stidx {
            Some(x) => x,
            None => break,
        };
        if coll.marked[usize::from(stidx)] {
            continue;
        }
        coll.marked.set(usize::from(stidx), true);

        let syms = coll.states[usize::from(stidx)].dot_symbols(grm);
        for sym in syms {
            let nstate = coll.states[usize::from(stidx)].goto(grm, firsts, sym);
            debug_assert!(!nstate.is_empty());
            let (nstidx, new) = coll.intern(nstate);
            if new {
                debug!(
                    "state {} from state {} over {}",
                    usize::from(nstidx),
                    usize::from(stidx),
                    grm.symbol_name(sym)
                );
                todo.push_back(nstidx);
            }
            coll.edges[usize::from(stidx)].insert(sym, nstidx);
        }
    }
    debug_assert!(coll.marked.iter().all(|x| x));

    StateGraph::new(coll.states, start_state, coll.edges, coll.index)
}
