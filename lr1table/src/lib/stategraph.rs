use std::{collections::hash_map::HashMap, fmt::Write, hash::Hash};

use fnv::FnvHashMap;
use lr1grammar::{Grammar, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{itemset::Itemset, StIdx, StIdxStorageT};

/// The canonical collection of LR(1) item sets, together with the transitions discovered while
/// building it.
#[derive(Debug)]
pub struct StateGraph<StorageT> {
    /// The closed itemset of every state, indexed by `StIdx`.
    states: Vec<Itemset<StorageT>>,
    start_state: StIdx,
    /// For each state in `states`, edges is a hashmap from symbols to state offsets.
    edges: Vec<HashMap<Symbol<StorageT>, StIdx>>,
    /// A map from itemsets to the state they were registered as.
    index: FnvHashMap<Itemset<StorageT>, StIdx>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new(
        states: Vec<Itemset<StorageT>>,
        start_state: StIdx,
        edges: Vec<HashMap<Symbol<StorageT>, StIdx>>,
        index: FnvHashMap<Itemset<StorageT>, StIdx>,
    ) -> Self {
        assert!(StIdxStorageT::try_from(states.len()).is_ok());
        debug_assert_eq!(states.len(), edges.len());
        debug_assert_eq!(states.len(), index.len());
        StateGraph {
            states,
            start_state,
            edges,
            index,
        }
    }

    /// Return this state graph's start state.
    pub fn start_state(&self) -> StIdx {
        self.start_state
    }

    /// Return an iterator which produces (in order from `0..self.all_states_len()`) all this
    /// graph's valid `StIdx`s.
    pub fn iter_stidxs(&self) -> impl Iterator<Item = StIdx> {
        // states.len() was checked to fit into StIdxStorageT in the constructor.
        (0..self.states.len()).map(StIdx::from)
    }

    /// Return the itemset for state `stidx`. Panics if `stidx` doesn't exist.
    pub fn state(&self, stidx: StIdx) -> &Itemset<StorageT> {
        &self.states[usize::from(stidx)]
    }

    /// How many states does this `StateGraph` contain?
    pub fn all_states_len(&self) -> StIdx {
        StIdx::from(self.states.len())
    }

    /// Return the state whose itemset is structurally equal to `is`, if there is one.
    pub fn state_idx(&self, is: &Itemset<StorageT>) -> Option<StIdx> {
        self.index.get(is).copied()
    }

    /// Return the state pointed to by `sym` from `stidx` or `None` otherwise.
    pub fn edge(&self, stidx: StIdx, sym: Symbol<StorageT>) -> Option<StIdx> {
        self.edges
            .get(usize::from(stidx))
            .and_then(|x| x.get(&sym))
            .cloned()
    }

    /// Return the edges for state `stidx`. Panics if `stidx` doesn't exist.
    pub fn edges(&self, stidx: StIdx) -> &HashMap<Symbol<StorageT>, StIdx> {
        &self.edges[usize::from(stidx)]
    }

    /// How many edges does this `StateGraph` contain?
    pub fn all_edges_len(&self) -> usize {
        self.edges.iter().fold(0, |a, x| a + x.len())
    }

    /// Pretty print this stategraph as a `String`. Items sharing a production and dot are
    /// printed once with all their lookaheads.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let width = usize::from(self.all_states_len()).to_string().len();
        let mut o = String::new();
        for stidx in self.iter_stidxs() {
            if stidx != self.start_state {
                o.push('\n');
            }
            let prefix = usize::from(stidx).to_string();
            write!(o, "{}:{}", prefix, " ".repeat(width - prefix.len())).ok();

            let mut first = true;
            let mut items = self.state(stidx).iter().peekable();
            while let Some(item) = items.next() {
                if !first {
                    write!(o, "\n{}", " ".repeat(width + 1)).ok();
                }
                first = false;
                write!(o, " [{} >", grm.rule_name_str(grm.prod_to_rule(item.pidx))).ok();
                let prod = grm.prod(item.pidx);
                for (i, sym) in prod.iter().enumerate() {
                    if i == usize::from(item.dot) {
                        o.push_str(" .");
                    }
                    write!(o, " {}", grm.symbol_name(*sym)).ok();
                }
                if usize::from(item.dot) == prod.len() {
                    o.push_str(" .");
                }
                write!(o, ", {{{}", grm.token_name(item.la)).ok();
                while let Some(next) = items.next_if(|x| x.pidx == item.pidx && x.dot == item.dot) {
                    write!(o, ", {}", grm.token_name(next.la)).ok();
                }
                o.push_str("}]");
            }

            let mut edges = self.edges(stidx).iter().collect::<Vec<_>>();
            edges.sort();
            for (sym, e_stidx) in edges {
                write!(
                    o,
                    "\n{}{} -> {}",
                    " ".repeat(width + 2),
                    grm.symbol_name(*sym),
                    usize::from(*e_stidx)
                )
                .ok();
            }
        }
        o
    }
}

#[cfg(test)]
mod test {
    use crate::{canonical::canonical_stategraph, StIdx};
    use lr1grammar::{Grammar, Symbol};

    #[test]
    fn test_pp() {
        let grm = Grammar::new("t_eof\nt_a\n\nS > t_a\n").unwrap();
        let sg = canonical_stategraph(&grm, grm.firsts());
        assert_eq!(
            sg.pp(&grm),
            "0: [S > . t_a, {t_eof}]\n   t_a -> 1\n1: [S > t_a ., {t_eof}]"
        );
    }

    #[test]
    fn test_edges_and_lookup() {
        let grm = Grammar::new("t_eof\nt_c\nt_d\n\nS > C C\nC > t_c C\nC > t_d\n").unwrap();
        let sg = canonical_stategraph(&grm, grm.firsts());
        let s0 = sg.start_state();
        assert_eq!(s0, StIdx::from(0usize));
        let c = Symbol::Rule(grm.rule_idx("C").unwrap());
        let s_c = sg.edge(s0, c).unwrap();
        assert_eq!(sg.state_idx(sg.state(s_c)), Some(s_c));
        let goto_c = sg.state(s0).goto(&grm, grm.firsts(), c);
        assert_eq!(sg.state_idx(&goto_c), Some(s_c));
        let eof = Symbol::Token(grm.eof_token_idx());
        assert_eq!(sg.edge(s0, eof), None);
        assert_eq!(sg.state_idx(&sg.state(s0).goto(&grm, grm.firsts(), eof)), None);
        assert_eq!(sg.iter_stidxs().count(), usize::from(sg.all_states_len()));
    }
}
