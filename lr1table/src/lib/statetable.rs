use std::{
    error::Error,
    fmt::{self, Write},
    hash::Hash,
};

use log::debug;
use lr1grammar::{AssocKind, Grammar, PIdx, RIdx, Symbol, TIdx};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use packedvec::PackedVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

use crate::{
    reductions::{RedIdx, ReductionCatalog, ReductionKeying},
    stategraph::StateGraph,
    StIdx, StIdxStorageT,
};

/// An entry in the ACTION table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action {
    /// Shift to state X in the statetable.
    Shift(StIdx),
    /// Reduce using entry X of the reduction catalog.
    Reduce(RedIdx),
    /// Accept this input.
    Accept,
}

/// How a shift/reduce conflict was settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Shift,
    Reduce,
}

/// The ways a state table can be internally inconsistent. Tables built by [`StateTable::new`]
/// never are; tables read from elsewhere should be checked with [`StateTable::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateTableErrorKind {
    /// The ACTION or GOTO table does not have one entry per state and token (or rule).
    SizeMismatch,
    /// An ACTION entry that no table built here would contain.
    BadEntry,
    /// A shift or goto refers to a state that does not exist.
    StateOutOfRange,
    /// A reduce refers to a reduction catalog entry that does not exist.
    ReductionOutOfRange,
    /// A reduction catalog entry pops nothing or reduces to a rule that does not exist.
    MalformedReduction,
}

/// Any inconsistency found by [`StateTable::validate`]. `stidx` is the state the problem was
/// found in, if it is specific to one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateTableError {
    pub kind: StateTableErrorKind,
    pub stidx: Option<StIdx>,
}

impl Error for StateTableError {}

impl fmt::Display for StateTableError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            StateTableErrorKind::SizeMismatch => "Table sizes do not match the number of states",
            StateTableErrorKind::BadEntry => "Undecodable action",
            StateTableErrorKind::StateOutOfRange => "Reference to a state that does not exist",
            StateTableErrorKind::ReductionOutOfRange => {
                "Reference to a reduction that does not exist"
            }
            StateTableErrorKind::MalformedReduction => "Malformed reduction",
        };
        match self.stidx {
            Some(stidx) => write!(f, "{} in state {}", s, usize::from(stidx)),
            None => write!(f, "{}", s),
        }
    }
}

/// The conflicts met, and resolved, while building a state table.
#[derive(Debug)]
pub struct Conflicts<StorageT> {
    /// `(kept production, discarded production, state, token)`.
    reduce_reduce: Vec<(PIdx<StorageT>, PIdx<StorageT>, StIdx, TIdx<StorageT>)>,
    /// `(token, production, state, resolution)`.
    shift_reduce: Vec<(TIdx<StorageT>, PIdx<StorageT>, StIdx, Resolution)>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Conflicts<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Return an iterator over all shift/reduce conflicts.
    pub fn sr_conflicts(
        &self,
    ) -> impl Iterator<Item = &(TIdx<StorageT>, PIdx<StorageT>, StIdx, Resolution)> {
        self.shift_reduce.iter()
    }

    /// Return an iterator over all reduce/reduce conflicts.
    pub fn rr_conflicts(
        &self,
    ) -> impl Iterator<Item = &(PIdx<StorageT>, PIdx<StorageT>, StIdx, TIdx<StorageT>)> {
        self.reduce_reduce.iter()
    }

    /// How many shift/reduce conflicts are there?
    pub fn sr_len(&self) -> usize {
        self.shift_reduce.len()
    }

    /// How many reduce/reduce conflicts are there?
    pub fn rr_len(&self) -> usize {
        self.reduce_reduce.len()
    }

    /// Returns a pretty-printed version of the conflicts.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let mut s = String::new();
        if self.sr_len() > 0 {
            s.push_str("Shift/Reduce conflicts:\n");
            for (tidx, pidx, stidx, res) in self.sr_conflicts() {
                writeln!(
                    s,
                    "   State {}: Shift(\"{}\") / Reduce({}) resolved as {:?}",
                    usize::from(*stidx),
                    grm.token_name(*tidx),
                    grm.pp_prod(*pidx),
                    res
                )
                .ok();
            }
        }
        if self.rr_len() > 0 {
            s.push_str("Reduce/Reduce conflicts:\n");
            for (kept, lost, stidx, tidx) in self.rr_conflicts() {
                writeln!(
                    s,
                    "   State {} on \"{}\": Reduce({}) / Reduce({}) resolved as Reduce({})",
                    usize::from(*stidx),
                    grm.token_name(*tidx),
                    grm.pp_prod(*kept),
                    grm.pp_prod(*lost),
                    grm.pp_prod(*kept)
                )
                .ok();
            }
        }
        s
    }
}

/// The ACTION and GOTO tables of a grammar, together with the reductions the ACTION table
/// refers to. Both tables are dense, with rows for states and columns for tokens (ACTION) or
/// rules (GOTO). ACTION entries are bit-encoded into a `PackedVec`.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateTable<StorageT: Eq + Hash> {
    actions: PackedVec<usize>,
    /// One bit per ACTION entry: set if that entry is not an error.
    state_actions: Vob,
    gotos: Vec<StIdx>,
    reductions: ReductionCatalog<StorageT>,
    #[cfg_attr(feature = "serde", serde(skip, default = "Option::default"))]
    conflicts: Option<Conflicts<StorageT>>,
    tokens_len: TIdx<StorageT>,
    rules_len: RIdx<StorageT>,
    states_len: StIdx,
}

const ERROR: usize = 0;
const SHIFT: usize = 1;
const REDUCE: usize = 2;
const ACCEPT: usize = 3;

const NO_GOTO: StIdx = StIdx(StIdxStorageT::MAX);

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateTable<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Build the ACTION/GOTO tables for `sg`, resolving every conflict. See
    /// [`resolve_shift_reduce`] for how shift/reduce conflicts are settled; reduce/reduce
    /// conflicts go to the production declared first.
    pub fn new(
        grm: &Grammar<StorageT>,
        sg: &StateGraph<StorageT>,
        keying: ReductionKeying,
    ) -> Self {
        let states_len = usize::from(sg.all_states_len());
        let tokens_len = usize::from(grm.tokens_len());
        let rules_len = usize::from(grm.rules_len());
        // Two bits of each action are used for the tag.
        assert!(states_len < usize::MAX >> 2);
        let maxa = states_len * tokens_len;
        let maxg = states_len * rules_len;
        let mut actions = vec![ERROR; maxa];
        let mut state_actions = Vob::from_elem(false, maxa);
        let mut gotos = vec![NO_GOTO; maxg];
        let mut reductions = ReductionCatalog::new();
        let mut conflicts = Conflicts {
            reduce_reduce: Vec::new(),
            shift_reduce: Vec::new(),
        };

        let start_ridx = grm.start_rule_idx();
        let eof = grm.eof_token_idx();
        let mut candidates: Vec<Vec<PIdx<StorageT>>> = vec![Vec::new(); tokens_len];
        for stidx in sg.iter_stidxs() {
            for c in candidates.iter_mut() {
                c.clear();
            }
            let mut accept = false;
            for item in sg.state(stidx).iter() {
                if item.dot < grm.prod_len(item.pidx) {
                    continue;
                }
                if item.la == eof && grm.prod_to_rule(item.pidx) == start_ridx {
                    accept = true;
                } else {
                    // Items are ordered by production, so each candidate list is sorted.
                    candidates[usize::from(item.la)].push(item.pidx);
                }
            }

            for tidx in grm.iter_tidxs() {
                let off = actions_offset(grm.tokens_len(), stidx, tidx);
                let cands = &candidates[usize::from(tidx)];
                if tidx == eof && accept {
                    for &pidx in cands {
                        debug!(
                            "state {}: accept overrides reduce of {}",
                            usize::from(stidx),
                            grm.pp_prod(pidx)
                        );
                    }
                    actions[off] = Self::encode(Action::Accept);
                    state_actions.set(off, true);
                    continue;
                }

                let reduce = match cands.split_first() {
                    Some((&kept, lost)) => {
                        for &l in lost {
                            debug!(
                                "state {}, token {}: reduce/reduce between {} and {} resolved as {}",
                                usize::from(stidx),
                                grm.token_name(tidx),
                                grm.pp_prod(kept),
                                grm.pp_prod(l),
                                grm.pp_prod(kept)
                            );
                            conflicts.reduce_reduce.push((kept, l, stidx, tidx));
                        }
                        Some(kept)
                    }
                    None => None,
                };
                let shift = sg.edge(stidx, Symbol::Token(tidx));
                let action = match (shift, reduce) {
                    (None, None) => continue,
                    (Some(target), None) => Action::Shift(target),
                    (None, Some(pidx)) => Action::Reduce(reductions.intern(grm, pidx, keying)),
                    (Some(target), Some(pidx)) => {
                        let res = resolve_shift_reduce(grm, tidx, pidx);
                        debug!(
                            "state {}, token {}: shift/reduce with {} resolved as {:?}",
                            usize::from(stidx),
                            grm.token_name(tidx),
                            grm.pp_prod(pidx),
                            res
                        );
                        conflicts.shift_reduce.push((tidx, pidx, stidx, res));
                        match res {
                            Resolution::Shift => Action::Shift(target),
                            Resolution::Reduce => {
                                Action::Reduce(reductions.intern(grm, pidx, keying))
                            }
                        }
                    }
                };
                actions[off] = Self::encode(action);
                state_actions.set(off, true);
            }

            for (&sym, target) in sg.edges(stidx) {
                if let Symbol::Rule(ridx) = sym {
                    let off = usize::from(stidx) * rules_len + usize::from(ridx);
                    debug_assert!(gotos[off] == NO_GOTO);
                    gotos[off] = *target;
                }
            }
        }

        let conflicts = if conflicts.sr_len() > 0 || conflicts.rr_len() > 0 {
            Some(conflicts)
        } else {
            None
        };

        StateTable {
            actions: PackedVec::<usize, usize>::new(actions),
            state_actions,
            gotos,
            reductions,
            conflicts,
            tokens_len: grm.tokens_len(),
            rules_len: grm.rules_len(),
            states_len: sg.all_states_len(),
        }
    }

    fn decode(bits: usize) -> Option<Action> {
        let action = bits & 0b11;
        let val = bits >> 2;

        match action {
            SHIFT => Some(Action::Shift(StIdx::from(val))),
            REDUCE => Some(Action::Reduce(RedIdx::from(val))),
            ACCEPT => Some(Action::Accept),
            ERROR => None,
            _ => unreachable!(),
        }
    }

    fn encode(action: Action) -> usize {
        match action {
            Action::Shift(stidx) => SHIFT | (usize::from(stidx) << 2),
            Action::Reduce(redidx) => REDUCE | (usize::from(redidx) << 2),
            Action::Accept => ACCEPT,
        }
    }

    /// Return the action for `stidx` and `tidx`, or `None` if the pair is a syntax error.
    pub fn action(&self, stidx: StIdx, tidx: TIdx<StorageT>) -> Option<Action> {
        if tidx >= self.tokens_len {
            return None;
        }
        let off = actions_offset(self.tokens_len, stidx, tidx);
        self.actions.get(off).and_then(Self::decode)
    }

    /// Return an iterator over the tokens which have a non-error action in `stidx`.
    pub fn state_actions(&self, stidx: StIdx) -> impl Iterator<Item = TIdx<StorageT>> + '_ {
        let start = usize::from(stidx) * usize::from(self.tokens_len);
        let end = start + usize::from(self.tokens_len);
        // The range is exactly tokens_len long, so `i - start` fits into StorageT.
        self.state_actions
            .iter_set_bits(start..end)
            .map(move |i| TIdx((i - start).as_()))
    }

    /// Return the goto state for `stidx` and `ridx`, or `None` if there isn't any.
    pub fn goto(&self, stidx: StIdx, ridx: RIdx<StorageT>) -> Option<StIdx> {
        if ridx >= self.rules_len {
            return None;
        }
        let off = usize::from(stidx) * usize::from(self.rules_len) + usize::from(ridx);
        match self.gotos.get(off) {
            Some(&x) if x != NO_GOTO => Some(x),
            _ => None,
        }
    }

    /// The reduction catalog that `Action::Reduce` entries index into.
    pub fn reductions(&self) -> &ReductionCatalog<StorageT> {
        &self.reductions
    }

    /// The conflicts resolved while building this table, or `None` if there were none. Tables
    /// read back from a serialized form never carry conflicts.
    pub fn conflicts(&self) -> Option<&Conflicts<StorageT>> {
        self.conflicts.as_ref()
    }

    pub fn states_len(&self) -> StIdx {
        self.states_len
    }

    /// How many tokens (ACTION columns) does this table have?
    pub fn tokens_len(&self) -> TIdx<StorageT> {
        self.tokens_len
    }

    /// How many rules (GOTO columns) does this table have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        self.rules_len
    }

    /// Check that every entry refers to states and reductions that exist, so that a parser
    /// driving this table cannot index out of bounds.
    pub fn validate(&self) -> Result<(), StateTableError> {
        let states_len = usize::from(self.states_len);
        let tokens_len = usize::from(self.tokens_len);
        let rules_len = usize::from(self.rules_len);
        let maxa = states_len.checked_mul(tokens_len);
        let maxg = states_len.checked_mul(rules_len);
        if states_len == 0
            || maxa != Some(self.actions.len())
            || maxa != Some(self.state_actions.len())
            || maxg != Some(self.gotos.len())
        {
            return Err(StateTableError {
                kind: StateTableErrorKind::SizeMismatch,
                stidx: None,
            });
        }

        if self
            .reductions
            .iter()
            .any(|(_, e)| e.pop_count() == 0 || usize::from(e.lhs()) >= rules_len)
        {
            return Err(StateTableError {
                kind: StateTableErrorKind::MalformedReduction,
                stidx: None,
            });
        }

        for (off, bits) in self.actions.iter().enumerate() {
            let val = bits >> 2;
            let kind = match bits & 0b11 {
                SHIFT if val >= states_len => StateTableErrorKind::StateOutOfRange,
                REDUCE if val >= self.reductions.len() => StateTableErrorKind::ReductionOutOfRange,
                ERROR | ACCEPT if val != 0 => StateTableErrorKind::BadEntry,
                _ if (bits != ERROR) != self.state_actions[off] => StateTableErrorKind::BadEntry,
                _ => continue,
            };
            return Err(StateTableError {
                kind,
                stidx: Some(StIdx::from(off / tokens_len)),
            });
        }

        for (off, target) in self.gotos.iter().enumerate() {
            if *target != NO_GOTO && usize::from(*target) >= states_len {
                return Err(StateTableError {
                    kind: StateTableErrorKind::StateOutOfRange,
                    stidx: Some(StIdx::from(off / rules_len)),
                });
            }
        }
        Ok(())
    }

    /// Pretty print the ACTION/GOTO tables and the reduction catalog.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let mut o = String::new();
        for stidx in (0..usize::from(self.states_len)).map(StIdx::from) {
            writeln!(o, "State {}:", usize::from(stidx)).ok();
            for tidx in self.state_actions(stidx) {
                let a = match self.action(stidx, tidx) {
                    Some(Action::Shift(s)) => format!("shift {}", usize::from(s)),
                    Some(Action::Reduce(r)) => format!("reduce {}", usize::from(r)),
                    Some(Action::Accept) => "accept".to_owned(),
                    None => continue,
                };
                writeln!(o, "  {}: {}", grm.token_name(tidx), a).ok();
            }
            for ridx in grm.iter_rules() {
                if let Some(s) = self.goto(stidx, ridx) {
                    writeln!(o, "  {}: goto {}", grm.rule_name_str(ridx), usize::from(s)).ok();
                }
            }
        }
        o.push_str("Reductions:\n");
        for (redidx, e) in self.reductions.iter() {
            writeln!(
                o,
                "  {}: {} pop {} ({})",
                usize::from(redidx),
                grm.rule_name_str(e.lhs()),
                e.pop_count(),
                grm.pp_prod(e.pidx())
            )
            .ok();
        }
        o
    }
}

fn actions_offset<StorageT: PrimInt + Unsigned>(
    tokens_len: TIdx<StorageT>,
    stidx: StIdx,
    tidx: TIdx<StorageT>,
) -> usize {
    usize::from(stidx) * usize::from(tokens_len) + usize::from(tidx)
}

/// Settle a shift/reduce conflict between shifting `tidx` and reducing `pidx`. If neither the
/// production (explicitly or through its rightmost token) nor `tidx` has a precedence, shift.
/// Otherwise, treating an undeclared `tidx` as level 0, reduce if:
///
///   1) the production's explicit precedence is greater than `tidx`'s; or
///   2) the production has no rightmost token with a declared precedence; or
///   3) the rightmost token's precedence is greater than `tidx`'s; or
///   4) the two are equal and the rightmost token is left or non-associative.
///
/// and shift in every other case. An explicit production precedence can thus only force a
/// reduction.
fn resolve_shift_reduce<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    tidx: TIdx<StorageT>,
    pidx: PIdx<StorageT>,
) -> Resolution
where
    usize: AsPrimitive<StorageT>,
{
    let tok_prec = grm.token_precedence(tidx);
    let explicit = grm.prod_precedence(pidx);
    let rightmost = grm.prod_rightmost_precedence(pidx);
    if tok_prec.is_none() && explicit.is_none() && rightmost.is_none() {
        return Resolution::Shift;
    }

    let tok_level = tok_prec.map_or(0, |p| p.level);
    if explicit.is_some_and(|l| l > tok_level) {
        return Resolution::Reduce;
    }
    match rightmost {
        None => Resolution::Reduce,
        Some(r) if r.level > tok_level => Resolution::Reduce,
        Some(r) if r.level == tok_level => match r.kind {
            AssocKind::Left | AssocKind::Nonassoc => Resolution::Reduce,
            AssocKind::Right => Resolution::Shift,
        },
        Some(_) => Resolution::Shift,
    }
}
