use std::{collections::BTreeSet, hash::Hash};

use lr1grammar::{Firsts, Grammar, PIdx, SIdx, Symbol, TIdx};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

/// An LR(1) item: a production, the position of the dot within it, and a single lookahead
/// token.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Item<StorageT> {
    pub pidx: PIdx<StorageT>,
    pub dot: SIdx<StorageT>,
    pub la: TIdx<StorageT>,
}

/// A set of LR(1) items. Two itemsets containing the same items are equal (and hash
/// identically) regardless of the order in which the items were added.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Itemset<StorageT> {
    pub items: BTreeSet<Item<StorageT>>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Itemset<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a blank Itemset.
    pub fn new() -> Self {
        Itemset {
            items: BTreeSet::new(),
        }
    }

    /// Add the item `(pidx, dot, la)` to this itemset. Returns true if it was not already
    /// present.
    pub fn add(&mut self, pidx: PIdx<StorageT>, dot: SIdx<StorageT>, la: TIdx<StorageT>) -> bool {
        self.items.insert(Item { pidx, dot, la })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item<StorageT>> {
        self.items.iter()
    }

    /// The symbol immediately after the dot in `item`, or `None` if the item is complete.
    pub fn dot_symbol(grm: &Grammar<StorageT>, item: &Item<StorageT>) -> Option<Symbol<StorageT>> {
        grm.prod(item.pidx).get(usize::from(item.dot)).copied()
    }

    /// The distinct symbols appearing immediately after a dot in this itemset, in item order.
    pub fn dot_symbols(&self, grm: &Grammar<StorageT>) -> Vec<Symbol<StorageT>> {
        let mut syms = Vec::new();
        for item in &self.items {
            if let Some(sym) = Itemset::dot_symbol(grm, item) {
                if !syms.contains(&sym) {
                    syms.push(sym);
                }
            }
        }
        syms
    }

    /// Close this itemset in place. For every item `[A > α . B β, a]`, add `[B > . γ, b]` for
    /// each production `B > γ` and each lookahead `b` (see [`lookaheads`]). Newly added items are
    /// themselves queued until no more items can be added.
    pub fn close(&mut self, grm: &Grammar<StorageT>, firsts: &Firsts<StorageT>) {
        let mut todo = self.items.iter().copied().collect::<Vec<_>>();
        let mut ctx = Vob::from_elem(false, usize::from(grm.tokens_len()));
        let zero = SIdx(StorageT::zero());
        while let Some(item) = todo.pop() {
            let prod = grm.prod(item.pidx);
            let dot = usize::from(item.dot);
            let ridx = match prod.get(dot) {
                Some(Symbol::Rule(ridx)) => *ridx,
                _ => continue,
            };
            lookaheads(firsts, &prod[dot + 1..], item.la, &mut ctx);
            for &pidx in grm.rule_to_prods(ridx) {
                for bidx in ctx.iter_set_bits(..) {
                    // ctx is exactly tokens_len bits long, so as_ is safe.
                    let new = Item {
                        pidx,
                        dot: zero,
                        la: TIdx(bidx.as_()),
                    };
                    if self.items.insert(new) {
                        todo.push(new);
                    }
                }
            }
        }
    }

    /// Return the closed itemset reached from `self` over `sym`: every item whose dot precedes
    /// `sym` is advanced past it, and the result closed. The result is empty if no item in
    /// `self` has its dot before `sym`.
    pub fn goto(
        &self,
        grm: &Grammar<StorageT>,
        firsts: &Firsts<StorageT>,
        sym: Symbol<StorageT>,
    ) -> Self {
        let mut newis = Itemset::new();
        for item in &self.items {
            if Itemset::dot_symbol(grm, item) == Some(sym) {
                newis.add(
                    item.pidx,
                    SIdx((usize::from(item.dot) + 1).as_()),
                    item.la,
                );
            }
        }
        newis.close(grm, firsts);
        newis
    }
}

/// Compute into `ctx` the lookaheads of items spawned for a rule followed by `rest`: the first
/// token in `rest` if a token is found before any rule with a non-empty first set, that rule's
/// first set otherwise, or `la` if `rest` yields nothing.
pub(crate) fn lookaheads<StorageT: 'static + PrimInt + Unsigned>(
    firsts: &Firsts<StorageT>,
    rest: &[Symbol<StorageT>],
    la: TIdx<StorageT>,
    ctx: &mut Vob,
) where
    usize: AsPrimitive<StorageT>,
{
    ctx.set_all(false);
    for sym in rest {
        match *sym {
            Symbol::Token(tidx) => {
                ctx.set(usize::from(tidx), true);
                return;
            }
            Symbol::Rule(ridx) => {
                if !firsts.is_empty(ridx) {
                    ctx.or(firsts.firsts(ridx));
                    return;
                }
            }
        }
    }
    ctx.set(usize::from(la), true);
}

#[cfg(test)]
pub(crate) mod test {
    use super::{Item, Itemset};
    use lr1grammar::{Firsts, FirstsKind, Grammar, SIdx, Symbol};

    /// Assert that `is` contains production `prod_off` of rule `rn` with dot `dot` for exactly the
    /// lookaheads `la`.
    pub(crate) fn state_exists(
        grm: &Grammar<u32>,
        is: &Itemset<u32>,
        rn: &str,
        prod_off: usize,
        dot: u32,
        la: Vec<&str>,
    ) {
        let pidx = grm.rule_to_prods(grm.rule_idx(rn).unwrap())[prod_off];
        for tidx in grm.iter_tidxs() {
            let n = grm.token_name(tidx);
            let present = is.items.contains(&Item {
                pidx,
                dot: SIdx(dot),
                la: tidx,
            });
            let expected = la.contains(&n);
            if present && !expected {
                panic!(
                    "{} is a lookahead of production {} of {} (dot {}) when it shouldn't be",
                    n, prod_off, rn, dot
                );
            } else if !present && expected {
                panic!(
                    "{} is not a lookahead of production {} of {} (dot {}) when it should be",
                    n, prod_off, rn, dot
                );
            }
        }
    }

    // Taken from the Dragon book, p. 261 (the canonical LR(1) example).
    const DRAGON: &str = "t_eof\nt_c\nt_d\n\nS > C C\nC > t_c C\nC > t_d\n";

    fn seed(grm: &Grammar<u32>) -> Itemset<u32> {
        let mut is = Itemset::new();
        for &pidx in grm.rule_to_prods(grm.start_rule_idx()) {
            is.add(pidx, SIdx(0), grm.eof_token_idx());
        }
        is
    }

    #[test]
    fn test_closure() {
        let grm = Grammar::new(DRAGON).unwrap();
        let mut is = seed(&grm);
        is.close(&grm, grm.firsts());

        state_exists(&grm, &is, "S", 0, 0, vec!["t_eof"]);
        state_exists(&grm, &is, "C", 0, 0, vec!["t_c", "t_d"]);
        state_exists(&grm, &is, "C", 1, 0, vec!["t_c", "t_d"]);
        assert_eq!(is.len(), 5);
    }

    #[test]
    fn test_closure_idempotent() {
        let grm = Grammar::new(DRAGON).unwrap();
        let mut is = seed(&grm);
        is.close(&grm, grm.firsts());
        let once = is.clone();
        is.close(&grm, grm.firsts());
        assert_eq!(is, once);
    }

    #[test]
    fn test_goto() {
        let grm = Grammar::new(DRAGON).unwrap();
        let mut is = seed(&grm);
        is.close(&grm, grm.firsts());

        let c = Symbol::Rule(grm.rule_idx("C").unwrap());
        let goto_c = is.goto(&grm, grm.firsts(), c);
        state_exists(&grm, &goto_c, "S", 0, 1, vec!["t_eof"]);
        state_exists(&grm, &goto_c, "C", 0, 0, vec!["t_eof"]);
        state_exists(&grm, &goto_c, "C", 1, 0, vec!["t_eof"]);
        assert_eq!(goto_c.len(), 3);

        let tc = Symbol::Token(grm.token_idx("t_c").unwrap());
        let goto_tc = is.goto(&grm, grm.firsts(), tc);
        state_exists(&grm, &goto_tc, "C", 0, 1, vec!["t_c", "t_d"]);
        state_exists(&grm, &goto_tc, "C", 0, 0, vec!["t_c", "t_d"]);
        state_exists(&grm, &goto_tc, "C", 1, 0, vec!["t_c", "t_d"]);
        assert_eq!(goto_tc.len(), 6);

        // No item in the state has its dot before t_eof.
        let eof = Symbol::Token(grm.eof_token_idx());
        assert!(is.goto(&grm, grm.firsts(), eof).is_empty());
    }

    #[test]
    fn test_item_order_does_not_matter() {
        let grm = Grammar::new(DRAGON).unwrap();
        let mut a = Itemset::new();
        let mut b = Itemset::new();
        let pidxs = grm.iter_pidxs().collect::<Vec<_>>();
        for &pidx in &pidxs {
            a.add(pidx, SIdx(0), grm.eof_token_idx());
        }
        for &pidx in pidxs.iter().rev() {
            b.add(pidx, SIdx(0), grm.eof_token_idx());
        }
        assert_eq!(a, b);
        assert!(!a.add(pidxs[0], SIdx(0), grm.eof_token_idx()));
    }

    #[test]
    fn test_lookahead_skips_tokenless_rules() {
        // No production of `List` contains a token, so its approximate first set is empty and
        // the lookahead of the `Wrap` items spawned by `Goal > . Wrap List t_x` comes from t_x.
        let grm = Grammar::new(
            "t_eof\nt_lp\nt_rp\nt_x\n\nGoal > Wrap List t_x\nWrap > Pair\nList > Pair Pair\nPair > t_lp t_rp\n",
        )
        .unwrap();
        let mut is = seed(&grm);
        is.close(&grm, grm.firsts());
        state_exists(&grm, &is, "Wrap", 0, 0, vec!["t_x"]);
        state_exists(&grm, &is, "Pair", 0, 0, vec!["t_x"]);

        let mut exact = seed(&grm);
        exact.close(&grm, &Firsts::new(&grm, FirstsKind::Exact));
        state_exists(&grm, &exact, "Wrap", 0, 0, vec!["t_lp"]);
        state_exists(&grm, &exact, "Pair", 0, 0, vec!["t_lp"]);
    }
}
