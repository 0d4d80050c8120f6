use std::{collections::HashMap, fmt::Write};

use log::debug;
use num_traits::{self, AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    ast::{self, GrammarAST},
    firsts::Firsts,
    parser::{GrammarParser, GrammarResult},
    PIdx, RIdx, SIdx, Symbol, TIdx,
};

pub type PrecedenceLevel = i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Precedence {
    pub level: PrecedenceLevel,
    pub kind: AssocKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AssocKind {
    Left,
    Right,
    Nonassoc,
}

impl AssocKind {
    /// Map a grammar file's associativity code (`l`, `r` or `n`) to an `AssocKind`.
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "l" => Some(AssocKind::Left),
            "r" => Some(AssocKind::Right),
            "n" => Some(AssocKind::Nonassoc),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            AssocKind::Left => "l",
            AssocKind::Right => "r",
            AssocKind::Nonassoc => "n",
        }
    }
}

/// Representation of a grammar. See the [top-level documentation](../index.html) for the
/// guarantees this struct makes about rules, tokens, productions, and symbols. A `Grammar` is
/// immutable once built.
#[derive(Debug)]
pub struct Grammar<StorageT = u32> {
    /// A mapping from `RIdx` -> `(name, line of the rule's first production)`.
    rule_names: Vec<(String, usize)>,
    /// A mapping from `TIdx` -> `(name, declaration line)`.
    token_names: Vec<(String, usize)>,
    /// A mapping from `TIdx` -> `Option<Precedence>`.
    token_precs: Vec<Option<Precedence>>,
    rules_len: RIdx<StorageT>,
    tokens_len: TIdx<StorageT>,
    prods_len: PIdx<StorageT>,
    /// A list of all productions, in file order.
    prods: Vec<Vec<Symbol<StorageT>>>,
    /// A mapping from rules to their productions, in file order.
    rules_prods: Vec<Vec<PIdx<StorageT>>>,
    /// A mapping from productions to their corresponding rule indexes.
    prods_rules: Vec<RIdx<StorageT>>,
    /// The line each production was declared on.
    prod_lines: Vec<usize>,
    /// The explicit precedence given at the end of each production's line, if any.
    prod_precs: Vec<Option<PrecedenceLevel>>,
    /// The rightmost token of each production, if it has one.
    prod_rightmost: Vec<Option<TIdx<StorageT>>>,
    /// The coarse FIRST relation recorded while reading productions.
    firsts: Firsts<StorageT>,
}

impl Grammar<u32> {
    /// Scan and validate the grammar text `s`.
    pub fn new(s: &str) -> GrammarResult<Self> {
        Grammar::new_with_storaget(s)
    }
}

impl<StorageT: 'static + PrimInt + Unsigned> Grammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Scan and validate the grammar text `s`, storing indices as `StorageT`. This will panic if
    /// `StorageT` is too small to hold every token, rule, production, or production length.
    pub fn new_with_storaget(s: &str) -> GrammarResult<Self> {
        let ast = GrammarParser::new(s).parse()?;
        Grammar::from_ast(&ast)
    }

    /// Build a grammar from an already scanned AST, validating it first.
    pub fn from_ast(ast: &GrammarAST) -> GrammarResult<Self> {
        ast.complete_and_validate()?;

        let storaget_max: usize = num_traits::cast(StorageT::max_value()).unwrap_or(usize::MAX);
        let longest_prod = ast.prods.iter().map(|p| p.symbols.len()).max().unwrap_or(0);
        if ast.tokens.len() > storaget_max
            || ast.rules.len() > storaget_max
            || ast.prods.len() > storaget_max
            || longest_prod > storaget_max
        {
            panic!("StorageT is not big enough to store this grammar.");
        }

        let token_map = ast
            .tokens
            .keys()
            .enumerate()
            .map(|(i, n)| (n.as_str(), TIdx(i.as_())))
            .collect::<HashMap<&str, TIdx<StorageT>>>();
        let rule_map = ast
            .rules
            .keys()
            .enumerate()
            .map(|(i, n)| (n.as_str(), RIdx(i.as_())))
            .collect::<HashMap<&str, RIdx<StorageT>>>();

        let token_names = ast
            .tokens
            .iter()
            .map(|(n, d)| (n.clone(), d.line))
            .collect::<Vec<_>>();
        let token_precs = ast
            .tokens
            .values()
            .map(|d| d.precedence())
            .collect::<Vec<_>>();
        let rule_names = ast
            .rules
            .iter()
            .map(|(n, pidxs)| (n.clone(), ast.prods[pidxs[0]].line))
            .collect::<Vec<_>>();
        let rules_prods = ast
            .rules
            .values()
            .map(|pidxs| pidxs.iter().map(|&i| PIdx(i.as_())).collect::<Vec<_>>())
            .collect::<Vec<Vec<PIdx<StorageT>>>>();

        let mut prods = Vec::with_capacity(ast.prods.len());
        let mut prods_rules = Vec::with_capacity(ast.prods.len());
        let mut prod_lines = Vec::with_capacity(ast.prods.len());
        let mut prod_precs = Vec::with_capacity(ast.prods.len());
        let mut prod_rightmost = Vec::with_capacity(ast.prods.len());
        for astprod in &ast.prods {
            let prod = astprod
                .symbols
                .iter()
                .map(|sym| match sym {
                    ast::Symbol::Token(n) => Symbol::Token(token_map[n.as_str()]),
                    ast::Symbol::Rule(n) => Symbol::Rule(rule_map[n.as_str()]),
                })
                .collect::<Vec<_>>();
            prod_rightmost.push(prod.iter().rev().find_map(|sym| match sym {
                Symbol::Token(tidx) => Some(*tidx),
                Symbol::Rule(_) => None,
            }));
            prod_precs.push(astprod.precedence);
            prods.push(prod);
            prods_rules.push(rule_map[astprod.lhs.as_str()]);
            prod_lines.push(astprod.line);
        }

        let mut grm = Grammar {
            rules_len: RIdx(rule_names.len().as_()),
            tokens_len: TIdx(token_names.len().as_()),
            prods_len: PIdx(prods.len().as_()),
            rule_names,
            token_names,
            token_precs,
            prods,
            rules_prods,
            prods_rules,
            prod_lines,
            prod_precs,
            prod_rightmost,
            firsts: Firsts::empty(),
        };
        let firsts = Firsts::approximate(&grm);
        grm.firsts = firsts;
        debug!(
            "{} tokens, {} rules, {} productions",
            usize::from(grm.tokens_len),
            usize::from(grm.rules_len),
            usize::from(grm.prods_len)
        );
        Ok(grm)
    }

    /// How many productions does this grammar have?
    pub fn prods_len(&self) -> PIdx<StorageT> {
        self.prods_len
    }

    /// Return an iterator which produces (in order from `0..self.prods_len()`) all this
    /// grammar's valid `PIdx`s.
    pub fn iter_pidxs(&self) -> impl Iterator<Item = PIdx<StorageT>> {
        // Every integer in 0..prods_len() fits in StorageT, so as_ is safe.
        (0..usize::from(self.prods_len())).map(|x| PIdx(x.as_()))
    }

    /// Get the sequence of symbols for production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod(&self, pidx: PIdx<StorageT>) -> &[Symbol<StorageT>] {
        &self.prods[usize::from(pidx)]
    }

    /// How many symbols does production `pidx` have? Panics if `pidx` doesn't exist.
    pub fn prod_len(&self, pidx: PIdx<StorageT>) -> SIdx<StorageT> {
        SIdx(self.prods[usize::from(pidx)].len().as_())
    }

    /// Return the rule index of the production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod_to_rule(&self, pidx: PIdx<StorageT>) -> RIdx<StorageT> {
        self.prods_rules[usize::from(pidx)]
    }

    /// Return the precedence level given explicitly at the end of production `pidx`'s line, if
    /// any. This does not include the precedence of the production's tokens: see
    /// [`Grammar::prod_rightmost_token`].
    pub fn prod_precedence(&self, pidx: PIdx<StorageT>) -> Option<PrecedenceLevel> {
        self.prod_precs[usize::from(pidx)]
    }

    /// Return the rightmost token in production `pidx`, or `None` if it consists only of rules.
    pub fn prod_rightmost_token(&self, pidx: PIdx<StorageT>) -> Option<TIdx<StorageT>> {
        self.prod_rightmost[usize::from(pidx)]
    }

    /// Return the declared precedence of production `pidx`'s rightmost token, if it has both a
    /// rightmost token and that token has a precedence.
    pub fn prod_rightmost_precedence(&self, pidx: PIdx<StorageT>) -> Option<Precedence> {
        self.prod_rightmost_token(pidx)
            .and_then(|tidx| self.token_precedence(tidx))
    }

    /// The line of the grammar file production `pidx` was declared on.
    pub fn prod_line(&self, pidx: PIdx<StorageT>) -> usize {
        self.prod_lines[usize::from(pidx)]
    }

    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        self.rules_len
    }

    /// Return an iterator which produces (in order from `0..self.rules_len()`) all this
    /// grammar's valid `RIdx`s.
    pub fn iter_rules(&self) -> impl Iterator<Item = RIdx<StorageT>> {
        (0..usize::from(self.rules_len())).map(|x| RIdx(x.as_()))
    }

    /// Return the productions for rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_to_prods(&self, ridx: RIdx<StorageT>) -> &[PIdx<StorageT>] {
        &self.rules_prods[usize::from(ridx)]
    }

    /// Return the name of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name_str(&self, ridx: RIdx<StorageT>) -> &str {
        &self.rule_names[usize::from(ridx)].0
    }

    /// Return the index of the rule named `n` or `None` if it doesn't exist.
    pub fn rule_idx(&self, n: &str) -> Option<RIdx<StorageT>> {
        self.rule_names
            .iter()
            .position(|(x, _)| x == n)
            .map(|x| RIdx(x.as_()))
    }

    /// The start rule: the left-hand side of the grammar's first production.
    pub fn start_rule_idx(&self) -> RIdx<StorageT> {
        RIdx(StorageT::zero())
    }

    /// How many tokens does this grammar have?
    pub fn tokens_len(&self) -> TIdx<StorageT> {
        self.tokens_len
    }

    /// Return an iterator which produces (in order from `0..self.tokens_len()`) all this
    /// grammar's valid `TIdx`s.
    pub fn iter_tidxs(&self) -> impl Iterator<Item = TIdx<StorageT>> {
        (0..usize::from(self.tokens_len())).map(|x| TIdx(x.as_()))
    }

    /// Return the index of the end-of-input token (the first token declared).
    pub fn eof_token_idx(&self) -> TIdx<StorageT> {
        TIdx(StorageT::zero())
    }

    /// Return the name of token `tidx`. Panics if `tidx` doesn't exist.
    pub fn token_name(&self, tidx: TIdx<StorageT>) -> &str {
        &self.token_names[usize::from(tidx)].0
    }

    /// The line of the grammar file token `tidx` was declared on.
    pub fn token_line(&self, tidx: TIdx<StorageT>) -> usize {
        self.token_names[usize::from(tidx)].1
    }

    /// Return the precedence of token `tidx` (where `None` indicates "no precedence specified").
    /// Panics if `tidx` doesn't exist.
    pub fn token_precedence(&self, tidx: TIdx<StorageT>) -> Option<Precedence> {
        self.token_precs[usize::from(tidx)]
    }

    /// Return the index of the token named `n` or `None` if it doesn't exist.
    pub fn token_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.token_names
            .iter()
            .position(|(x, _)| x == n)
            .map(|x| TIdx(x.as_()))
    }

    /// The coarse FIRST relation: for every rule, the leftmost token of each of its productions.
    pub fn firsts(&self) -> &Firsts<StorageT> {
        &self.firsts
    }

    /// Return the name of `sym`.
    pub fn symbol_name(&self, sym: Symbol<StorageT>) -> &str {
        match sym {
            Symbol::Rule(ridx) => self.rule_name_str(ridx),
            Symbol::Token(tidx) => self.token_name(tidx),
        }
    }

    /// Returns the string representation of a given production `pidx`, in grammar file syntax.
    pub fn pp_prod(&self, pidx: PIdx<StorageT>) -> String {
        let mut sprod = String::new();
        sprod.push_str(self.rule_name_str(self.prod_to_rule(pidx)));
        sprod.push_str(" >");
        for sym in self.prod(pidx) {
            sprod.push(' ');
            sprod.push_str(self.symbol_name(*sym));
        }
        sprod
    }

    /// Pretty print the tokens (with their precedences), rules, and productions.
    pub fn pp(&self) -> String {
        let mut o = String::new();
        o.push_str("Terminals:\n");
        for tidx in self.iter_tidxs() {
            write!(o, "  {}: {}", usize::from(tidx), self.token_name(tidx)).ok();
            if let Some(prec) = self.token_precedence(tidx) {
                write!(o, " {} {}", prec.level, prec.kind.code()).ok();
            }
            if tidx == self.eof_token_idx() {
                o.push_str(" (end of input)");
            }
            o.push('\n');
        }
        o.push_str("Non-terminals:\n");
        for ridx in self.iter_rules() {
            write!(o, "  {}: {}", usize::from(ridx), self.rule_name_str(ridx)).ok();
            if ridx == self.start_rule_idx() {
                o.push_str(" (start)");
            }
            o.push('\n');
        }
        o.push_str("Productions:\n");
        for pidx in self.iter_pidxs() {
            write!(o, "  {}: {}", usize::from(pidx), self.pp_prod(pidx)).ok();
            if let Some(level) = self.prod_precedence(pidx) {
                write!(o, " {}", level).ok();
            }
            o.push('\n');
        }
        o
    }
}

#[cfg(test)]
mod test {
    use super::{AssocKind, Grammar, Precedence};
    use crate::{PIdx, RIdx, SIdx, Symbol, TIdx};

    #[test]
    fn test_indices() {
        let grm = Grammar::new(
            "t_eof\nt_lp\nt_rp\n\nGoal > List\nList > List Pair\nList > Pair\nPair > t_lp Pair t_rp\nPair > t_lp t_rp\n",
        )
        .unwrap();
        assert_eq!(grm.tokens_len(), TIdx(3));
        assert_eq!(grm.rules_len(), RIdx(3));
        assert_eq!(grm.prods_len(), PIdx(5));
        assert_eq!(grm.eof_token_idx(), grm.token_idx("t_eof").unwrap());
        assert_eq!(grm.start_rule_idx(), grm.rule_idx("Goal").unwrap());

        let list = grm.rule_idx("List").unwrap();
        let pair = grm.rule_idx("Pair").unwrap();
        assert_eq!(grm.rule_to_prods(list), &[PIdx(1), PIdx(2)]);
        assert_eq!(grm.rule_to_prods(pair), &[PIdx(3), PIdx(4)]);
        assert_eq!(grm.prod_to_rule(PIdx(4)), pair);
        assert_eq!(
            grm.prod(PIdx(1)),
            &[Symbol::Rule(list), Symbol::Rule(pair)]
        );
        assert_eq!(grm.prod_len(PIdx(3)), SIdx(3));
        assert_eq!(grm.prod_line(PIdx(3)), 8);
        assert_eq!(grm.token_line(TIdx(2)), 3);
        assert_eq!(grm.pp_prod(PIdx(3)), "Pair > t_lp Pair t_rp");
        assert_eq!(grm.rule_idx("t_lp"), None);
        assert_eq!(grm.token_idx("Pair"), None);
    }

    #[test]
    fn test_precedences() {
        let grm = Grammar::new(
            "t_eof\nt_plus 1 l\nt_pow 3 r\nt_num\nt_neg n\n\nE > E t_plus E\nE > E t_pow E\nE > t_num\nE > t_neg E 5\nE > t_plus E t_num\nE > t_plus t_num 2\nE > E E\n",
        )
        .unwrap();
        let plus = grm.token_idx("t_plus").unwrap();
        let pow = grm.token_idx("t_pow").unwrap();
        let num = grm.token_idx("t_num").unwrap();
        let neg = grm.token_idx("t_neg").unwrap();
        assert_eq!(
            grm.token_precedence(plus),
            Some(Precedence {
                level: 1,
                kind: AssocKind::Left
            })
        );
        assert_eq!(grm.token_precedence(num), None);

        assert_eq!(grm.prod_rightmost_token(PIdx(0)), Some(plus));
        assert_eq!(grm.prod_precedence(PIdx(0)), None);
        assert_eq!(grm.prod_rightmost_precedence(PIdx(0)), grm.token_precedence(plus));
        assert_eq!(
            grm.prod_rightmost_precedence(PIdx(1)),
            Some(Precedence {
                level: 3,
                kind: AssocKind::Right
            })
        );
        assert_eq!(grm.prod_rightmost_token(PIdx(1)), Some(pow));
        // The rightmost token has no precedence.
        assert_eq!(grm.prod_rightmost_token(PIdx(2)), Some(num));
        assert_eq!(grm.prod_rightmost_precedence(PIdx(2)), None);
        // An explicit precedence is kept apart from the rightmost token's.
        assert_eq!(grm.prod_precedence(PIdx(3)), Some(5));
        assert_eq!(
            grm.prod_rightmost_precedence(PIdx(3)),
            Some(Precedence {
                level: 0,
                kind: AssocKind::Nonassoc
            })
        );
        assert_eq!(grm.prod_rightmost_token(PIdx(3)), Some(neg));
        // Only the rightmost token counts, even if an earlier one has a precedence.
        assert_eq!(grm.prod_rightmost_precedence(PIdx(4)), None);
        assert_eq!(grm.prod_precedence(PIdx(5)), Some(2));
        assert_eq!(grm.prod_rightmost_precedence(PIdx(5)), None);
        // No tokens at all.
        assert_eq!(grm.prod_rightmost_token(PIdx(6)), None);
        assert_eq!(grm.prod_precedence(PIdx(6)), None);
    }

    #[test]
    fn test_pp() {
        let grm = Grammar::new("t_eof\nt_a 2 l\n\nS > t_a S 4\nS > t_a\n").unwrap();
        assert_eq!(
            grm.pp(),
            "Terminals:\n  0: t_eof (end of input)\n  1: t_a 2 l\nNon-terminals:\n  0: S (start)\nProductions:\n  0: S > t_a S 4\n  1: S > t_a\n"
        );
    }

    #[test]
    fn test_u8_storage() {
        let grm = Grammar::<u8>::new_with_storaget("t_eof\nt_a\n\nS > t_a\n").unwrap();
        assert_eq!(grm.token_idx("t_a"), Some(TIdx(1u8)));
    }

    #[test]
    fn test_errors_propagate() {
        let errs = Grammar::new("t_eof\n\nS > T\n").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 3);
    }
}
