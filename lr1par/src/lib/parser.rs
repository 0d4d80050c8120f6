use std::{error::Error, fmt, hash::Hash};

use lr1grammar::TIdx;
use lr1table::{Action, ReductionEntry, StIdx, StateTable};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

/// The semantic actions a [`Parser`] calls as it shifts tokens and performs reductions.
pub trait Actions<StorageT> {
    type Value;

    /// Produce the value for the token `tidx` at position `laidx` of the input.
    fn shift(&mut self, laidx: usize, tidx: TIdx<StorageT>) -> Self::Value;

    /// Produce the value for a reduction. `args` holds the values of the popped stack entries,
    /// leftmost first, and has exactly `entry.pop_count()` elements.
    fn reduce(&mut self, entry: &ReductionEntry<StorageT>, args: Vec<Self::Value>) -> Self::Value;
}

/// Actions which compute nothing: parsing with these only recognises input.
struct Recogniser;

impl<StorageT> Actions<StorageT> for Recogniser {
    type Value = ();

    fn shift(&mut self, _: usize, _: TIdx<StorageT>) {}

    fn reduce(&mut self, _: &ReductionEntry<StorageT>, _: Vec<()>) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The table has no action for the current state and token.
    SyntaxError,
    /// The input ran out before the parser reached an accept action.
    UnexpectedEnd,
    /// A reduction led to a state with no goto for the reduced rule.
    MissingGoto,
    /// The table asked for something no well-formed table can: a reduction that doesn't exist,
    /// one that pops more than the stack holds, or an accept with nothing reduced.
    MalformedTable,
}

/// A parse error: what went wrong, in which state, and at which position in the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseError<StorageT> {
    kind: ParseErrorKind,
    stidx: StIdx,
    laidx: usize,
    tidx: Option<TIdx<StorageT>>,
}

impl<StorageT: Copy> ParseError<StorageT> {
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// The state the parser was in when the error occurred.
    pub fn stidx(&self) -> StIdx {
        self.stidx
    }

    /// The position in the input of the token the error occurred at. For
    /// `ParseErrorKind::UnexpectedEnd` this is the length of the input.
    pub fn laidx(&self) -> usize {
        self.laidx
    }

    /// The token the error occurred at, or `None` if the input ran out.
    pub fn tidx(&self) -> Option<TIdx<StorageT>> {
        self.tidx
    }
}

impl<StorageT: fmt::Debug> Error for ParseError<StorageT> {}

impl<StorageT> fmt::Display for ParseError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ParseErrorKind::SyntaxError => write!(
                f,
                "Syntax error at token {} in state {}",
                self.laidx,
                usize::from(self.stidx)
            ),
            ParseErrorKind::UnexpectedEnd => write!(
                f,
                "Unexpected end of input in state {}",
                usize::from(self.stidx)
            ),
            ParseErrorKind::MissingGoto => write!(
                f,
                "No goto from state {} at token {}",
                usize::from(self.stidx),
                self.laidx
            ),
            ParseErrorKind::MalformedTable => write!(
                f,
                "Malformed table in state {} at token {}",
                usize::from(self.stidx),
                self.laidx
            ),
        }
    }
}

fn malformed<StorageT>(stidx: StIdx, laidx: usize, tidx: TIdx<StorageT>) -> ParseError<StorageT> {
    ParseError {
        kind: ParseErrorKind::MalformedTable,
        stidx,
        laidx,
        tidx: Some(tidx),
    }
}

/// A table-driven LR parser over a [`StateTable`]. Input is a sequence of token indices which
/// must end with the grammar's end-of-input token for the parser to be able to accept it.
pub struct Parser<'a, StorageT: Eq + Hash> {
    stable: &'a StateTable<StorageT>,
}

impl<'a, StorageT: 'static + Hash + PrimInt + Unsigned> Parser<'a, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(stable: &'a StateTable<StorageT>) -> Self {
        Parser { stable }
    }

    /// Check whether `toks` is a sentence of the grammar.
    pub fn recognise(&self, toks: &[TIdx<StorageT>]) -> Result<(), ParseError<StorageT>> {
        self.parse(toks, &mut Recogniser)
    }

    /// Parse `toks`, calling `actions` for each shift and reduction. On success, return the
    /// value on top of the value stack when the accept action is reached.
    pub fn parse<A: Actions<StorageT>>(
        &self,
        toks: &[TIdx<StorageT>],
        actions: &mut A,
    ) -> Result<A::Value, ParseError<StorageT>> {
        let mut pstack = vec![StIdx::from(0u32)];
        let mut vstack: Vec<A::Value> = Vec::new();
        let mut laidx = 0;
        loop {
            let stidx = pstack[pstack.len() - 1];
            let la_tidx = match toks.get(laidx) {
                Some(&t) => t,
                None => {
                    return Err(ParseError {
                        kind: ParseErrorKind::UnexpectedEnd,
                        stidx,
                        laidx,
                        tidx: None,
                    })
                }
            };

            match self.stable.action(stidx, la_tidx) {
                Some(Action::Shift(next)) => {
                    log::trace!("Shift {} -> {}", usize::from(la_tidx), usize::from(next));
                    vstack.push(actions.shift(laidx, la_tidx));
                    pstack.push(next);
                    laidx += 1;
                }
                Some(Action::Reduce(redidx)) => {
                    let entry = match self.stable.reductions().get(redidx) {
                        Some(e) if e.pop_count() > 0 && e.pop_count() < pstack.len() => e,
                        _ => return Err(malformed(stidx, laidx, la_tidx)),
                    };
                    log::trace!(
                        "Reduce {} (rule {}, pop {})",
                        usize::from(redidx),
                        usize::from(entry.lhs()),
                        entry.pop_count()
                    );
                    // State 0 is never popped.
                    let pop_idx = pstack.len() - entry.pop_count();
                    pstack.truncate(pop_idx);
                    let args = vstack.split_off(pop_idx - 1);
                    let prior = pstack[pstack.len() - 1];
                    match self.stable.goto(prior, entry.lhs()) {
                        Some(next) => {
                            vstack.push(actions.reduce(entry, args));
                            pstack.push(next);
                        }
                        None => {
                            return Err(ParseError {
                                kind: ParseErrorKind::MissingGoto,
                                stidx: prior,
                                laidx,
                                tidx: Some(la_tidx),
                            })
                        }
                    }
                }
                Some(Action::Accept) => {
                    log::trace!("Accept");
                    return match vstack.pop() {
                        Some(v) => Ok(v),
                        None => Err(malformed(stidx, laidx, la_tidx)),
                    };
                }
                None => {
                    return Err(ParseError {
                        kind: ParseErrorKind::SyntaxError,
                        stidx,
                        laidx,
                        tidx: Some(la_tidx),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Actions, ParseErrorKind, Parser};
    use lr1grammar::{Grammar, TIdx};
    use lr1table::{from_grammar, Options, ReductionEntry};

    /// Builds a bracketed rendering of the parse.
    struct Brackets<'a>(&'a Grammar<u32>);

    impl Actions<u32> for Brackets<'_> {
        type Value = String;

        fn shift(&mut self, _: usize, tidx: TIdx<u32>) -> String {
            self.0.token_name(tidx).to_owned()
        }

        fn reduce(&mut self, entry: &ReductionEntry<u32>, args: Vec<String>) -> String {
            format!("{}({})", self.0.rule_name_str(entry.lhs()), args.join(" "))
        }
    }

    fn toks(grm: &Grammar<u32>, s: &str) -> Vec<TIdx<u32>> {
        s.split_whitespace()
            .map(|n| grm.token_idx(n).unwrap())
            .collect()
    }

    const LIST: &str = "t_eof\nt_a\nt_comma\n\nS > L\nL > L t_comma t_a\nL > t_a\n";

    #[test]
    fn test_values() {
        let grm = Grammar::new(LIST).unwrap();
        let (_, st) = from_grammar(&grm, Options::default());
        let p = Parser::new(&st);
        assert_eq!(
            p.parse(&toks(&grm, "t_a t_comma t_a t_eof"), &mut Brackets(&grm)),
            Ok("L(L(t_a) t_comma t_a)".to_owned())
        );
    }

    #[test]
    fn test_errors() {
        let grm = Grammar::new(LIST).unwrap();
        let (_, st) = from_grammar(&grm, Options::default());
        let p = Parser::new(&st);

        let e = p.recognise(&toks(&grm, "t_a t_a t_eof")).unwrap_err();
        assert_eq!(e.kind(), ParseErrorKind::SyntaxError);
        assert_eq!(e.laidx(), 1);
        assert_eq!(e.tidx(), grm.token_idx("t_a"));

        let e = p.recognise(&toks(&grm, "t_a t_comma")).unwrap_err();
        assert_eq!(e.kind(), ParseErrorKind::UnexpectedEnd);
        assert_eq!(e.laidx(), 2);
        assert_eq!(e.tidx(), None);

        let e = p.recognise(&[]).unwrap_err();
        assert_eq!(e.kind(), ParseErrorKind::UnexpectedEnd);
        assert_eq!(e.to_string(), "Unexpected end of input in state 0");
    }

    #[test]
    fn test_token_out_of_range() {
        let grm = Grammar::new(LIST).unwrap();
        let (_, st) = from_grammar(&grm, Options::default());
        // Without a bounds check this would read state 1's entry for t_a.
        let e = Parser::new(&st).recognise(&[TIdx(4)]).unwrap_err();
        assert_eq!(e.kind(), ParseErrorKind::SyntaxError);
        assert_eq!(e.laidx(), 0);
    }
}
