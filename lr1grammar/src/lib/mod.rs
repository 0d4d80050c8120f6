#![allow(clippy::new_without_default)]

//! The grammar side of a canonical LR(1) parser-table generator.
//!
//! A grammar file has two sections separated by a single blank line. The first declares
//! terminals, one per line, each optionally followed by an integer precedence and an
//! associativity code (`l`, `r` or `n`):
//!
//! ```text
//! t_eof
//! t_plus 1 l
//! t_times 2 l
//! t_num
//! ```
//!
//! The first terminal declared is the end-of-input terminal. The second section lists
//! productions, one per line, optionally followed by an explicit precedence:
//!
//! ```text
//! Expr > Expr t_plus Expr
//! Expr > Expr t_times Expr
//! Expr > t_num
//! ```
//!
//! The left-hand side of the first production is the start rule.
//!
//! The terminology used throughout this crate:
//!
//!   * A *token* is a terminal; tokens are numbered `0..tokens_len()` and token `0` is the
//!     end-of-input token.
//!   * A *rule* is a non-terminal; rules are numbered `0..rules_len()`.
//!   * A *production* is an ordered, non-empty sequence of *symbols*; productions are numbered
//!     `0..prods_len()` in file order.
//!
//! All names are interned by the [`Grammar`]: every other part of the generator refers to
//! symbols only through the index types [`TIdx`], [`RIdx`], [`PIdx`] and [`SIdx`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod ast;
pub mod firsts;
pub mod grammar;
mod idxnewtype;
pub mod parser;

pub use crate::{
    firsts::{Firsts, FirstsKind},
    grammar::{AssocKind, Grammar, Precedence, PrecedenceLevel},
    idxnewtype::{PIdx, RIdx, SIdx, TIdx},
    parser::{GrammarError, GrammarErrorClass, GrammarErrorKind},
};

/// A grammar symbol: either a rule (non-terminal) or a token (terminal).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol<StorageT> {
    Rule(RIdx<StorageT>),
    Token(TIdx<StorageT>),
}
