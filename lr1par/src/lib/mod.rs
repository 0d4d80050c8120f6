//! A run-time for canonical LR(1) tables built by `lr1table`.
//!
//! [`Parser`] drives a [`StateTable`](lr1table::StateTable) over a sequence of token indices,
//! calling user supplied [`Actions`] on each shift and reduction. Reductions are identified by
//! their [`ReductionEntry`](lr1table::ReductionEntry): depending on how the table was keyed, one
//! entry may stand for several productions with the same left-hand side and length, so semantic
//! actions should dispatch on the entry's rule and, if necessary, on the values they are given.
//!
//! [`TableArtifact`] packages a table with its grammar's names so that it can be written to, and
//! read back from, disk.

pub mod artifact;
pub mod parser;

pub use crate::{
    artifact::{ArtifactError, TableArtifact, FORMAT_VERSION},
    parser::{Actions, ParseError, ParseErrorKind, Parser},
};
