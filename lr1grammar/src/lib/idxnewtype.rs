// Index newtypes exposing a `usize`/`u32` API over a (possibly smaller) `StorageT`.

use std::{fmt, mem::size_of};

use num_traits::{self, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $n<T>(pub T);

        impl<T: PrimInt + Unsigned> From<$n<T>> for usize {
            fn from(st: $n<T>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<T>());
                num_traits::cast(st.0).unwrap()
            }
        }

        impl<T: PrimInt + Unsigned> From<$n<T>> for u32 {
            fn from(st: $n<T>) -> Self {
                debug_assert!(size_of::<u32>() >= size_of::<T>());
                num_traits::cast(st.0).unwrap()
            }
        }

        impl<T: PrimInt + Unsigned> fmt::Display for $n<T> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", usize::from(*self))
            }
        }
    }
}

IdxNewtype!(
    /// The index of a rule (a non-terminal). Rules are numbered in the order their names first
    /// appear as the left-hand side of a production.
    RIdx);
IdxNewtype!(
    /// The index of a production, in the order productions appear in the grammar file.
    PIdx);
IdxNewtype!(
    /// The position of the dot within a production: `SIdx(0)` is before the first symbol and
    /// `SIdx(len)` marks a completed production.
    SIdx);
IdxNewtype!(
    /// The index of a terminal, in declaration order. `TIdx(0)` is always the end-of-input
    /// terminal.
    TIdx);
