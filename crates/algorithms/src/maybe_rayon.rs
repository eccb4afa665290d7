//! Row-parallel execution with an optional rayon backend.
//!
//! With the `parallel` feature the row loops of the distance transform,
//! the buffer scan and the change classifier run on rayon's pool. Without
//! it, `into_par_iter()` degrades to `into_iter()` so the same
//! `map(..).collect()` chains compile against plain iterators.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod serial {
    /// Serial replacement for `rayon::iter::IntoParallelIterator`
    pub trait IntoParallelIterator {
        type Iter: Iterator<Item = Self::Item>;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use serial::*;
