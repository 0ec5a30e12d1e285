use std::fmt::Debug;

use crate::case::{Assertions, Context, Verdict};
use crate::error::Error;

// Pairwise so elements only need `PartialEq`, not `Hash` or `Ord`.
fn all_unique<T: PartialEq,>(items: &[T],) -> bool {
    items.iter().enumerate().all(|(index, item,)| !items[index + 1..].contains(item,),)
}

/// Duplicate detection.
pub trait UniqueMixins: Assertions {
    #[track_caller]
    fn assert_unique<T: PartialEq + Debug,>(&self, items: &[T], ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 1] = [&items,];
        self.assert_that("assert_unique", ctx.args(&args,), || {
            Ok(Verdict::check(all_unique(items,), || format!("Elements in {items:?} are not unique"),),)
        },)
    }

    #[track_caller]
    fn assert_not_unique<T: PartialEq + Debug,>(&self, items: &[T], ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 1] = [&items,];
        self.assert_that("assert_not_unique", ctx.args(&args,), || {
            Ok(Verdict::check(!all_unique(items,), || format!("Elements in {items:?} are unique"),),)
        },)
    }
}

impl<A: Assertions + ?Sized,> UniqueMixins for A {}
