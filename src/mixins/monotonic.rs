use std::fmt::Debug;

use crate::case::{Assertions, Context, Verdict};
use crate::error::Error;

fn monotonic<T: PartialOrd,>(sequence: &[T], holds: impl Fn(&T, &T,) -> bool,) -> bool {
    sequence.windows(2,).all(|pair| holds(&pair[0], &pair[1],),)
}

fn increasing<T: PartialOrd,>(sequence: &[T], strict: bool,) -> bool {
    if strict { monotonic(sequence, |a, b| a < b,) } else { monotonic(sequence, |a, b| a <= b,) }
}

fn decreasing<T: PartialOrd,>(sequence: &[T], strict: bool,) -> bool {
    if strict { monotonic(sequence, |a, b| a > b,) } else { monotonic(sequence, |a, b| a >= b,) }
}

fn describe<T: Debug,>(sequence: &[T], negated: bool, strict: bool, direction: &str,) -> String {
    let not = if negated { "not " } else { "" };
    let strictly = if strict { "strictly " } else { "" };
    format!("Elements in {sequence:?} are {not}{strictly}monotonically {direction}")
}

/// Ordering of a sequence. Empty and single-element sequences are
/// monotonic in every direction.
pub trait MonotonicMixins: Assertions {
    #[track_caller]
    fn assert_monotonic_increasing<T: PartialOrd + Debug,>(
        &self,
        sequence: &[T],
        strict: bool,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&sequence, &strict,];
        self.assert_that("assert_monotonic_increasing", ctx.args(&args,), || {
            Ok(Verdict::check(increasing(sequence, strict,), || describe(sequence, true, strict, "increasing",),),)
        },)
    }

    #[track_caller]
    fn assert_not_monotonic_increasing<T: PartialOrd + Debug,>(
        &self,
        sequence: &[T],
        strict: bool,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&sequence, &strict,];
        self.assert_that("assert_not_monotonic_increasing", ctx.args(&args,), || {
            Ok(Verdict::check(!increasing(sequence, strict,), || describe(sequence, false, strict, "increasing",),),)
        },)
    }

    #[track_caller]
    fn assert_monotonic_decreasing<T: PartialOrd + Debug,>(
        &self,
        sequence: &[T],
        strict: bool,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&sequence, &strict,];
        self.assert_that("assert_monotonic_decreasing", ctx.args(&args,), || {
            Ok(Verdict::check(decreasing(sequence, strict,), || describe(sequence, true, strict, "decreasing",),),)
        },)
    }

    #[track_caller]
    fn assert_not_monotonic_decreasing<T: PartialOrd + Debug,>(
        &self,
        sequence: &[T],
        strict: bool,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&sequence, &strict,];
        self.assert_that("assert_not_monotonic_decreasing", ctx.args(&args,), || {
            Ok(Verdict::check(!decreasing(sequence, strict,), || describe(sequence, false, strict, "decreasing",),),)
        },)
    }
}

impl<A: Assertions + ?Sized,> MonotonicMixins for A {}
