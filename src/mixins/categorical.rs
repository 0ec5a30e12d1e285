use std::fmt::Debug;

use crate::case::{Assertions, Context, Verdict};
use crate::error::Error;

fn same_levels<T: PartialEq,>(first: &[T], second: &[T],) -> bool {
    first.iter().all(|level| second.contains(level,),) && second.iter().all(|level| first.contains(level,),)
}

/// Categorical domains. Levels compare as sets: order and repetition do not
/// matter.
pub trait CategoricalMixins: Assertions {
    #[track_caller]
    fn assert_categorical_levels_equal<T: PartialEq + Debug,>(
        &self,
        first: &[T],
        second: &[T],
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&first, &second,];
        self.assert_that("assert_categorical_levels_equal", ctx.args(&args,), || {
            Ok(Verdict::check(same_levels(first, second,), || format!("{first:?} levels != {second:?} levels"),),)
        },)
    }

    #[track_caller]
    fn assert_categorical_levels_not_equal<T: PartialEq + Debug,>(
        &self,
        first: &[T],
        second: &[T],
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&first, &second,];
        self.assert_that("assert_categorical_levels_not_equal", ctx.args(&args,), || {
            Ok(Verdict::check(!same_levels(first, second,), || format!("{first:?} levels == {second:?} levels"),),)
        },)
    }

    #[track_caller]
    fn assert_categorical_level_in<T: PartialEq + Debug,>(
        &self,
        level: &T,
        levels: &[T],
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&level, &levels,];
        self.assert_that("assert_categorical_level_in", ctx.args(&args,), || {
            Ok(Verdict::check(levels.contains(level,), || format!("{level:?} not found in {levels:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_categorical_level_not_in<T: PartialEq + Debug,>(
        &self,
        level: &T,
        levels: &[T],
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&level, &levels,];
        self.assert_that("assert_categorical_level_not_in", ctx.args(&args,), || {
            Ok(Verdict::check(!levels.contains(level,), || format!("{level:?} unexpectedly found in {levels:?}"),),)
        },)
    }
}

impl<A: Assertions + ?Sized,> CategoricalMixins for A {}
