use std::fmt::Debug;

use crate::case::{Assertions, Context, Verdict};
use crate::error::{Error, UsageError};

/// Interval membership.
pub trait BetweenMixins: Assertions {
    /// Fails unless `lower < value < upper`, or `lower <= value <= upper`
    /// when `strict` is false.
    #[track_caller]
    fn assert_between<T: PartialOrd + Debug + ?Sized,>(
        &self,
        value: &T,
        lower: &T,
        upper: &T,
        strict: bool,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 4] = [&value, &lower, &upper, &strict,];
        self.assert_that("assert_between", ctx.args(&args,), || {
            let inside = if strict { lower < value && value < upper } else { lower <= value && value <= upper };
            Ok(Verdict::check(inside, || {
                let how = if strict { "strictly between" } else { "between" };
                format!("{value:?} is not {how} {lower:?} and {upper:?}")
            },),)
        },)
    }

    /// Fails if `lower <= value <= upper`, or `lower < value < upper` when
    /// `strict` is false. A non-strict check of an empty interval
    /// (`lower == upper`) is a usage error.
    #[track_caller]
    fn assert_not_between<T: PartialOrd + Debug + ?Sized,>(
        &self,
        value: &T,
        lower: &T,
        upper: &T,
        strict: bool,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 4] = [&value, &lower, &upper, &strict,];
        self.assert_that("assert_not_between", ctx.args(&args,), || {
            if !strict && lower == upper {
                return Err(UsageError::DegenerateInterval,);
            }
            let inside = if strict { lower <= value && value <= upper } else { lower < value && value < upper };
            Ok(Verdict::check(!inside, || {
                let how = if strict { "between" } else { "strictly between" };
                format!("{value:?} is {how} {lower:?} and {upper:?}")
            },),)
        },)
    }
}

impl<A: Assertions + ?Sized,> BetweenMixins for A {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestCase;
    use crate::log::NullSink;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn case() -> TestCase {
        TestCase::new("mixins::between", "test",).sink(Arc::new(NullSink,),)
    }

    fn message(result: Result<(), Error,>,) -> String {
        result.err().and_then(|error| error.as_failure().map(|failure| failure.message().to_string(),),).unwrap_or_default()
    }

    #[test]
    fn between_respects_strictness() {
        let case = case();
        assert!(case.assert_between(&5, &1, &10, true, Context::new()).is_ok());
        assert_eq!(message(case.assert_between(&1, &1, &10, true, Context::new())), "1 is not strictly between 1 and 10");
        assert!(case.assert_between(&1, &1, &10, false, Context::new()).is_ok());
        assert_eq!(message(case.assert_between(&11, &1, &10, false, Context::new())), "11 is not between 1 and 10");
    }

    #[test]
    fn not_between() {
        let case = case();
        assert!(case.assert_not_between(&0, &1, &10, true, Context::new()).is_ok());
        assert_eq!(message(case.assert_not_between(&1, &1, &10, true, Context::new())), "1 is between 1 and 10");
        assert!(case.assert_not_between(&1, &1, &10, false, Context::new()).is_ok());
        assert_eq!(
            message(case.assert_not_between(&5, &1, &10, false, Context::new())),
            "5 is strictly between 1 and 10"
        );
    }

    #[test]
    fn degenerate_interval_is_a_usage_error() {
        let result = case().assert_not_between(&3, &3, &3, false, Context::new(),);
        assert!(matches!(result, Err(Error::Usage(UsageError::DegenerateInterval))));
        assert!(case().assert_not_between(&3, &3, &3, true, Context::new()).is_err());
    }
}
