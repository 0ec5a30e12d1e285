use std::fmt::Debug;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};

use crate::case::{Assertions, Context, Verdict};
use crate::error::{Error, UsageError};

/// A point in time the date-time assertions can compare to "now".
///
/// Dates compare against today, date-times against the current instant in
/// their own zone.
pub trait Moment: PartialOrd + Debug + Copy {
    fn now() -> Self;

    /// `self - earlier`.
    fn since(self, earlier: Self,) -> TimeDelta;
}

impl Moment for NaiveDate {
    fn now() -> Self {
        Local::now().date_naive()
    }

    fn since(self, earlier: Self,) -> TimeDelta {
        self.signed_duration_since(earlier,)
    }
}

impl Moment for NaiveDateTime {
    fn now() -> Self {
        Local::now().naive_local()
    }

    fn since(self, earlier: Self,) -> TimeDelta {
        self.signed_duration_since(earlier,)
    }
}

impl Moment for DateTime<Utc,> {
    fn now() -> Self {
        Utc::now()
    }

    fn since(self, earlier: Self,) -> TimeDelta {
        self.signed_duration_since(earlier,)
    }
}

impl Moment for DateTime<Local,> {
    fn now() -> Self {
        Local::now()
    }

    fn since(self, earlier: Self,) -> TimeDelta {
        self.signed_duration_since(earlier,)
    }
}

impl Moment for DateTime<FixedOffset,> {
    fn now() -> Self {
        Local::now().fixed_offset()
    }

    fn since(self, earlier: Self,) -> TimeDelta {
        self.signed_duration_since(earlier,)
    }
}

/// What each element of a sequence is compared with.
#[derive(Debug, Clone, Copy,)]
pub enum Target<'a, T,> {
    /// Every element against the same moment.
    Instant(T,),
    /// Element `i` against `targets[i]`; lengths must match.
    Each(&'a [T],),
}

#[derive(Clone, Copy,)]
enum Side {
    Before,
    After,
}

fn compare<T: Moment,>(sequence: &[T], target: Target<'_, T,>, side: Side, strict: bool,) -> Result<Verdict, UsageError,> {
    let holds = |element: &T, target: &T| match (side, strict,) {
        (Side::Before, true,) => element < target,
        (Side::Before, false,) => element <= target,
        (Side::After, true,) => element > target,
        (Side::After, false,) => element >= target,
    };
    let passed = match target {
        Target::Instant(moment,) => sequence.iter().all(|element| holds(element, &moment,),),
        Target::Each(targets,) => {
            if targets.len() != sequence.len() {
                return Err(UsageError::LengthMismatch { first: sequence.len(), second: targets.len(), },);
            }
            sequence.iter().zip(targets,).all(|(element, target,)| holds(element, target,),)
        }
    };
    Ok(Verdict::check(passed, || {
        let strictly = if strict { "strictly " } else { "" };
        let relation = match side {
            Side::Before => "less than",
            Side::After => "greater than",
        };
        let target = match target {
            Target::Instant(moment,) => format!("{moment:?}"),
            Target::Each(targets,) => format!("{targets:?}"),
        };
        format!("{sequence:?} is not {strictly}{relation} {target}")
    },),)
}

fn latest<T: Moment,>(sequence: &[T],) -> Result<T, UsageError,> {
    sequence
        .iter()
        .copied()
        .reduce(|latest, element| if element > latest { element } else { latest },)
        .ok_or(UsageError::EmptySequence,)
}

fn earliest<T: Moment,>(sequence: &[T],) -> Result<T, UsageError,> {
    sequence
        .iter()
        .copied()
        .reduce(|earliest, element| if element < earliest { element } else { earliest },)
        .ok_or(UsageError::EmptySequence,)
}

/// Assertions over dates and date-times.
pub trait DateTimeMixins: Assertions {
    #[track_caller]
    fn assert_date_times_before<T: Moment,>(
        &self,
        sequence: &[T],
        target: Target<'_, T,>,
        strict: bool,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        self.assert_that("assert_date_times_before", ctx, || compare(sequence, target, Side::Before, strict,),)
    }

    #[track_caller]
    fn assert_date_times_after<T: Moment,>(
        &self,
        sequence: &[T],
        target: Target<'_, T,>,
        strict: bool,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        self.assert_that("assert_date_times_after", ctx, || compare(sequence, target, Side::After, strict,),)
    }

    /// Fails unless every element is before now. An empty sequence is a
    /// usage error.
    #[track_caller]
    fn assert_date_times_past<T: Moment,>(&self, sequence: &[T], strict: bool, ctx: Context<'_,>,) -> Result<(), Error,> {
        self.assert_that("assert_date_times_past", ctx, || {
            latest(sequence,)?;
            compare(sequence, Target::Instant(T::now(),), Side::Before, strict,)
        },)
    }

    #[track_caller]
    fn assert_date_times_future<T: Moment,>(&self, sequence: &[T], strict: bool, ctx: Context<'_,>,) -> Result<(), Error,> {
        self.assert_that("assert_date_times_future", ctx, || {
            earliest(sequence,)?;
            compare(sequence, Target::Instant(T::now(),), Side::After, strict,)
        },)
    }

    /// Fails unless consecutive elements are exactly `frequency` apart.
    #[track_caller]
    fn assert_date_times_frequency_equal<T: Moment,>(
        &self,
        sequence: &[T],
        frequency: TimeDelta,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        self.assert_that("assert_date_times_frequency_equal", ctx, || {
            let regular = sequence.windows(2,).all(|pair| pair[1].since(pair[0],) == frequency,);
            Ok(Verdict::check(regular, || format!("unexpected frequencies found in {sequence:?}"),),)
        },)
    }

    /// Fails unless now minus the latest element equals `lag`.
    #[track_caller]
    fn assert_date_times_lag_equal<T: Moment,>(&self, sequence: &[T], lag: TimeDelta, ctx: Context<'_,>,) -> Result<(), Error,> {
        self.assert_that("assert_date_times_lag_equal", ctx, || {
            let actual = T::now().since(latest(sequence,)?,);
            Ok(Verdict::check(actual == lag, || format!("{actual} != {lag}"),),)
        },)
    }

    #[track_caller]
    fn assert_date_times_lag_less<T: Moment,>(&self, sequence: &[T], lag: TimeDelta, ctx: Context<'_,>,) -> Result<(), Error,> {
        self.assert_that("assert_date_times_lag_less", ctx, || {
            let actual = T::now().since(latest(sequence,)?,);
            Ok(Verdict::check(actual < lag, || format!("{actual} not less than {lag}"),),)
        },)
    }

    #[track_caller]
    fn assert_date_times_lag_less_equal<T: Moment,>(
        &self,
        sequence: &[T],
        lag: TimeDelta,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        self.assert_that("assert_date_times_lag_less_equal", ctx, || {
            let actual = T::now().since(latest(sequence,)?,);
            Ok(Verdict::check(actual <= lag, || format!("{actual} not less than or equal to {lag}"),),)
        },)
    }

    /// Compares the UTC offset in effect at `moment` with `zone`.
    #[track_caller]
    fn assert_time_zone_equal<Tz: TimeZone,>(
        &self,
        moment: &DateTime<Tz,>,
        zone: FixedOffset,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        self.assert_that("assert_time_zone_equal", ctx, || {
            let offset = moment.offset().fix();
            Ok(Verdict::check(offset == zone, || format!("{offset} != {zone}"),),)
        },)
    }

    #[track_caller]
    fn assert_time_zone_not_equal<Tz: TimeZone,>(
        &self,
        moment: &DateTime<Tz,>,
        zone: FixedOffset,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        self.assert_that("assert_time_zone_not_equal", ctx, || {
            let offset = moment.offset().fix();
            Ok(Verdict::check(offset != zone, || format!("{offset} == {zone}"),),)
        },)
    }
}

impl<A: Assertions + ?Sized,> DateTimeMixins for A {}
