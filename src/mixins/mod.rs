//! Assertion bundles built on [`Assertions`](crate::Assertions).
//!
//! Each trait is implemented for every type with the assertion capability,
//! so bringing it into scope is enough:
//!
//! ```
//! use marbles::mixins::BetweenMixins;
//! use marbles::{Context, TestCase};
//!
//! let case = TestCase::new("docs", "between");
//! case.assert_between(&5, &1, &10, true, Context::new()).unwrap();
//! ```

mod between;
mod categorical;
mod datetime;
mod file;
mod monotonic;
mod unique;

pub use between::BetweenMixins;
pub use categorical::CategoricalMixins;
pub use datetime::{DateTimeMixins, Moment, Target};
pub use file::FileMixins;
pub use monotonic::MonotonicMixins;
pub use unique::UniqueMixins;
