#![deny(clippy::disallowed_methods)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(unsafe_code)]
//! Test failures that explain themselves.
//!
//! Assertions made through a [`TestCase`] report, when they fail, the
//! assertion's source statement, the test's local variables and an optional
//! note written by the test author and filled in from those locals:
//!
//! ```text
//! 5 != 10
//!
//! Source (tests/prices.rs):
//!       11     let expected = 10;
//!  >    12     check!(case.assert_equal(&x, &expected), note = "value was {x}, expected {expected}");
//!       13 }
//! Locals:
//!     x=5 (as of line 10)
//!     expected=10 (as of line 11)
//! Note:
//!     value was 5, expected 10
//! ```
//!
//! Every attempt is also written to the assertion log (see [`log`]).
//!
//! ```ignore
//! use marbles::{Assertions, TestCase, check};
//!
//! #[marbles::test]
//! fn prices_are_fresh(case: &TestCase) {
//!     let x = 5;
//!     let expected = 10;
//!     check!(case.assert_equal(&x, &expected), note = "value was {x}, expected {expected}");
//! }
//! ```
//!
//! `#[marbles::test]` records each local as the body binds it, and again
//! after a statement that changes it through `&mut` or a method call. Those
//! copies are shown with the line they were taken at. Outside the attribute,
//! or to capture a value as it is at the moment of failure, list the locals
//! at the call: `check!(case.assert_true(ok); locals = [x, y])`.

extern crate self as marbles;

pub mod annotation;
pub mod case;
pub mod error;
pub mod frame;
pub mod log;
pub mod mixins;
pub mod report;
pub mod source;

pub use case::{Assertions, Context, TestCase, Tolerance, Variant, Verdict};
pub use error::{AnnotationError, Error, LogError, UsageError};
pub use frame::{Bindings, LocalsSnapshot};
pub use marbles_macros::test;
pub use report::{ContextualAssertionError, FailureReport, Label};

/// Captures one value for a report. Used by the macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __capture {
    ($value:expr) => {
        $crate::__capture!($value, $crate::frame::MAX_VALUE_LEN)
    };
    ($value:expr, $limit:expr) => {{
        #[allow(unused_imports)]
        use $crate::frame::{CaptureDebug as _, CaptureDisplay as _, CaptureNoDisplay as _, CaptureOpaque as _};
        let capture = $crate::frame::Capture(&$value,);
        $crate::frame::Value::new((&capture).capture_debug($limit,), (&capture).capture_display($limit,),)
    }};
}

/// Builds [`Bindings`] from local variable names.
///
/// ```
/// let rows = 3;
/// let table = "prices";
/// let bindings = marbles::locals![rows, table];
/// assert_eq!(bindings.get("table").map(|value| value.text()), Some("prices"));
/// ```
#[macro_export]
macro_rules! locals {
    ($($name:ident),* $(,)?) => {
        $crate::frame::Bindings::new()
            $(.bind(::std::stringify!($name), $crate::__capture!($name),))*
    };
}

/// Makes an assertion and fails the test with the report if it does not
/// hold.
///
/// `check!(case.method(args..), key = value..; locals = [names..])`. Keys
/// are `msg` and `note`. The listed locals are captured only if the
/// assertion fails and take precedence over values recorded by
/// `#[marbles::test]`.
#[macro_export]
macro_rules! check {
    (
        $case:ident . $method:ident ( $($arg:expr),* $(,)? )
        $(, $key:ident = $value:expr)*
        $(; locals = [$($local:ident),* $(,)?])?
    ) => {{
        let __marbles_locals = || $crate::locals![$($($local),*)?];
        let __marbles_ctx = $crate::Context::new().locals(&__marbles_locals,) $(.$key($value,))*;
        if let ::std::result::Result::Err(error,) = $case.$method($($arg,)* __marbles_ctx,) {
            error.raise();
        }
    }};
}
