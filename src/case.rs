//! Test cases and the assertions they make.
//!
//! Every assertion goes through [`Assertions::assert_that`], which checks the
//! annotation, runs the predicate, logs exactly one event and, on failure,
//! builds the [`ContextualAssertionError`] report. All methods here carry
//! `#[track_caller]` so the report points at the test's own call site rather
//! than at this module.

use std::fmt::{self, Debug};
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Arc;

use chrono::Local;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::annotation;
use crate::error::{AnnotationError, Error, UsageError};
use crate::frame::{self, Bindings, LocalsSnapshot, Value};
use crate::log::{AssertionEvent, AssertionSink, Global, LogRecord, Outcome};
use crate::report::{ContextualAssertionError, Label};
use crate::source::SourceLocator;

/// Whether assertions must be annotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash,)]
pub enum Variant {
    /// Notes are optional and shown under "Note".
    #[default]
    Optional,
    /// Every assertion needs a note; it is shown under "Advice".
    Required,
}

impl Variant {
    pub fn label(self,) -> Label {
        match self {
            Self::Optional => Label::Note,
            Self::Required => Label::Advice,
        }
    }
}

/// What a predicate decided.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum Verdict {
    Pass,
    /// Failed, with the standard message describing why.
    Fail(String,),
}

impl Verdict {
    /// `Pass` when `passed`, otherwise `Fail` with the message from `message`.
    pub fn check(passed: bool, message: impl FnOnce() -> String,) -> Self {
        if passed { Self::Pass } else { Self::Fail(message(),) }
    }
}

/// Per-call options: a message override, the annotation template and
/// explicitly captured locals, plus the assertion's own arguments for the
/// log.
///
/// The note is kept as a template and only rendered if the assertion fails
/// (or the sink asks for notes on passing assertions). Explicit locals are
/// produced by a closure that runs at the same point.
#[derive(Clone, Copy, Default,)]
pub struct Context<'a,> {
    msg: Option<&'a str,>,
    note: Option<&'a str,>,
    locals: Option<&'a dyn Fn() -> Bindings,>,
    args: &'a [&'a dyn Debug],
}

impl<'a,> Context<'a,> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the predicate's standard failure message.
    pub fn msg(mut self, msg: &'a str,) -> Self {
        self.msg = Some(msg,);
        self
    }

    pub fn note(mut self, note: &'a str,) -> Self {
        self.note = Some(note,);
        self
    }

    pub fn locals(mut self, locals: &'a dyn Fn() -> Bindings,) -> Self {
        self.locals = Some(locals,);
        self
    }

    /// The positional arguments of the assertion, logged with its record.
    /// Assertions set this themselves.
    pub fn args(mut self, args: &'a [&'a dyn Debug],) -> Self {
        self.args = args;
        self
    }

    pub fn message_override(&self,) -> Option<&'a str,> {
        self.msg
    }

    pub fn note_template(&self,) -> Option<&'a str,> {
        self.note
    }

    pub fn arguments(&self,) -> &'a [&'a dyn Debug] {
        self.args
    }

    fn explicit_locals(&self,) -> Option<Bindings,> {
        self.locals.map(|locals| locals(),)
    }

    fn rendered_args(&self,) -> Vec<String,> {
        self.args.iter().map(|arg| frame::render_debug(*arg, frame::MAX_VALUE_LEN,),).collect()
    }
}

impl fmt::Debug for Context<'_,> {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        f.debug_struct("Context",)
            .field("msg", &self.msg,)
            .field("note", &self.note,)
            .field("locals", &self.locals.is_some(),)
            .field("args", &self.args.len(),)
            .finish()
    }
}

#[derive(Debug, Clone,)]
struct Attribute {
    name: String,
    json: JsonValue,
    value: Value,
}

/// One test method's view of the assertion machinery.
///
/// ```
/// use marbles::{Assertions, Context, TestCase};
///
/// let case = TestCase::new("docs", "example").attr("dataset", "prices");
/// let rows = 3;
/// case.assert_greater(&rows, &0, Context::new().note("{self.dataset} has no rows")).unwrap();
/// ```
#[derive(Clone,)]
pub struct TestCase {
    id: String,
    method: String,
    variant: Variant,
    attrs: Arc<Vec<Attribute,>,>,
    sink: Arc<dyn AssertionSink,>,
    locator: SourceLocator,
}

impl TestCase {
    pub fn new(id: impl Into<String,>, method: impl Into<String,>,) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            variant: Variant::Optional,
            attrs: Arc::default(),
            sink: Arc::new(Global,),
            locator: SourceLocator::default(),
        }
    }

    /// Requires a note on every assertion.
    pub fn annotated(mut self,) -> Self {
        self.variant = Variant::Required;
        self
    }

    /// Sets an attribute. Attributes are available to notes as `{name}` or
    /// `{self.name}` and can be written to the log. A value that cannot be
    /// serialized is kept as a `"<unserializable: ...>"` string.
    pub fn attr<T: Serialize + ?Sized,>(mut self, name: impl Into<String,>, value: &T,) -> Self {
        let name = name.into();
        let json = serde_json::to_value(value,)
            .unwrap_or_else(|error| JsonValue::String(format!("<unserializable: {error}>"),),);
        let value = match &json {
            JsonValue::String(text,) => Value::new(json.to_string(), Some(text.clone(),),),
            other => Value::text_only(other.to_string(),),
        };
        let attrs = Arc::make_mut(&mut self.attrs,);
        attrs.retain(|attr| attr.name != name,);
        attrs.push(Attribute { name, json, value, },);
        self
    }

    /// Sends this case's records to `sink` instead of the process logger.
    pub fn sink(mut self, sink: Arc<dyn AssertionSink,>,) -> Self {
        self.sink = sink;
        self
    }

    pub fn locator(mut self, locator: SourceLocator,) -> Self {
        self.locator = locator;
        self
    }

    pub fn id(&self,) -> &str {
        &self.id
    }

    pub fn method(&self,) -> &str {
        &self.method
    }

    pub fn variant(&self,) -> Variant {
        self.variant
    }

    pub fn attribute(&self, name: &str,) -> Option<&JsonValue,> {
        self.attrs.iter().find(|attr| attr.name == name,).map(|attr| &attr.json,)
    }

    pub fn sink_handle(&self,) -> Arc<dyn AssertionSink,> {
        Arc::clone(&self.sink,)
    }

    fn public_attrs(&self,) -> impl Iterator<Item = &Attribute,> {
        self.attrs.iter().filter(|attr| !attr.name.starts_with('_',),)
    }

    fn attr_bindings(&self,) -> Bindings {
        self.public_attrs().fold(Bindings::new(), |acc, attr| acc.bind(attr.name.clone(), attr.value.clone(),),)
    }

    fn attr_map(&self,) -> Map<String, JsonValue,> {
        self.public_attrs().map(|attr| (attr.name.clone(), attr.json.clone(),),).collect()
    }

    fn gate(&self, assertion: &'static str, ctx: &Context<'_,>,) -> Result<(), AnnotationError,> {
        let note = ctx.note.filter(|note| !note.trim().is_empty(),);
        match note {
            None if self.variant == Variant::Required => {
                Err(AnnotationError::MissingAnnotation { assertion, field: "note", },)
            }
            None => Ok((),),
            Some(note,) => annotation::validate(note,),
        }
    }

    fn event(
        &self,
        assertion: &'static str,
        outcome: Outcome,
        location: &Location<'_,>,
        ctx: &Context<'_,>,
    ) -> AssertionEvent {
        AssertionEvent {
            test_case: self.id.clone(),
            test_method: self.method.clone(),
            assertion,
            outcome,
            file: location.file().to_string(),
            line: location.line(),
            args: ctx.rendered_args(),
            msg: None,
            note: None,
            locals: None,
            attrs: self.attr_map(),
            timestamp: Local::now(),
        }
    }

    fn emit_error(&self, assertion: &'static str, location: &Location<'_,>, ctx: &Context<'_,>, message: String,) {
        let mut event = self.event(assertion, Outcome::Error, location, ctx,);
        event.msg = Some(message,);
        self.sink.emit(&LogRecord::Assertion(event,),);
        frame::tally(true,);
    }

    fn render_note(&self, ctx: &Context<'_,>, locals: &LocalsSnapshot,) -> Option<String,> {
        ctx.note.map(|template| annotation::render(template, locals, &self.attr_bindings(),),)
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        f.debug_struct("TestCase",)
            .field("id", &self.id,)
            .field("method", &self.method,)
            .field("variant", &self.variant,)
            .field("attrs", &self.attrs.iter().map(|attr| &attr.name,).collect::<Vec<_,>>(),)
            .finish_non_exhaustive()
    }
}

/// How close two floats must be for `assert_almost_equal`.
#[derive(Debug, Clone, Copy, PartialEq,)]
pub enum Tolerance {
    /// The difference rounds to zero at this many decimal places.
    Places(u32,),
    /// The difference is at most this much.
    Delta(f64,),
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::Places(7,)
    }
}

impl Tolerance {
    pub(crate) fn holds(self, first: f64, second: f64,) -> bool {
        if first == second {
            return true;
        }
        let diff = (first - second).abs();
        match self {
            Self::Places(places,) => (diff * 10f64.powi(places as i32,)).round() == 0.0,
            Self::Delta(delta,) => diff <= delta,
        }
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        match self {
            Self::Places(places,) => write!(f, "{places} places"),
            Self::Delta(delta,) => write!(f, "{delta} delta"),
        }
    }
}

/// The assertion capability.
///
/// Implementors supply [`assert_that`](Self::assert_that); every other
/// assertion, including the mixin traits in [`crate::mixins`], is built on it.
pub trait Assertions {
    /// Runs `predicate` as the assertion named `assertion`.
    ///
    /// Returns `Err(Error::Annotation)` without running the predicate when
    /// the note is missing but required, or is not a valid template.
    /// `Err(Error::Usage)` means the predicate could not evaluate its
    /// arguments. A panicking predicate is logged and the panic continues.
    #[track_caller]
    fn assert_that<F,>(&self, assertion: &'static str, ctx: Context<'_,>, predicate: F,) -> Result<(), Error,>
    where
        F: FnOnce() -> Result<Verdict, UsageError,>;

    #[track_caller]
    fn fail(&self, ctx: Context<'_,>,) -> Result<(), Error,> {
        self.assert_that("fail", ctx, || Ok(Verdict::Fail("explicit failure".to_string(),),),)
    }

    #[track_caller]
    fn assert_true(&self, value: bool, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 1] = [&value,];
        self.assert_that("assert_true", ctx.args(&args,), || Ok(Verdict::check(value, || "false is not true".to_string(),),),)
    }

    #[track_caller]
    fn assert_false(&self, value: bool, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 1] = [&value,];
        self.assert_that("assert_false", ctx.args(&args,), || Ok(Verdict::check(!value, || "true is not false".to_string(),),),)
    }

    #[track_caller]
    fn assert_equal<A, B,>(&self, first: &A, second: &B, ctx: Context<'_,>,) -> Result<(), Error,>
    where
        A: PartialEq<B,> + Debug + ?Sized,
        B: Debug + ?Sized,
    {
        let args: [&dyn Debug; 2] = [&first, &second,];
        self.assert_that("assert_equal", ctx.args(&args,), || {
            Ok(Verdict::check(first == second, || format!("{first:?} != {second:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_not_equal<A, B,>(&self, first: &A, second: &B, ctx: Context<'_,>,) -> Result<(), Error,>
    where
        A: PartialEq<B,> + Debug + ?Sized,
        B: Debug + ?Sized,
    {
        let args: [&dyn Debug; 2] = [&first, &second,];
        self.assert_that("assert_not_equal", ctx.args(&args,), || {
            Ok(Verdict::check(first != second, || format!("{first:?} == {second:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_less<A, B,>(&self, first: &A, second: &B, ctx: Context<'_,>,) -> Result<(), Error,>
    where
        A: PartialOrd<B,> + Debug + ?Sized,
        B: Debug + ?Sized,
    {
        let args: [&dyn Debug; 2] = [&first, &second,];
        self.assert_that("assert_less", ctx.args(&args,), || {
            Ok(Verdict::check(first < second, || format!("{first:?} not less than {second:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_less_equal<A, B,>(&self, first: &A, second: &B, ctx: Context<'_,>,) -> Result<(), Error,>
    where
        A: PartialOrd<B,> + Debug + ?Sized,
        B: Debug + ?Sized,
    {
        let args: [&dyn Debug; 2] = [&first, &second,];
        self.assert_that("assert_less_equal", ctx.args(&args,), || {
            Ok(Verdict::check(first <= second, || format!("{first:?} not less than or equal to {second:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_greater<A, B,>(&self, first: &A, second: &B, ctx: Context<'_,>,) -> Result<(), Error,>
    where
        A: PartialOrd<B,> + Debug + ?Sized,
        B: Debug + ?Sized,
    {
        let args: [&dyn Debug; 2] = [&first, &second,];
        self.assert_that("assert_greater", ctx.args(&args,), || {
            Ok(Verdict::check(first > second, || format!("{first:?} not greater than {second:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_greater_equal<A, B,>(&self, first: &A, second: &B, ctx: Context<'_,>,) -> Result<(), Error,>
    where
        A: PartialOrd<B,> + Debug + ?Sized,
        B: Debug + ?Sized,
    {
        let args: [&dyn Debug; 2] = [&first, &second,];
        self.assert_that("assert_greater_equal", ctx.args(&args,), || {
            Ok(Verdict::check(first >= second, || format!("{first:?} not greater than or equal to {second:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_almost_equal(&self, first: f64, second: f64, tolerance: Tolerance, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 3] = [&first, &second, &tolerance,];
        self.assert_that("assert_almost_equal", ctx.args(&args,), || {
            Ok(Verdict::check(tolerance.holds(first, second,), || {
                format!("{first} != {second} within {tolerance} ({} difference)", (first - second).abs())
            },),)
        },)
    }

    #[track_caller]
    fn assert_not_almost_equal(
        &self,
        first: f64,
        second: f64,
        tolerance: Tolerance,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let args: [&dyn Debug; 3] = [&first, &second, &tolerance,];
        self.assert_that("assert_not_almost_equal", ctx.args(&args,), || {
            Ok(Verdict::check(!tolerance.holds(first, second,), || format!("{first} == {second} within {tolerance}"),),)
        },)
    }

    #[track_caller]
    fn assert_in<T: PartialEq + Debug,>(&self, member: &T, container: &[T], ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&member, &container,];
        self.assert_that("assert_in", ctx.args(&args,), || {
            Ok(Verdict::check(container.contains(member,), || format!("{member:?} not found in {container:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_not_in<T: PartialEq + Debug,>(&self, member: &T, container: &[T], ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&member, &container,];
        self.assert_that("assert_not_in", ctx.args(&args,), || {
            Ok(Verdict::check(!container.contains(member,), || {
                format!("{member:?} unexpectedly found in {container:?}")
            },),)
        },)
    }

    #[track_caller]
    fn assert_none<T: Debug,>(&self, value: &Option<T,>, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 1] = [&value,];
        self.assert_that("assert_none", ctx.args(&args,), || Ok(Verdict::check(value.is_none(), || format!("{value:?} is not None"),),),)
    }

    #[track_caller]
    fn assert_some<T: Debug,>(&self, value: &Option<T,>, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 1] = [&value,];
        self.assert_that("assert_some", ctx.args(&args,), || Ok(Verdict::check(value.is_some(), || "unexpectedly None".to_string(),),),)
    }

    #[track_caller]
    fn assert_ok<T: Debug, E: Debug,>(&self, value: &Result<T, E,>, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 1] = [&value,];
        self.assert_that("assert_ok", ctx.args(&args,), || Ok(Verdict::check(value.is_ok(), || format!("{value:?} is not Ok"),),),)
    }

    #[track_caller]
    fn assert_err<T: Debug, E: Debug,>(&self, value: &Result<T, E,>, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 1] = [&value,];
        self.assert_that("assert_err", ctx.args(&args,), || Ok(Verdict::check(value.is_err(), || format!("{value:?} is not Err"),),),)
    }

    #[track_caller]
    fn assert_regex(&self, text: &str, pattern: &str, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&text, &pattern,];
        self.assert_that("assert_regex", ctx.args(&args,), || {
            let regex = compile(pattern,)?;
            Ok(Verdict::check(regex.is_match(text,), || format!("Regex didn't match: {pattern:?} not found in {text:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_not_regex(&self, text: &str, pattern: &str, ctx: Context<'_,>,) -> Result<(), Error,> {
        let args: [&dyn Debug; 2] = [&text, &pattern,];
        self.assert_that("assert_not_regex", ctx.args(&args,), || {
            let regex = compile(pattern,)?;
            Ok(match regex.find(text,) {
                None => Verdict::Pass,
                Some(found,) => Verdict::Fail(format!(
                    "Regex matched: {:?} matches {pattern:?} in {text:?}",
                    found.as_str()
                ),),
            },)
        },)
    }

    /// Passes when `f` panics. The panic is contained.
    #[track_caller]
    fn assert_panics<F: FnOnce(),>(&self, f: F, ctx: Context<'_,>,) -> Result<(), Error,> {
        self.assert_that("assert_panics", ctx, || {
            let panicked = panic::catch_unwind(AssertUnwindSafe(f,),).is_err();
            Ok(Verdict::check(panicked, || "closure did not panic".to_string(),),)
        },)
    }
}

pub(crate) fn compile(pattern: &str,) -> Result<Regex, UsageError,> {
    Regex::new(pattern,).map_err(|source| UsageError::InvalidRegex { pattern: pattern.to_string(), source, },)
}

impl Assertions for TestCase {
    #[track_caller]
    fn assert_that<F,>(&self, assertion: &'static str, ctx: Context<'_,>, predicate: F,) -> Result<(), Error,>
    where
        F: FnOnce() -> Result<Verdict, UsageError,>,
    {
        let location = Location::caller();

        if let Err(error,) = self.gate(assertion, &ctx,) {
            self.emit_error(assertion, location, &ctx, error.to_string(),);
            return Err(error.into(),);
        }

        let verdict = match panic::catch_unwind(AssertUnwindSafe(predicate,),) {
            Ok(Ok(verdict,),) => verdict,
            Ok(Err(usage,),) => {
                self.emit_error(assertion, location, &ctx, usage.to_string(),);
                return Err(usage.into(),);
            }
            Err(payload,) => {
                let message = format!("assertion panicked: {}", frame::panic_message(payload.as_ref(),));
                self.emit_error(assertion, location, &ctx, message,);
                panic::resume_unwind(payload,);
            }
        };

        match verdict {
            Verdict::Pass => {
                let verbosity = self.sink.verbosity();
                let mut event = self.event(assertion, Outcome::Pass, location, &ctx,);
                if verbosity.note || verbosity.locals {
                    let locals = frame::capture(ctx.explicit_locals().as_ref(),);
                    if verbosity.note {
                        event.note = self.render_note(&ctx, &locals,);
                    }
                    if verbosity.locals {
                        event.locals = Some(locals,);
                    }
                }
                if verbosity.msg {
                    event.msg = ctx.msg.map(str::to_string,);
                }
                self.sink.emit(&LogRecord::Assertion(event,),);
                frame::tally(false,);
                Ok((),)
            }
            Verdict::Fail(standard,) => {
                let message = ctx.msg.map(str::to_string,).unwrap_or(standard,);
                let locals = frame::capture(ctx.explicit_locals().as_ref(),);
                let note = self.render_note(&ctx, &locals,);

                let mut event = self.event(assertion, Outcome::Fail, location, &ctx,);
                event.msg = Some(message.clone(),);
                event.note = note.clone();
                event.locals = Some(locals.clone(),);
                self.sink.emit(&LogRecord::Assertion(event,),);
                frame::tally(true,);

                let failure = ContextualAssertionError::new(assertion, message, location,)
                    .with_excerpt(self.locator.locate(location.file(), location.line(),),)
                    .with_locals(locals,)
                    .with_note(self.variant.label(), note,);
                Err(failure.into(),)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{MemorySink, Verbosity};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn case_with(sink: &Arc<MemorySink,>,) -> TestCase {
        TestCase::new("case::tests", "test_method",).sink(sink.clone(),)
    }

    fn failure(result: Result<(), Error,>,) -> ContextualAssertionError {
        match result {
            Err(Error::Assertion(failure,),) => *failure,
            other => panic!("expected an assertion failure, got {other:?}"),
        }
    }

    #[test]
    fn passing_assertion_logs_one_pass_event_and_no_report() {
        let sink = Arc::new(MemorySink::new(),);
        let case = case_with(&sink,);
        assert!(case.assert_equal(&2, &2, Context::new()).is_ok());

        let events = sink.assertions();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, Outcome::Pass);
        assert_eq!(events[0].assertion, "assert_equal");
        assert_eq!(events[0].locals, None);
        assert_eq!(events[0].line, line!() - 7);
    }

    #[test]
    fn failure_builds_report_and_logs_fail_event() {
        let sink = Arc::new(MemorySink::new(),);
        let case = case_with(&sink,);
        let x = 5;
        let y = 10;
        let locals = || Bindings::new().bind("x", crate::__capture!(x),).bind("y", crate::__capture!(y),);
        let result = case.assert_equal(&x, &y, Context::new().note("value was {x}, expected {y}",).locals(&locals,),);

        let failure = failure(result,);
        assert_eq!(failure.message(), "5 != 10");
        assert_eq!(failure.note(), Some("value was 5, expected 10"));
        assert_eq!(failure.label(), Label::Note);
        assert_eq!(failure.file(), file!());
        assert!(failure.excerpt().is_some_and(|excerpt| excerpt.lines.iter().any(|(_, text)| text.contains("assert_equal"))));
        assert!(failure.to_string().contains("Locals:\n\tx=5\n\ty=10"));

        let events = sink.assertions();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, Outcome::Fail);
        assert_eq!(events[0].msg.as_deref(), Some("5 != 10"));
        assert_eq!(events[0].note.as_deref(), Some("value was 5, expected 10"));
        assert_eq!(events[0].args, vec!["5", "10"]);
    }

    #[test]
    fn primitives_log_their_arguments() {
        let sink = Arc::new(MemorySink::new(),);
        let case = case_with(&sink,);
        case.assert_in(&"b", &["a", "b",], Context::new(),).unwrap();
        case.assert_almost_equal(1.0, 1.05, Tolerance::Delta(0.1,), Context::new(),).unwrap();
        case.assert_none(&None::<u8,>, Context::new(),).unwrap();
        let _ = case.assert_that("assert_custom", Context::new(), || Ok(Verdict::Pass,),);

        let args = sink.assertions().into_iter().map(|event| event.args,).collect::<Vec<_,>>();
        assert_eq!(args[0], vec!["\"b\"", "[\"a\", \"b\"]"]);
        assert_eq!(args[1], vec!["1.0", "1.05", "Delta(0.1)"]);
        assert_eq!(args[2], vec!["None"]);
        assert!(args[3].is_empty());
    }

    #[test]
    fn message_override_replaces_standard_message() {
        let sink = Arc::new(MemorySink::new(),);
        let failure = failure(case_with(&sink,).assert_true(false, Context::new().msg("custom",),),);
        assert_eq!(failure.message(), "custom");
        assert!(failure.locals().is_empty());
        assert!(!failure.to_string().contains("Locals:"));
    }

    #[test]
    fn required_variant_rejects_missing_note_before_predicate() {
        let sink = Arc::new(MemorySink::new(),);
        let case = case_with(&sink,).annotated();
        let ran = Cell::new(false,);
        let result = case.assert_that("assert_custom", Context::new(), || {
            ran.set(true,);
            Ok(Verdict::Pass,)
        },);

        assert!(matches!(
            result,
            Err(Error::Annotation(AnnotationError::MissingAnnotation { assertion: "assert_custom", field: "note" }))
        ));
        assert!(!ran.get());
        let events = sink.assertions();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, Outcome::Error);
    }

    #[test]
    fn required_variant_labels_note_as_advice() {
        let sink = Arc::new(MemorySink::new(),);
        let case = case_with(&sink,).annotated();
        let failure = failure(case.assert_false(true, Context::new().note("restart the feed",),),);
        assert_eq!(failure.label(), Label::Advice);
        assert!(failure.to_string().ends_with("Advice:\n\trestart the feed"));
    }

    #[test]
    fn malformed_note_is_a_usage_error() {
        let sink = Arc::new(MemorySink::new(),);
        let ran = Cell::new(false,);
        let result = case_with(&sink,).assert_that("assert_custom", Context::new().note("broken {x",), || {
            ran.set(true,);
            Ok(Verdict::Pass,)
        },);
        assert!(matches!(result, Err(Error::Annotation(AnnotationError::MalformedTemplate { .. }))));
        assert!(!ran.get());
    }

    #[test]
    fn usage_errors_are_logged_as_errors() {
        let sink = Arc::new(MemorySink::new(),);
        let result = case_with(&sink,).assert_regex("abc", "(", Context::new(),);
        assert!(matches!(result, Err(Error::Usage(UsageError::InvalidRegex { .. }))));
        assert_eq!(sink.assertions()[0].outcome, Outcome::Error);
        assert_eq!(sink.assertions()[0].args, vec!["\"abc\"", "\"(\""]);
    }

    #[test]
    fn panicking_predicate_logs_error_and_resumes() {
        let sink = Arc::new(MemorySink::new(),);
        let case = case_with(&sink,);
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = case.assert_that("assert_custom", Context::new(), || panic!("predicate blew up"),);
        },),);
        assert!(unwound.is_err());
        let events = sink.assertions();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, Outcome::Error);
        assert_eq!(events[0].msg.as_deref(), Some("assertion panicked: predicate blew up"));
    }

    #[test]
    fn verbose_sink_gets_locals_and_note_on_pass() {
        let sink = Arc::new(MemorySink::with_verbosity(Verbosity::ALL,),);
        let case = case_with(&sink,);
        let n = 3;
        let locals = || Bindings::new().bind("n", crate::__capture!(n),);
        case.assert_true(n > 0, Context::new().msg("n positive",).note("n is {n}",).locals(&locals,),).unwrap();

        let event = &sink.assertions()[0];
        assert_eq!(event.msg.as_deref(), Some("n positive"));
        assert_eq!(event.note.as_deref(), Some("n is 3"));
        assert_eq!(event.locals.as_ref().map(LocalsSnapshot::len), Some(1));
    }

    #[test]
    fn attributes_are_interpolated_and_logged() {
        let sink = Arc::new(MemorySink::new(),);
        let case = case_with(&sink,).attr("dataset", "prices",).attr("rows", &3,).attr("_private", &1,);
        let failure = failure(case.assert_true(false, Context::new().note("{dataset} had {self.rows} rows {_private}",),),);
        assert_eq!(failure.note(), Some("prices had 3 rows {_private}"));

        let event = &sink.assertions()[0];
        assert_eq!(event.attrs.get("dataset"), Some(&JsonValue::from("prices")));
        assert!(event.attrs.get("_private").is_none());
        assert_eq!(case.attribute("rows"), Some(&JsonValue::from(3)));
    }

    #[test]
    fn primitive_messages() {
        let case = TestCase::new("case::tests", "test_messages",).sink(Arc::new(crate::log::NullSink,),);
        let message = |result: Result<(), Error,>| failure(result,).message().to_string();

        assert_eq!(message(case.fail(Context::new())), "explicit failure");
        assert_eq!(message(case.assert_not_equal(&1, &1, Context::new())), "1 == 1");
        assert_eq!(message(case.assert_less(&2, &1, Context::new())), "2 not less than 1");
        assert_eq!(message(case.assert_greater_equal(&1, &2, Context::new())), "1 not greater than or equal to 2");
        assert_eq!(message(case.assert_in(&4, &[1, 2, 3], Context::new())), "4 not found in [1, 2, 3]");
        assert_eq!(message(case.assert_not_in(&2, &[1, 2, 3], Context::new())), "2 unexpectedly found in [1, 2, 3]");
        assert_eq!(message(case.assert_none(&Some(1), Context::new())), "Some(1) is not None");
        assert_eq!(message(case.assert_ok(&Err::<(), _>("bad"), Context::new())), "Err(\"bad\") is not Ok");
        assert_eq!(
            message(case.assert_not_regex("abc123", r"\d+", Context::new())),
            "Regex matched: \"123\" matches \"\\\\d+\" in \"abc123\""
        );
        assert_eq!(message(case.assert_panics(|| {}, Context::new())), "closure did not panic");
        assert!(case.assert_panics(|| panic!("expected"), Context::new()).is_ok());
    }

    #[test]
    fn almost_equal_tolerances() {
        let case = TestCase::new("case::tests", "test_almost",).sink(Arc::new(crate::log::NullSink,),);
        assert!(case.assert_almost_equal(1.0, 1.000_000_01, Tolerance::default(), Context::new()).is_ok());
        assert!(case.assert_almost_equal(1.0, 1.1, Tolerance::default(), Context::new()).is_err());
        assert!(case.assert_almost_equal(1.0, 1.1, Tolerance::Delta(0.2), Context::new()).is_ok());
        assert!(case.assert_not_almost_equal(1.0, 1.1, Tolerance::Places(3), Context::new()).is_ok());
    }
}
