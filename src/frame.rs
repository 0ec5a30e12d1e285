//! Local variable capture.
//!
//! Rust has no runtime access to a caller's locals, so they are recorded
//! instead. `#[marbles::test]` keeps a frame for the running test on a
//! thread-local stack and records each binding into it as the body binds or
//! reassigns it. Call sites can also pass bindings explicitly (see
//! [`check!`](crate::check)); those are taken at failure time and win over the
//! frame's copy of the same name.
//!
//! Values are rendered with `Debug` (and `Display` when the type has it) the
//! moment they are captured. Rendering is bounded and panic-safe: a value
//! whose formatting panics is recorded as a placeholder and capture goes on.
//! A frame's copy may be older than the failure it is shown with, so it
//! keeps the line it was recorded at and reports print that line next to it.

use std::any::Any;
use std::cell::RefCell;
use std::fmt::{self, Write as _};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Local;

use crate::case::TestCase;
use crate::log::{AssertionSink, LogRecord, Outcome, TestRunEvent};

/// Names never shown as locals: the test case binding and the annotation
/// parameters, which are reported in their own sections.
pub const HIDDEN_NAMES: &[&str] = &["self", "case", "msg", "note", "advice"];

/// Longest rendering kept for a value captured at failure time.
pub const MAX_VALUE_LEN: usize = 4096;

/// Longest rendering kept for a value a frame records as the body binds it.
/// Recording happens on every binding, hot loops included.
pub const MAX_RECORDED_LEN: usize = 256;

/// Whether a local named `name` appears in reports.
pub fn is_visible(name: &str,) -> bool {
    !name.starts_with('_',) && !HIDDEN_NAMES.contains(&name,)
}

/// A captured value, already rendered.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Value {
    debug: String,
    display: Option<String,>,
    line: Option<u32,>,
}

impl Value {
    pub fn new(debug: impl Into<String,>, display: Option<String,>,) -> Self {
        Self { debug: debug.into(), display, line: None, }
    }

    /// Marks the value as recorded at `line` rather than at failure time.
    pub fn recorded_at(mut self, line: u32,) -> Self {
        self.line = Some(line,);
        self
    }

    /// Source line a frame recorded the value at. `None` for values captured
    /// when the assertion failed.
    pub fn line(&self,) -> Option<u32,> {
        self.line
    }

    /// A value with the same text for `{}` and `{:?}`.
    pub fn text_only(text: impl Into<String,>,) -> Self {
        Self::new(text, None,)
    }

    pub fn debug(&self,) -> &str {
        &self.debug
    }

    /// The `Display` rendering when the type has one, else `Debug`.
    pub fn text(&self,) -> &str {
        self.display.as_deref().unwrap_or(&self.debug,)
    }
}

/// Captured bindings in binding order. Rebinding a name keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct Bindings {
    entries: Vec<(String, Value,),>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String,>, value: Value,) -> Self {
        self.insert(name, value,);
        self
    }

    pub fn insert(&mut self, name: impl Into<String,>, value: Value,) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _,)| *existing == name,) {
            Some((_, slot,),) => *slot = value,
            None => self.entries.push((name, value,),),
        }
    }

    pub fn get(&self, name: &str,) -> Option<&Value,> {
        self.entries.iter().find(|(existing, _,)| existing == name,).map(|(_, value,)| value,)
    }

    pub fn iter(&self,) -> impl Iterator<Item = (&str, &Value,),> {
        self.entries.iter().map(|(name, value,)| (name.as_str(), value,),)
    }

    pub fn len(&self,) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self,) -> bool {
        self.entries.is_empty()
    }
}

/// The visible locals of a test at the moment an assertion failed.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct LocalsSnapshot {
    entries: Vec<(String, Value,),>,
}

impl LocalsSnapshot {
    pub fn from_bindings(bindings: &Bindings,) -> Self {
        let entries = bindings
            .iter()
            .filter(|(name, _,)| is_visible(name,),)
            .map(|(name, value,)| (name.to_string(), value.clone(),),)
            .collect();
        Self { entries, }
    }

    pub fn get(&self, name: &str,) -> Option<&Value,> {
        self.entries.iter().find(|(existing, _,)| existing == name,).map(|(_, value,)| value,)
    }

    pub fn iter(&self,) -> impl Iterator<Item = (&str, &Value,),> {
        self.entries.iter().map(|(name, value,)| (name.as_str(), value,),)
    }

    pub fn names(&self,) -> impl Iterator<Item = &str,> {
        self.entries.iter().map(|(name, _,)| name.as_str(),)
    }

    pub fn len(&self,) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self,) -> bool {
        self.entries.is_empty()
    }

    /// One tab-indented `name=value` line per local, using the value's
    /// `Display` text where it has one. A value recorded before the failure
    /// is followed by `(as of line N)`.
    pub fn render(&self,) -> String {
        self.entries
            .iter()
            .map(|(name, value,)| match value.line() {
                Some(line,) => format!("\t{name}={} (as of line {line})", value.text()),
                None => format!("\t{name}={}", value.text()),
            },)
            .collect::<Vec<_,>>()
            .join("\n",)
    }
}

// ── Value capture ───────────────────────────────────────────────────────────
// `capture!` picks the richest rendering a type supports through autoref
// method resolution: the `Capture<T>` impls apply only when `T` has the
// trait, the `&Capture<T>` impls are the fallbacks one autoref further away.

#[doc(hidden)]
pub struct Capture<'a, T: ?Sized,>(pub &'a T,);

#[doc(hidden)]
pub trait CaptureDebug {
    fn capture_debug(&self, limit: usize,) -> String;
}

impl<T: fmt::Debug + ?Sized,> CaptureDebug for Capture<'_, T,> {
    fn capture_debug(&self, limit: usize,) -> String {
        render_bounded(&AsDebug(self.0,), limit,)
    }
}

#[doc(hidden)]
pub trait CaptureOpaque {
    fn capture_debug(&self, limit: usize,) -> String;
}

impl<T: ?Sized,> CaptureOpaque for &Capture<'_, T,> {
    fn capture_debug(&self, _: usize,) -> String {
        format!("<{}>", std::any::type_name::<T,>())
    }
}

#[doc(hidden)]
pub trait CaptureDisplay {
    fn capture_display(&self, limit: usize,) -> Option<String,>;
}

impl<T: fmt::Display + ?Sized,> CaptureDisplay for Capture<'_, T,> {
    fn capture_display(&self, limit: usize,) -> Option<String,> {
        Some(render_bounded(&self.0, limit,),)
    }
}

#[doc(hidden)]
pub trait CaptureNoDisplay {
    fn capture_display(&self, limit: usize,) -> Option<String,>;
}

impl<T: ?Sized,> CaptureNoDisplay for &Capture<'_, T,> {
    fn capture_display(&self, _: usize,) -> Option<String,> {
        None
    }
}

struct AsDebug<'a, T: ?Sized,>(&'a T,);

impl<T: fmt::Debug + ?Sized,> fmt::Display for AsDebug<'_, T,> {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        fmt::Debug::fmt(self.0, f,)
    }
}

/// Stops accepting text once `limit` bytes are written.
struct Bounded {
    buf: String,
    limit: usize,
    truncated: bool,
}

impl fmt::Write for Bounded {
    fn write_str(&mut self, s: &str,) -> fmt::Result {
        let room = self.limit - self.buf.len();
        if s.len() <= room {
            self.buf.push_str(s,);
            return Ok((),);
        }
        let mut cut = room;
        while !s.is_char_boundary(cut,) {
            cut -= 1;
        }
        self.buf.push_str(&s[..cut],);
        self.truncated = true;
        Err(fmt::Error,)
    }
}

/// Renders `value`, truncating output past `limit` bytes and turning a
/// panicking or failing `fmt` impl into a placeholder.
pub fn render_bounded(value: &dyn fmt::Display, limit: usize,) -> String {
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut out = Bounded { buf: String::new(), limit, truncated: false, };
        let written = write!(out, "{value}");
        (out, written,)
    },),);
    match rendered {
        Ok((out, _,),) if out.truncated => format!("{}...", out.buf),
        Ok((out, Ok((),),),) => out.buf,
        Ok((_, Err(_,),),) => "<error formatting value>".to_string(),
        Err(payload,) => format!("<unrepresentable value: {}>", panic_message(payload.as_ref(),)),
    }
}

/// [`render_bounded`] over a value's `Debug` output.
pub fn render_debug(value: &dyn fmt::Debug, limit: usize,) -> String {
    render_bounded(&AsDebug(value,), limit,)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send),) -> String {
    if let Some(message,) = payload.downcast_ref::<&str,>() {
        message.to_string()
    } else if let Some(message,) = payload.downcast_ref::<String,>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

// ── Frames ──────────────────────────────────────────────────────────────────

struct FrameState {
    bindings: Bindings,
    assertions: usize,
    failures: usize,
}

thread_local! {
    static FRAMES: RefCell<Vec<FrameState,>,> = const { RefCell::new(Vec::new(),) };
}

/// Keeps a test frame active on this thread until dropped or finished.
#[must_use = "the frame ends when the guard is dropped"]
pub struct FrameGuard {
    depth: usize,
    case_id: String,
    method: String,
    sink: Arc<dyn AssertionSink,>,
    // Frames live in thread-local storage; the guard must stay on its thread.
    _thread: PhantomData<*const (),>,
}

/// Starts a frame for `case`'s test method.
pub fn enter(case: &TestCase,) -> FrameGuard {
    let depth = FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        frames.push(FrameState { bindings: Bindings::new(), assertions: 0, failures: 0, },);
        frames.len()
    },);
    FrameGuard {
        depth,
        case_id: case.id().to_string(),
        method: case.method().to_string(),
        sink: case.sink_handle(),
        _thread: PhantomData,
    }
}

impl FrameGuard {
    /// Ends the frame and emits its run record.
    pub fn finish(self, failed: bool,) {
        let tallies = FRAMES.with(|frames| {
            frames.borrow().get(self.depth - 1,).map(|frame| (frame.assertions, frame.failures,),)
        },);
        let (assertions, failures,) = tallies.unwrap_or_default();
        let outcome = if failed || failures > 0 { Outcome::Fail } else { Outcome::Pass };
        self.sink.emit(&LogRecord::TestRun(TestRunEvent {
            test_case: self.case_id.clone(),
            test_method: self.method.clone(),
            outcome,
            assertions,
            failures,
            timestamp: Local::now(),
        },),);
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self,) {
        let _ = FRAMES.try_with(|frames| frames.borrow_mut().truncate(self.depth - 1,),);
    }
}

/// Records `value` under `name` in the innermost frame, as of source line
/// `line`. Outside a frame this does nothing.
pub fn bind(name: &str, value: Value, line: u32,) {
    FRAMES.with(|frames| {
        if let Some(frame,) = frames.borrow_mut().last_mut() {
            frame.bindings.insert(name, value.recorded_at(line,),);
        }
    },);
}

/// The innermost frame's bindings, if a frame is active.
pub fn bindings() -> Option<Bindings,> {
    FRAMES.with(|frames| frames.borrow().last().map(|frame| frame.bindings.clone(),),)
}

pub(crate) fn tally(failed: bool,) {
    FRAMES.with(|frames| {
        if let Some(frame,) = frames.borrow_mut().last_mut() {
            frame.assertions += 1;
            if failed {
                frame.failures += 1;
            }
        }
    },);
}

/// Snapshot of the visible locals: the active frame's bindings overlaid with
/// `explicit`, in binding order.
pub fn capture(explicit: Option<&Bindings,>,) -> LocalsSnapshot {
    let mut merged = bindings().unwrap_or_default();
    if let Some(explicit,) = explicit {
        for (name, value,) in explicit.iter() {
            merged.insert(name, value.clone(),);
        }
    }
    LocalsSnapshot::from_bindings(&merged,)
}

/// What a test function returned, as far as the run record is concerned.
pub trait TestReturn {
    fn is_failure(&self,) -> bool;
}

impl TestReturn for () {
    fn is_failure(&self,) -> bool {
        false
    }
}

impl<T, E,> TestReturn for Result<T, E,> {
    fn is_failure(&self,) -> bool {
        self.is_err()
    }
}
