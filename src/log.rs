//! Structured assertion logging.
//!
//! Every assertion attempt and every `#[marbles::test]` run produces a
//! [`LogRecord`] for an [`AssertionSink`]. The process-wide sink is
//! [`LOGGER`]: it drops records until configured, then writes one JSON object
//! per line to the configured file.
//!
//! ```no_run
//! use marbles::log::{LogConfig, LOGGER};
//!
//! LOGGER.configure(LogConfig::new("target/marbles.jsonl").attrs(["dataset"])).ok();
//! ```
//!
//! Failures always carry `msg`, `note` and `locals`; passing assertions carry
//! the fields named by [`Verbosity`]. `MARBLES_LOG_VERBOSE` (`true`, `false`
//! or a comma list of `msg,note,locals`) overrides the configured verbosity.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};

use crate::error::LogError;
use crate::frame::LocalsSnapshot;

pub const MARBLES_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERBOSE_ENV: &str = "MARBLES_LOG_VERBOSE";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize,)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    /// The assertion was misused or its predicate panicked.
    Error,
}

impl Outcome {
    pub fn as_str(self,) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        f.write_str(self.as_str(),)
    }
}

/// One assertion attempt.
#[derive(Debug, Clone, PartialEq,)]
pub struct AssertionEvent {
    pub test_case: String,
    pub test_method: String,
    pub assertion: &'static str,
    pub outcome: Outcome,
    pub file: String,
    pub line: u32,
    /// `Debug` renderings of the assertion's positional arguments.
    pub args: Vec<String,>,
    pub msg: Option<String,>,
    pub note: Option<String,>,
    pub locals: Option<LocalsSnapshot,>,
    /// The test case's public attributes, already serialized.
    pub attrs: Map<String, JsonValue,>,
    pub timestamp: DateTime<Local,>,
}

/// One test function run under `#[marbles::test]`.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct TestRunEvent {
    pub test_case: String,
    pub test_method: String,
    pub outcome: Outcome,
    pub assertions: usize,
    pub failures: usize,
    pub timestamp: DateTime<Local,>,
}

#[derive(Debug, Clone, PartialEq,)]
pub enum LogRecord {
    Assertion(AssertionEvent,),
    TestRun(TestRunEvent,),
}

/// Which optional fields passing assertions carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq,)]
pub struct Verbosity {
    pub msg: bool,
    pub note: bool,
    pub locals: bool,
}

impl Verbosity {
    pub const NONE: Self = Self { msg: false, note: false, locals: false, };
    pub const ALL: Self = Self { msg: true, note: true, locals: true, };

    /// Parses `true`, `false` or a comma list of `msg`, `note`, `locals`.
    pub fn parse(text: &str,) -> Result<Self, LogError,> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("true",) {
            return Ok(Self::ALL,);
        }
        if text.eq_ignore_ascii_case("false",) || text.is_empty() {
            return Ok(Self::NONE,);
        }
        text.split(',',).map(str::trim,).filter(|field| !field.is_empty(),).try_fold(
            Self::NONE,
            |mut verbosity, field| {
                match field {
                    "msg" => verbosity.msg = true,
                    "note" => verbosity.note = true,
                    "locals" => verbosity.locals = true,
                    other => return Err(LogError::Verbosity(other.to_string(),),),
                }
                Ok(verbosity,)
            },
        )
    }

    /// The `MARBLES_LOG_VERBOSE` override, read once per process.
    pub fn from_env() -> Option<Self,> {
        static FROM_ENV: OnceLock<Option<Verbosity,>,> = OnceLock::new();
        *FROM_ENV.get_or_init(|| {
            let text = std::env::var(VERBOSE_ENV,).ok()?;
            match Self::parse(&text,) {
                Ok(verbosity,) => Some(verbosity,),
                Err(error,) => {
                    tracing::warn!(%error, "ignoring {}", VERBOSE_ENV);
                    None
                }
            }
        },)
    }
}

/// Where log records go.
pub trait AssertionSink: Send + Sync {
    fn emit(&self, record: &LogRecord,);

    /// Fields to capture for passing assertions.
    fn verbosity(&self,) -> Verbosity {
        Verbosity::NONE
    }

    fn flush(&self,) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct LogConfig {
    pub logfile: PathBuf,
    /// Attributes written on failed assertions.
    pub attrs: Vec<String,>,
    /// Attributes written on every assertion.
    pub verbose_attrs: Vec<String,>,
    pub verbose: Verbosity,
}

impl LogConfig {
    pub fn new(logfile: impl Into<PathBuf,>,) -> Self {
        Self { logfile: logfile.into(), ..Self::default() }
    }

    pub fn attrs<I: IntoIterator<Item = S,>, S: Into<String,>,>(mut self, attrs: I,) -> Self {
        self.attrs = attrs.into_iter().map(Into::into,).collect();
        self
    }

    pub fn verbose_attrs<I: IntoIterator<Item = S,>, S: Into<String,>,>(mut self, attrs: I,) -> Self {
        self.verbose_attrs = attrs.into_iter().map(Into::into,).collect();
        self
    }

    pub fn verbose(mut self, verbose: Verbosity,) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Encodes a record as the JSON object written to the log.
///
/// `attrs` are included for failures and errors, `verbose_attrs` always. A
/// named attribute the test case does not have is written as `null`, and no
/// attribute replaces one of the record's own keys.
pub fn encode(record: &LogRecord, attrs: &[String], verbose_attrs: &[String],) -> JsonValue {
    let mut doc = Map::new();
    match record {
        LogRecord::Assertion(event,) => {
            doc.insert("kind".into(), json!("assertion"),);
            doc.insert("test_case".into(), json!(event.test_case),);
            doc.insert("test_method".into(), json!(event.test_method),);
            doc.insert("assertion".into(), json!(event.assertion),);
            doc.insert("result".into(), json!(event.outcome),);
            doc.insert("file".into(), json!(event.file),);
            doc.insert("line".into(), json!(event.line),);
            doc.insert("args".into(), json!(event.args),);
            doc.insert("@timestamp".into(), json!(event.timestamp.format(TIMESTAMP_FORMAT).to_string()),);
            if let Some(msg,) = &event.msg {
                doc.insert("msg".into(), json!(msg),);
            }
            if let Some(note,) = &event.note {
                doc.insert("note".into(), json!(note),);
            }
            if let Some(locals,) = &event.locals {
                let locals = locals
                    .iter()
                    .map(|(key, value,)| json!({ "key": key, "value": value.debug() }),)
                    .collect::<Vec<_,>>();
                doc.insert("locals".into(), JsonValue::Array(locals,),);
            }

            let failed = event.outcome != Outcome::Pass;
            let names = verbose_attrs.iter().chain(attrs.iter().filter(|_| failed,),);
            for name in names {
                if !doc.contains_key(name,) {
                    let value = event.attrs.get(name,).cloned().unwrap_or(JsonValue::Null,);
                    doc.insert(name.clone(), value,);
                }
            }
        }
        LogRecord::TestRun(run,) => {
            doc.insert("kind".into(), json!("test_run"),);
            doc.insert("test_case".into(), json!(run.test_case),);
            doc.insert("test_method".into(), json!(run.test_method),);
            doc.insert("result".into(), json!(run.outcome),);
            doc.insert("assertions".into(), json!(run.assertions),);
            doc.insert("failures".into(), json!(run.failures),);
            doc.insert("@timestamp".into(), json!(run.timestamp.format(TIMESTAMP_FORMAT).to_string()),);
        }
    }
    doc.insert("marbles_version".into(), json!(MARBLES_VERSION),);
    JsonValue::Object(doc,)
}

/// Appends one JSON object per record to a file.
#[derive(Debug,)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File,>,
    attrs: Vec<String,>,
    verbose_attrs: Vec<String,>,
    verbosity: Verbosity,
    warned: AtomicBool,
}

impl JsonLinesSink {
    pub fn open(config: &LogConfig,) -> Result<Self, LogError,> {
        let file = OpenOptions::new()
            .create(true,)
            .append(true,)
            .open(&config.logfile,)
            .map_err(|source| LogError::Open { path: config.logfile.clone(), source, },)?;
        Ok(Self {
            path: config.logfile.clone(),
            file: Mutex::new(file,),
            attrs: config.attrs.clone(),
            verbose_attrs: config.verbose_attrs.clone(),
            verbosity: Verbosity::from_env().unwrap_or(config.verbose,),
            warned: AtomicBool::new(false,),
        },)
    }

    pub fn path(&self,) -> &Path {
        &self.path
    }

    fn warn_once(&self, error: &dyn fmt::Display,) {
        if !self.warned.swap(true, Ordering::Relaxed,) {
            tracing::warn!(path = %self.path.display(), %error, "cannot write assertion log");
        }
    }
}

impl AssertionSink for JsonLinesSink {
    fn emit(&self, record: &LogRecord,) {
        let mut line = encode(record, &self.attrs, &self.verbose_attrs,).to_string();
        line.push('\n',);
        // One write per line keeps concurrent appends from interleaving.
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner,);
        if let Err(error,) = file.write_all(line.as_bytes(),) {
            self.warn_once(&error,);
        }
    }

    fn verbosity(&self,) -> Verbosity {
        self.verbosity
    }

    fn flush(&self,) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner,);
        if let Err(error,) = file.flush() {
            self.warn_once(&error,);
        }
    }
}

/// Keeps records in memory.
#[derive(Debug, Default,)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord,>,>,
    verbosity: Verbosity,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(verbosity: Verbosity,) -> Self {
        Self { verbosity, ..Self::default() }
    }

    pub fn records(&self,) -> Vec<LogRecord,> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner,).clone()
    }

    /// Only the assertion events, in emission order.
    pub fn assertions(&self,) -> Vec<AssertionEvent,> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                LogRecord::Assertion(event,) => Some(event,),
                LogRecord::TestRun(_,) => None,
            },)
            .collect()
    }
}

impl AssertionSink for MemorySink {
    fn emit(&self, record: &LogRecord,) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner,).push(record.clone(),);
    }

    fn verbosity(&self,) -> Verbosity {
        self.verbosity
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default,)]
pub struct NullSink;

impl AssertionSink for NullSink {
    fn emit(&self, _: &LogRecord,) {}
}

enum State {
    Unconfigured,
    Active(Arc<dyn AssertionSink,>,),
    Closed,
}

/// A sink that can be configured once and shut down.
pub struct Logger {
    state: RwLock<State,>,
}

/// The process-wide logger test cases report to unless given their own sink.
pub static LOGGER: Logger = Logger::new();

impl Logger {
    pub const fn new() -> Self {
        Self { state: RwLock::new(State::Unconfigured,), }
    }

    /// Starts writing JSON lines to `config.logfile`.
    pub fn configure(&self, config: LogConfig,) -> Result<(), LogError,> {
        self.check_unconfigured()?;
        let sink = JsonLinesSink::open(&config,)?;
        self.install(Arc::new(sink,),)
    }

    /// Routes records to `sink`.
    pub fn install(&self, sink: Arc<dyn AssertionSink,>,) -> Result<(), LogError,> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner,);
        match *state {
            State::Unconfigured => {
                *state = State::Active(sink,);
                Ok((),)
            }
            State::Active(_,) => Err(LogError::AlreadyConfigured,),
            State::Closed => Err(LogError::ShutDown,),
        }
    }

    /// Flushes the sink and stops logging for good.
    pub fn shutdown(&self,) {
        let previous = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner,);
            std::mem::replace(&mut *state, State::Closed,)
        };
        if let State::Active(sink,) = previous {
            sink.flush();
        }
    }

    pub fn is_enabled(&self,) -> bool {
        matches!(*self.state.read().unwrap_or_else(PoisonError::into_inner,), State::Active(_,))
    }

    fn check_unconfigured(&self,) -> Result<(), LogError,> {
        match *self.state.read().unwrap_or_else(PoisonError::into_inner,) {
            State::Unconfigured => Ok((),),
            State::Active(_,) => Err(LogError::AlreadyConfigured,),
            State::Closed => Err(LogError::ShutDown,),
        }
    }

    fn active(&self,) -> Option<Arc<dyn AssertionSink,>,> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner,) {
            State::Active(sink,) => Some(Arc::clone(sink,),),
            _ => None,
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        f.debug_struct("Logger",).field("enabled", &self.is_enabled(),).finish()
    }
}

impl AssertionSink for Logger {
    fn emit(&self, record: &LogRecord,) {
        if let Some(sink,) = self.active() {
            sink.emit(record,);
        }
    }

    fn verbosity(&self,) -> Verbosity {
        self.active().map(|sink| sink.verbosity(),).unwrap_or_default()
    }

    fn flush(&self,) {
        if let Some(sink,) = self.active() {
            sink.flush();
        }
    }
}

/// Forwards to [`LOGGER`]; the default sink of every test case.
#[derive(Debug, Clone, Copy, Default,)]
pub struct Global;

impl AssertionSink for Global {
    fn emit(&self, record: &LogRecord,) {
        LOGGER.emit(record,);
    }

    fn verbosity(&self,) -> Verbosity {
        LOGGER.verbosity()
    }

    fn flush(&self,) {
        LOGGER.flush();
    }
}
