use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::report::ContextualAssertionError;

/// Everything an assertion call can hand back to the test.
///
/// `Assertion` is a genuine test failure. `Annotation` and `Usage` mean the
/// assertion itself was called incorrectly and the predicate's verdict (if it
/// ran at all) should not be read as a pass or fail.
#[derive(Error,)]
pub enum Error {
    #[error("{0}")]
    Assertion(Box<ContextualAssertionError,>,),
    #[error(transparent)]
    Annotation(#[from] AnnotationError,),
    #[error(transparent)]
    Usage(#[from] UsageError,),
}

impl Error {
    /// Fails the current test with this error's text.
    #[track_caller]
    pub fn raise(self,) -> ! {
        panic!("{self}")
    }

    pub fn is_failure(&self,) -> bool {
        matches!(self, Self::Assertion(_,))
    }

    /// The failure report, if this is an assertion failure.
    pub fn as_failure(&self,) -> Option<&ContextualAssertionError,> {
        match self {
            Self::Assertion(failure,) => Some(failure,),
            _ => None,
        }
    }
}

impl From<ContextualAssertionError,> for Error {
    fn from(failure: ContextualAssertionError,) -> Self {
        Self::Assertion(Box::new(failure,),)
    }
}

// Tests returning `Result<(), marbles::Error>` print the error with `{:?}`;
// show the report rather than the struct dump.
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        fmt::Display::fmt(self, f,)
    }
}

/// The annotation supplied to an assertion is missing or unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error,)]
pub enum AnnotationError {
    #[error("annotation missing required field `{field}` for `{assertion}`")]
    MissingAnnotation { assertion: &'static str, field: &'static str, },
    #[error("malformed annotation template at byte {position}: {reason}")]
    MalformedTemplate { position: usize, reason: &'static str, },
}

/// An assertion was given arguments its predicate cannot evaluate.
#[derive(Debug, Error,)]
pub enum UsageError {
    #[error("length mismatch: first argument contains {first} elements, second argument contains {second} elements")]
    LengthMismatch { first: usize, second: usize, },
    #[error("cannot specify strict=false if lower == upper")]
    DegenerateInterval,
    #[error("expected a non-empty sequence")]
    EmptySequence,
    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("cannot read `{}`: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Problems configuring the process-wide assertion logger.
#[derive(Debug, Error,)]
pub enum LogError {
    #[error("assertion logger is already configured")]
    AlreadyConfigured,
    #[error("assertion logger has been shut down")]
    ShutDown,
    #[error("cannot open assertion log `{}`: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid verbosity field `{0}` (expected msg, note or locals)")]
    Verbosity(String,),
}
