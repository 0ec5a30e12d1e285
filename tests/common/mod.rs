#![allow(dead_code)]

use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Arc;

use marbles::TestCase;
use marbles::log::{AssertionEvent, LogRecord, MemorySink};

/// Unwraps test fixtures, naming the caller's line on failure.
pub trait Must<T,> {
    #[track_caller]
    fn must(self,) -> T;
}

impl<T,> Must<T,> for Option<T,> {
    #[track_caller]
    fn must(self,) -> T {
        self.unwrap_or_else(|| panic!("test invariant failed: expected Some, got None at {}", Location::caller()),)
    }
}

impl<T, E: std::fmt::Debug,> Must<T,> for Result<T, E,> {
    #[track_caller]
    fn must(self,) -> T {
        self.unwrap_or_else(|err| panic!("test invariant failed: expected Ok, got {:?} at {}", err, Location::caller()),)
    }
}

/// A case that records into memory instead of the global log.
pub fn recorded_case(method: &str,) -> (TestCase, Arc<MemorySink,>,) {
    let sink = Arc::new(MemorySink::new(),);
    (TestCase::new(module_path!(), method,).sink(sink.clone(),), sink,)
}

/// Runs `f`, which must panic, and returns the panic text.
#[track_caller]
pub fn failure_text(f: impl FnOnce(),) -> String {
    match panic::catch_unwind(AssertUnwindSafe(f,),) {
        Ok((),) => panic!("expected a failure at {}", Location::caller()),
        Err(payload,) => payload
            .downcast_ref::<String,>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str,>().map(|text| text.to_string(),),)
            .unwrap_or_default(),
    }
}

pub fn only_assertion(sink: &MemorySink,) -> AssertionEvent {
    let mut events = sink.assertions();
    assert_eq!(events.len(), 1, "expected one assertion record");
    events.remove(0,)
}

pub fn run_records(sink: &MemorySink,) -> usize {
    sink.records().iter().filter(|record| matches!(record, LogRecord::TestRun(_,)),).count()
}
