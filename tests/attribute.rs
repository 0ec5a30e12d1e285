mod common;

use std::sync::Arc;

use common::{Must, failure_text};
use marbles::log::{LogRecord, MemorySink, Outcome, TestRunEvent};
use marbles::{AnnotationError, Assertions, Context, Error, TestCase, check};
use pretty_assertions::assert_eq;

thread_local! {
    static SINK: Arc<MemorySink> = Arc::new(MemorySink::new());
}

fn recorded(case: TestCase,) -> TestCase {
    case.sink(sink(),)
}

fn sink() -> Arc<MemorySink,> {
    SINK.with(Arc::clone,)
}

fn runs_since(before: usize,) -> Vec<TestRunEvent,> {
    sink()
        .records()
        .into_iter()
        .skip(before,)
        .filter_map(|record| match record {
            LogRecord::TestRun(run,) => Some(run,),
            LogRecord::Assertion(_,) => None,
        },)
        .collect()
}

fn seen(name: &str,) -> Option<String,> {
    marbles::frame::bindings().and_then(|bindings| bindings.get(name,).map(|value| value.debug().to_string(),),)
}

#[marbles::test(fixture = recorded)]
#[should_panic(expected = "Locals:")]
fn failing_total(case: &TestCase) {
    let items = vec![3, 4];
    let mut total = 0;
    for item in &items {
        total += item;
    }
    let _scratch = "never shown";
    check!(case.assert_equal(&total, &8), note = "summed {total} from {items:?}");
}

#[test]
fn failure_lists_locals_as_the_body_bound_them() {
    let before = sink().records().len();
    let text = failure_text(failing_total,);

    assert!(text.starts_with("7 != 8\n\nSource (tests/attribute.rs):"), "{text}");
    assert!(text.contains(" >   "), "{text}");
    assert!(
        text.contains(
            "Locals:\n\titems=[3, 4] (as of line 41)\n\ttotal=7 (as of line 44)\n\titem=4 (as of line 43)\nNote:"
        ),
        "{text}"
    );
    assert!(!text.contains("_scratch"), "{text}");
    assert!(text.ends_with("Note:\n\tsummed 7 from [3, 4]"), "{text}");

    let runs = runs_since(before,);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].test_method, "failing_total");
    assert_eq!(runs[0].outcome, Outcome::Fail);
    assert_eq!((runs[0].assertions, runs[0].failures), (1, 1));
}

#[marbles::test(fixture = recorded)]
#[should_panic(expected = "Locals:")]
fn pushes_then_fails(case: &TestCase) {
    let mut seen = Vec::new();
    seen.push(1,);
    seen.push(2,);
    check!(case.assert_equal(&seen.len(), &3));
}

#[test]
fn values_changed_by_method_calls_are_current_in_the_report() {
    let text = failure_text(pushes_then_fails,);
    assert!(text.starts_with("2 != 3\n\n"), "{text}");
    assert!(text.contains("Locals:\n\tseen=[1, 2] (as of line 78)"), "{text}");
}

#[marbles::test]
fn mutable_borrows_are_recorded_after_the_statement() {
    let mut buffer = String::from("a",);
    append(&mut buffer,);
    assert_eq!(seen("buffer"), Some("\"ab\"".to_string()));

    let mut counts = [0, 0,];
    counts[1] += 1;
    counts.swap(0, 1,);
    assert_eq!(seen("counts"), Some("[1, 0]".to_string()));
}

fn append(buffer: &mut String,) {
    buffer.push('b',);
}

#[marbles::test(fixture = recorded)]
fn returns_result(case: &TestCase) -> Result<(), Error> {
    let name = "marbles";
    case.assert_true(name.starts_with('m',), Context::new().note("{name} starts with m",),)?;
    case.assert_equal(&name.len(), &7, Context::new(),)?;
    Ok((),)
}

#[test]
fn result_returning_test_records_a_passing_run() {
    let before = sink().records().len();
    returns_result().must();

    let runs = runs_since(before,);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].outcome, Outcome::Pass);
    assert_eq!(runs[0].assertions, 2);
    assert!(runs[0].test_case.ends_with("attribute"));
}

#[marbles::test(annotated, fixture = recorded)]
fn annotated_requires_a_note(case: &TestCase) {
    let result = case.assert_true(true, Context::new(),);
    assert!(
        matches!(result, Err(Error::Annotation(AnnotationError::MissingAnnotation { assertion: "assert_true", .. }))),
        "{result:?}"
    );
    check!(case.assert_true(true), note = "always holds");
}

#[test]
fn missing_note_counts_against_the_run() {
    let before = sink().records().len();
    annotated_requires_a_note();

    let runs = runs_since(before,);
    assert_eq!(runs[0].outcome, Outcome::Fail);
    assert_eq!((runs[0].assertions, runs[0].failures), (2, 1));
}

#[marbles::test]
fn arms_lets_and_assignments_are_recorded() {
    let parsed: Result<u32, String,> = "42".parse::<u32>().map_err(|err| err.to_string(),);
    match parsed {
        Ok(value,) => assert_eq!(seen("value"), Some("42".to_string())),
        Err(reason,) => panic!("{reason}"),
    }

    let mut point = (1, 2,);
    assert_eq!(seen("point"), Some("(1, 2)".to_string()));
    point.0 = 5;
    assert_eq!(seen("point"), Some("(5, 2)".to_string()));

    if let Some(first,) = "a,b".split(',',).next() {
        assert_eq!(seen("first"), Some("\"a\"".to_string()));
    }

    let double = |n: u32| {
        let inner = n * 2;
        inner
    };
    assert_eq!(double(2), 4);
    assert_eq!(seen("inner"), None);
    assert_eq!(point.1, 2);
}

#[test]
fn locals_are_not_recorded_outside_a_marked_test() {
    let outside = 1;
    assert_eq!(outside, 1);
    assert_eq!(marbles::frame::bindings(), None);
}
