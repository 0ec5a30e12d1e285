mod common;

use common::{failure_text, only_assertion, recorded_case};
use marbles::log::Outcome;
use marbles::{Assertions, Context, Error, Label, TestCase, check};
use pretty_assertions::assert_eq;

#[test]
fn report_shows_the_whole_statement_with_context() {
    let (case, _sink,) = recorded_case("report_shows_the_whole_statement_with_context",);
    let result = 1 + 1;
    let _temp = "scratch";
    let locals = || marbles::locals![result, _temp];
    let outcome = case.assert_equal(
        &result,
        &3,
        Context::new().note("result was {result}",).locals(&locals,),
    );
    let text = outcome.err().map(|error| error.to_string(),).unwrap_or_default();

    let excerpt = text
        .lines()
        .skip_while(|line| !line.starts_with("Source (",),)
        .skip(1,)
        .take_while(|line| line.starts_with(' ',),)
        .collect::<Vec<_,>>();
    assert_eq!(excerpt.len(), 7, "{text}");
    assert!(excerpt[0].ends_with("let locals = || marbles::locals![result, _temp];"), "{text}");
    assert!(excerpt[1].starts_with(" >   "), "{text}");
    assert!(excerpt[1].ends_with("let outcome = case.assert_equal("), "{text}");
    assert!(excerpt[2..5].iter().all(|line| line.starts_with("      ")), "{text}");
    assert!(excerpt[5].ends_with(");"), "{text}");
    assert!(excerpt[6].ends_with("let text = outcome.err().map(|error| error.to_string(),).unwrap_or_default();"), "{text}");

    assert!(text.starts_with("2 != 3\n\nSource (tests/report.rs):\n"), "{text}");
    assert!(text.contains("Locals:\n\tresult=2\nNote:\n\tresult was 2"), "{text}");
    assert!(!text.contains("_temp"), "{text}");
}

#[test]
fn locals_section_is_omitted_without_visible_locals() {
    let (case, _sink,) = recorded_case("locals_section_is_omitted_without_visible_locals",);
    let _hidden = 3;
    let text = failure_text(|| {
        check!(case.assert_true(false); locals = [_hidden]);
    },);
    assert!(text.starts_with("false is not true\n\nSource ("), "{text}");
    assert!(!text.contains("Locals:"), "{text}");
    assert!(!text.contains("Note:"), "{text}");
}

#[test]
fn report_is_available_as_a_value() {
    let (case, sink,) = recorded_case("report_is_available_as_a_value",);
    let limit = 10;
    let outcome = case.assert_less(&12, &limit, Context::new().note("limit is {limit}",),);

    let report = match outcome {
        Err(Error::Assertion(report,),) => report,
        other => panic!("expected a report, got {other:?}"),
    };
    assert_eq!(report.assertion(), "assert_less");
    assert_eq!(report.message(), "12 not less than 10");
    assert_eq!(report.file(), "tests/report.rs");
    assert_eq!(report.label(), Label::Note);
    // the locals closure was not given, so the note sees nothing to fill in
    assert_eq!(report.note(), Some("limit is {limit}"));

    let event = only_assertion(&sink,);
    assert_eq!(event.outcome, Outcome::Fail);
    assert_eq!(event.line, report.line());
}

#[test]
fn annotated_case_labels_the_note_advice() {
    let (case, _sink,) = recorded_case("annotated_case_labels_the_note_advice",);
    let case: TestCase = case.annotated();
    let expected = "ready";
    let text = failure_text(|| {
        check!(case.assert_equal(&"pending", &expected), note = "state should be {expected}"; locals = [expected]);
    },);
    assert!(text.ends_with("Advice:\n\tstate should be ready"), "{text}");
}
