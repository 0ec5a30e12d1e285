//! The failure report.

use std::fmt;
use std::panic::Location;

use crate::annotation::{self, NOTE_WIDTH};
use crate::frame::LocalsSnapshot;
use crate::source::SourceExcerpt;

/// Heading of the annotation section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash,)]
pub enum Label {
    Note,
    Advice,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        f.write_str(match self {
            Self::Note => "Note",
            Self::Advice => "Advice",
        },)
    }
}

/// A failed assertion together with everything known about where and why.
///
/// Displaying it gives the report shown to the test author:
///
/// ```text
/// <message>
///
/// Source (<file>):
///  >   83 case.assert_true(false)
///      84 }
/// Locals:
///     x=5
/// Note:
///     value was 5, expected 10
/// ```
///
/// Sections with nothing to show are left out along with their heading.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct ContextualAssertionError {
    assertion: &'static str,
    message: String,
    file: String,
    line: u32,
    excerpt: Option<SourceExcerpt,>,
    locals: LocalsSnapshot,
    note: Option<String,>,
    label: Label,
}

pub type FailureReport = ContextualAssertionError;

impl ContextualAssertionError {
    pub fn new(assertion: &'static str, message: impl Into<String,>, location: &Location<'_,>,) -> Self {
        Self {
            assertion,
            message: message.into(),
            file: location.file().to_string(),
            line: location.line(),
            excerpt: None,
            locals: LocalsSnapshot::default(),
            note: None,
            label: Label::Note,
        }
    }

    pub fn with_excerpt(mut self, excerpt: Option<SourceExcerpt,>,) -> Self {
        self.excerpt = excerpt.filter(|excerpt| !excerpt.is_empty(),);
        self
    }

    pub fn with_locals(mut self, locals: LocalsSnapshot,) -> Self {
        self.locals = locals;
        self
    }

    /// Attaches the rendered annotation. Blank text counts as no note.
    pub fn with_note(mut self, label: Label, note: Option<String,>,) -> Self {
        self.label = label;
        self.note = note.filter(|note| !note.trim().is_empty(),);
        self
    }

    /// Name of the assertion that failed, e.g. `assert_equal`.
    pub fn assertion(&self,) -> &'static str {
        self.assertion
    }

    /// The predicate's message, or the caller's override.
    pub fn message(&self,) -> &str {
        &self.message
    }

    /// The rendered annotation, before wrapping.
    pub fn note(&self,) -> Option<&str,> {
        self.note.as_deref()
    }

    pub fn label(&self,) -> Label {
        self.label
    }

    pub fn locals(&self,) -> &LocalsSnapshot {
        &self.locals
    }

    pub fn file(&self,) -> &str {
        &self.file
    }

    pub fn line(&self,) -> u32 {
        self.line
    }

    pub fn excerpt(&self,) -> Option<&SourceExcerpt,> {
        self.excerpt.as_ref()
    }
}

impl fmt::Display for ContextualAssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        let mut sections = Vec::new();
        if let Some(excerpt,) = &self.excerpt {
            sections.push(format!("Source ({}):\n{}", excerpt.file, excerpt.render()),);
        }
        if !self.locals.is_empty() {
            sections.push(format!("Locals:\n{}", self.locals.render()),);
        }
        if let Some(note,) = &self.note {
            sections.push(format!("{}:\n{}", self.label, annotation::wrap_note(note, NOTE_WIDTH,)),);
        }

        f.write_str(&self.message,)?;
        if !sections.is_empty() {
            write!(f, "\n\n{}", sections.join("\n",))?;
        }
        Ok((),)
    }
}

impl std::error::Error for ContextualAssertionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Bindings, Value};
    use crate::source::SourceLocator;
    use pretty_assertions::assert_eq;

    const SOURCE: &[&str] = &[
        "    let x = 5;",
        "    case.assert_equal(x, 10, Context::default());",
        "    drop(x);",
    ];

    fn report() -> ContextualAssertionError {
        ContextualAssertionError::new("assert_equal", "5 != 10", Location::caller(),)
    }

    #[test]
    fn full_report_layout() {
        let excerpt = SourceLocator::default().locate_in("tests/example.rs", SOURCE, 2,);
        let locals = LocalsSnapshot::from_bindings(&Bindings::new().bind("x", Value::text_only("5",),),);
        let failure = report()
            .with_excerpt(excerpt,)
            .with_locals(locals,)
            .with_note(Label::Note, Some("value was 5, expected 10".to_string(),),);

        let expected = [
            "5 != 10",
            "",
            "Source (tests/example.rs):",
            "      1 let x = 5;",
            " >    2 case.assert_equal(x, 10, Context::default());",
            "      3 drop(x);",
            "Locals:",
            "\tx=5",
            "Note:",
            "\tvalue was 5, expected 10",
        ];
        assert_eq!(failure.to_string(), expected.join("\n"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        assert_eq!(report().to_string(), "5 != 10");

        let failure = report().with_note(Label::Advice, Some("check the feed".to_string(),),);
        assert_eq!(failure.to_string(), "5 != 10\n\nAdvice:\n\tcheck the feed");
        assert!(!failure.to_string().contains("Locals:"));
        assert!(!failure.to_string().contains("Source ("));
    }

    #[test]
    fn blank_note_is_no_note() {
        let failure = report().with_note(Label::Note, Some("  \n".to_string(),),);
        assert_eq!(failure.note(), None);
        assert_eq!(failure.to_string(), "5 != 10");
    }

    #[test]
    fn accessors_expose_report_parts() {
        let failure = report().with_note(Label::Advice, Some("advice".to_string(),),);
        assert_eq!(failure.assertion(), "assert_equal");
        assert_eq!(failure.message(), "5 != 10");
        assert_eq!(failure.label(), Label::Advice);
        assert_eq!(failure.file(), file!());
        assert!(failure.excerpt().is_none());
        assert!(failure.locals().is_empty());
    }
}
