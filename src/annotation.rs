//! Annotation templates.
//!
//! A note (or advice) is written as a template such as
//! `"value was {x}, expected {y}"` and rendered against the failing test's
//! visible locals and the test case's public attributes. Placeholders:
//!
//! * `{name}` renders with `Display` when the value has it, `Debug` otherwise
//! * `{name:?}` and `{name!r}` render with `Debug`
//! * `{self.name}` looks only at the test case's attributes
//!
//! `{{` and `}}` produce literal braces. A placeholder that names nothing
//! known is left in the output as written.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::AnnotationError;
use crate::frame::{Bindings, LocalsSnapshot, Value};

/// Column at which rendered notes wrap.
pub const NOTE_WIDTH: usize = 72;

/// An annotation template, kept unrendered until a failure needs it.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Annotation {
    template: String,
}

impl Annotation {
    pub fn new(template: impl Into<String,>,) -> Self {
        Self { template: template.into(), }
    }

    pub fn template(&self,) -> &str {
        &self.template
    }

    pub fn validate(&self,) -> Result<(), AnnotationError,> {
        validate(&self.template,)
    }

    pub fn render(&self, locals: &LocalsSnapshot, attrs: &Bindings,) -> String {
        render(&self.template, locals, attrs,)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
enum Style {
    Text,
    Debug,
}

#[derive(Debug, PartialEq, Eq,)]
enum Segment<'a,> {
    Literal(&'a str,),
    Field { raw: &'a str, name: &'a str, attr_only: bool, style: Style, },
}

/// Checks that `template` parses. Offsets in the error are byte positions in
/// the dedented template.
pub fn validate(template: &str,) -> Result<(), AnnotationError,> {
    parse(&dedent(template,),).map(|_| (),)
}

/// Renders `template` against `locals` then `attrs`. Never fails: a template
/// that does not parse comes back dedented but otherwise untouched.
pub fn render(template: &str, locals: &LocalsSnapshot, attrs: &Bindings,) -> String {
    let template = dedent(template,);
    let Ok(segments,) = parse(&template,) else {
        return template;
    };
    let mut out = String::with_capacity(template.len(),);
    for segment in segments {
        match segment {
            Segment::Literal(text,) => out.push_str(text,),
            Segment::Field { raw, name, attr_only, style, } => {
                let value = if attr_only { lookup_attr(attrs, name,) } else { lookup(locals, attrs, name,) };
                match (value, style,) {
                    (Some(value,), Style::Text,) => out.push_str(value.text(),),
                    (Some(value,), Style::Debug,) => out.push_str(value.debug(),),
                    (None, _,) => out.push_str(raw,),
                }
            }
        }
    }
    out
}

fn lookup<'v,>(locals: &'v LocalsSnapshot, attrs: &'v Bindings, name: &str,) -> Option<&'v Value,> {
    locals.get(name,).or_else(|| lookup_attr(attrs, name,),)
}

fn lookup_attr<'v,>(attrs: &'v Bindings, name: &str,) -> Option<&'v Value,> {
    if name.starts_with('_',) {
        return None;
    }
    attrs.get(name,)
}

fn parse(template: &str,) -> Result<Vec<Segment<'_,>,>, AnnotationError,> {
    let bytes = template.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1,) == Some(&b'{',) => {
                segments.push(Segment::Literal(&template[literal_start..i + 1],),);
                i += 2;
                literal_start = i;
            }
            b'}' if bytes.get(i + 1,) == Some(&b'}',) => {
                segments.push(Segment::Literal(&template[literal_start..i + 1],),);
                i += 2;
                literal_start = i;
            }
            b'}' => return Err(malformed(i, "single '}' encountered",),),
            b'{' => {
                let close = template[i + 1..]
                    .find(['{', '}',],)
                    .map(|offset| i + 1 + offset,)
                    .ok_or_else(|| malformed(i, "expected '}' before end of string",),)?;
                if bytes[close] == b'{' {
                    return Err(malformed(close, "nested '{' in replacement field",),);
                }
                if literal_start < i {
                    segments.push(Segment::Literal(&template[literal_start..i],),);
                }
                segments.push(field(&template[i..=close], i,)?,);
                i = close + 1;
                literal_start = i;
            }
            _ => i += 1,
        }
    }
    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..],),);
    }
    Ok(segments,)
}

fn field(raw: &str, position: usize,) -> Result<Segment<'_,>, AnnotationError,> {
    let inner = &raw[1..raw.len() - 1];
    let (target, style,) = if let Some(target,) = inner.strip_suffix("!r",) {
        (target, Style::Debug,)
    } else if let Some((target, spec,),) = inner.split_once(':',) {
        match spec {
            "?" | "#?" => (target, Style::Debug,),
            "" => (target, Style::Text,),
            _ => return Err(malformed(position, "unsupported format spec",),),
        }
    } else if inner.contains('!',) {
        return Err(malformed(position, "unsupported conversion",),);
    } else {
        (inner, Style::Text,)
    };
    let target = target.trim();
    if target.is_empty() {
        return Err(malformed(position, "empty field name",),);
    }
    let (name, attr_only,) = match target.strip_prefix("self.",) {
        Some(name,) => (name, true,),
        None => (target, false,),
    };
    if !is_identifier(name,) {
        return Err(malformed(position, "invalid field name",),);
    }
    Ok(Segment::Field { raw, name, attr_only, style, },)
}

fn is_identifier(name: &str,) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric(),)
}

fn malformed(position: usize, reason: &'static str,) -> AnnotationError {
    AnnotationError::MalformedTemplate { position, reason, }
}

/// Removes the whitespace prefix shared by every non-blank line and drops
/// leading and trailing blank lines.
pub fn dedent(text: &str,) -> String {
    let lines: Vec<&str,> = text.lines().collect();
    let prefix = lines
        .iter()
        .filter(|line| !line.trim().is_empty(),)
        .map(|line| &line[..line.len() - line.trim_start().len()],)
        .reduce(common_prefix,)
        .unwrap_or("",);
    let first = lines.iter().position(|line| !line.trim().is_empty(),);
    let last = lines.iter().rposition(|line| !line.trim().is_empty(),);
    let (Some(first,), Some(last,),) = (first, last,) else {
        return String::new();
    };
    lines[first..=last]
        .iter()
        .map(|line| if line.trim().is_empty() { "" } else { &line[prefix.len()..] },)
        .collect::<Vec<_,>>()
        .join("\n",)
}

fn common_prefix<'a,>(a: &'a str, b: &'a str,) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars(),)
        .find(|((_, x,), y,)| x != y,)
        .map(|((index, _,), _,)| index,)
        .unwrap_or(a.len().min(b.len(),),);
    &a[..len]
}

fn list_prefix() -> Option<&'static Regex,> {
    static LIST_PREFIX: OnceLock<Option<Regex,>,> = OnceLock::new();
    LIST_PREFIX.get_or_init(|| Regex::new(r"^\s*(?:\w|[0-9]+)[.)]\s+",).ok(),).as_ref()
}

/// Wraps each paragraph of `text` to `width` columns with a tab indent.
///
/// Paragraphs are separated by blank lines and stay separated by one. A
/// paragraph that opens like a list item (`1. `, `a) `) continues under its
/// text rather than under the marker. Words are never split.
pub fn wrap_note(text: &str, width: usize,) -> String {
    let mut out: Vec<String,> = Vec::new();
    let mut paragraph: Vec<&str,> = Vec::new();
    for line in text.lines().chain(std::iter::once("",),) {
        if !line.trim().is_empty() {
            paragraph.push(line,);
            continue;
        }
        if paragraph.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(String::new(),);
        }
        out.extend(wrap_paragraph(&paragraph.join("\n",), width,),);
        paragraph.clear();
    }
    out.join("\n",)
}

fn wrap_paragraph(paragraph: &str, width: usize,) -> Vec<String,> {
    let hanging = list_prefix()
        .and_then(|prefix| prefix.find(paragraph,),)
        .map(|found| found.as_str().chars().count(),)
        .unwrap_or(0,);
    let continuation = format!("\t{}", " ".repeat(hanging,));

    let mut lines = Vec::new();
    let mut current = String::from("\t",);
    let mut current_width = 1;
    let mut indent_width = 1;
    for word in paragraph.split_whitespace() {
        let word_width = word.chars().count();
        let at_line_start = current_width == indent_width;
        if !at_line_start && current_width + 1 + word_width > width {
            lines.push(std::mem::replace(&mut current, continuation.clone(),),);
            indent_width = 1 + hanging;
            current_width = indent_width;
        }
        if current_width != indent_width {
            current.push(' ',);
            current_width += 1;
        }
        current.push_str(word,);
        current_width += word_width;
    }
    lines.push(current,);
    lines
}
