//! Finding the source statement behind an assertion call site.
//!
//! The caller location recorded by `#[track_caller]` names a single line. The
//! statement that contains it can span several physical lines (wrapped
//! argument lists, method chains, `let x =` on its own line), so the locator
//! widens the line to the whole statement with a small lexer that tracks
//! bracket depth while skipping string, char and comment text. It is not a
//! parser: anything it cannot make sense of degrades to a shorter excerpt.

use std::collections::HashMap;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Lines of context shown above the statement.
pub const DEFAULT_LEADING: usize = 1;
/// Lines of context shown below the statement.
pub const DEFAULT_TRAILING: usize = 1;

// A statement longer than this is almost certainly a lexing miss.
const MAX_STATEMENT_LINES: usize = 256;

/// The lines of source around a failing assertion.
///
/// Line numbers are 1-based. `failing_line` is the first line of the
/// statement and always lies within `start_line..=end_line`.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct SourceExcerpt {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub failing_line: usize,
    pub statement: (usize, usize,),
    pub lines: Vec<(usize, String,),>,
}

impl SourceExcerpt {
    pub fn is_empty(&self,) -> bool {
        self.lines.is_empty()
    }

    /// Renders the excerpt dedented, one ` > NNNN text` row per line, with
    /// `>` marking the start of the failing statement.
    pub fn render(&self,) -> String {
        let indent = self
            .lines
            .iter()
            .filter(|(_, text,)| !text.trim().is_empty(),)
            .map(|(_, text,)| text.len() - text.trim_start().len(),)
            .min()
            .unwrap_or(0,);

        self.lines
            .iter()
            .map(|(number, text,)| {
                let marker = if *number == self.failing_line { '>' } else { ' ' };
                let text = text.get(indent..,).unwrap_or_else(|| text.trim_start(),);
                format!(" {marker} {number:4} {text}").trim_end().to_string()
            },)
            .collect::<Vec<_,>>()
            .join("\n",)
    }
}

/// Builds [`SourceExcerpt`]s with a configurable amount of context.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct SourceLocator {
    pub leading: usize,
    pub trailing: usize,
}

impl Default for SourceLocator {
    fn default() -> Self {
        Self { leading: DEFAULT_LEADING, trailing: DEFAULT_TRAILING, }
    }
}

impl SourceLocator {
    pub fn new(leading: usize, trailing: usize,) -> Self {
        Self { leading, trailing, }
    }

    /// Locates the statement containing `line` of `file`, reading the file
    /// from disk. `None` when the source cannot be found.
    pub fn locate(&self, file: &str, line: u32,) -> Option<SourceExcerpt,> {
        let lines = source_lines(file,)?;
        self.locate_in(file, &lines[..], line as usize,)
    }

    /// Same as [`locate`](Self::locate) over text already in memory.
    pub fn locate_in<S: AsRef<str,>,>(
        &self,
        file: &str,
        lines: &[S],
        line: usize,
    ) -> Option<SourceExcerpt,> {
        let (first, last,) = statement_bounds(lines, line,)?;
        let start_line = first.saturating_sub(self.leading,).max(1,);
        let end_line = (last + self.trailing).min(lines.len(),);
        let lines = (start_line..=end_line)
            .map(|number| (number, lines[number - 1].as_ref().trim_end().to_string(),),)
            .collect();

        Some(SourceExcerpt {
            file: file.to_string(),
            start_line,
            end_line,
            failing_line: first,
            statement: (first, last,),
            lines,
        },)
    }
}

/// Locates the statement at a caller location with default context.
pub fn locate(location: &Location<'_,>,) -> Option<SourceExcerpt,> {
    SourceLocator::default().locate(location.file(), location.line(),)
}

/// Returns the 1-based `(first, last)` lines of the statement containing
/// `line`.
///
/// The file is lexed once into structural tokens. The bracket stack at the
/// start of `line` picks the block the statement belongs to: the innermost
/// `{` that is not itself inside a `(` or `[`, so a line in a closure passed
/// to an assertion resolves to the statement making the outer call. The
/// statement then runs from the token after the previous `;` or `}` at that
/// block's depth to the next one.
pub fn statement_bounds<S: AsRef<str,>,>(lines: &[S], line: usize,) -> Option<(usize, usize,),> {
    if line == 0 || line > lines.len() {
        return None;
    }
    let target = line - 1;
    let tokens = tokenize(lines,);
    let split = tokens.partition_point(|token| token.line < target,);

    let mut stack: Vec<(u8, usize,),> = Vec::new();
    for (index, token,) in tokens[..split].iter().enumerate() {
        match token.kind {
            Kind::Open(bracket,) => stack.push((bracket, index,),),
            Kind::Close(_,) => {
                stack.pop();
            }
            _ => {}
        }
    }
    let outermost_group = stack.iter().position(|(bracket, _,)| *bracket != b'{',).unwrap_or(stack.len(),);
    let block = stack[..outermost_group].iter().rposition(|(bracket, _,)| *bracket == b'{',);
    let block_depth = block.map_or(0, |level| level + 1,);
    let opener = block.map(|level| stack[level].1,);

    let first = tokens[..split]
        .iter()
        .enumerate()
        .rev()
        .find(|(index, token,)| {
            Some(*index,) == opener || token.depth == block_depth && ends_statement(lines, &tokens, *index,)
        },)
        .map_or(0, |(index, _,)| index + 1,);
    let first = tokens.get(first,).map_or(target, |token| token.line.min(target,),);

    let mut last = tokens.last().map_or(target, |token| token.line,);
    for (index, token,) in tokens.iter().enumerate().skip(split,) {
        if token.depth < block_depth {
            last = index.checked_sub(1,).map_or(target, |prev| tokens[prev].line,);
            break;
        }
        if token.depth != block_depth {
            continue;
        }
        if ends_statement(lines, &tokens, index,) {
            last = token.line;
            break;
        }
    }
    let last = last.max(target,).min(first + MAX_STATEMENT_LINES,);

    Some((first + 1, last + 1,),)
}

/// Whether the token at `index` closes a statement: a `;`, or a `}` that the
/// code after it does not carry on. A `)` or `]` never does, so a call
/// followed by a method chain on the next line stays one statement.
fn ends_statement<S: AsRef<str,>,>(lines: &[S], tokens: &[Token], index: usize,) -> bool {
    match tokens[index].kind {
        Kind::Semi => true,
        Kind::Close(b'}',) => !tokens.get(index + 1,).is_some_and(|next| {
            next.line == tokens[index].line || continues_statement(lines[next.line].as_ref(),)
        },),
        _ => false,
    }
}

/// A line that carries on the expression ended on the line before it.
fn continues_statement(line: &str,) -> bool {
    let code = line.trim_start();
    code.starts_with('.',) && !code.starts_with("..",) || code.starts_with('?',) || code.starts_with("else",)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
enum Kind {
    Open(u8,),
    Close(u8,),
    Semi,
    Other,
}

/// One piece of code outside strings and comments. `depth` is the bracket
/// depth after the token.
#[derive(Debug, Clone, Copy,)]
struct Token {
    line: usize,
    depth: usize,
    kind: Kind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
enum Lex {
    Code,
    Str,
    RawStr(usize,),
    BlockComment(usize,),
}

fn tokenize<S: AsRef<str,>,>(lines: &[S],) -> Vec<Token,> {
    let mut tokens = Vec::new();
    let mut state = Lex::Code;
    let mut depth = 0;
    for (number, line,) in lines.iter().enumerate() {
        scan(line.as_ref(), number, &mut state, &mut depth, &mut tokens,);
    }
    tokens
}

fn scan(line: &str, number: usize, state: &mut Lex, depth: &mut usize, tokens: &mut Vec<Token,>,) {
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut push = |depth: usize, kind: Kind| tokens.push(Token { line: number, depth, kind, },);

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1,).copied();
        match *state {
            Lex::Str => {
                match b {
                    b'\\' => i += 1,
                    b'"' => *state = Lex::Code,
                    _ => {}
                }
                i += 1;
            }
            Lex::RawStr(hashes,) => {
                let closes = b == b'"'
                    && bytes.get(i + 1..i + 1 + hashes,).is_some_and(|h| h.iter().all(|c| *c == b'#',),);
                if closes {
                    *state = Lex::Code;
                    i += hashes;
                }
                i += 1;
            }
            Lex::BlockComment(nesting,) => {
                if b == b'*' && next == Some(b'/',) {
                    *state = if nesting == 1 { Lex::Code } else { Lex::BlockComment(nesting - 1,) };
                    i += 2;
                } else if b == b'/' && next == Some(b'*',) {
                    *state = Lex::BlockComment(nesting + 1,);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            Lex::Code => match b {
                b'/' if next == Some(b'/',) => break,
                b'/' if next == Some(b'*',) => {
                    *state = Lex::BlockComment(1,);
                    i += 2;
                }
                b'"' => {
                    push(*depth, Kind::Other,);
                    *state = Lex::Str;
                    i += 1;
                }
                b'r' => {
                    push(*depth, Kind::Other,);
                    match raw_string_open(bytes, i,) {
                        Some(hashes,) => {
                            *state = Lex::RawStr(hashes,);
                            i += hashes + 2;
                        }
                        None => i += 1,
                    }
                }
                b'\'' => {
                    push(*depth, Kind::Other,);
                    i += char_literal_len(bytes, i,);
                }
                b'(' | b'[' | b'{' => {
                    *depth += 1;
                    push(*depth, Kind::Open(b,),);
                    i += 1;
                }
                b')' | b']' | b'}' => {
                    *depth = depth.saturating_sub(1,);
                    push(*depth, Kind::Close(b,),);
                    i += 1;
                }
                b';' => {
                    push(*depth, Kind::Semi,);
                    i += 1;
                }
                _ => {
                    if !b.is_ascii_whitespace() {
                        push(*depth, Kind::Other,);
                    }
                    i += 1;
                }
            },
        }
    }
}

/// Hash count of a raw string opening at `i` (`r"`, `r#"`, `br##"` ...).
fn raw_string_open(bytes: &[u8], i: usize,) -> Option<usize,> {
    let ident = |c: u8| c.is_ascii_alphanumeric() || c == b'_';
    let prefix_ok = match i {
        0 => true,
        1 => bytes[0] == b'b' || !ident(bytes[0],),
        _ => !ident(bytes[i - 1],) || (bytes[i - 1] == b'b' && !ident(bytes[i - 2],)),
    };
    if !prefix_ok {
        return None;
    }
    let hashes = bytes[i + 1..].iter().take_while(|c| **c == b'#',).count();
    (bytes.get(i + 1 + hashes,) == Some(&b'"',)).then_some(hashes,)
}

/// Bytes to skip for a `'` at `i`: a whole char literal, or just the quote
/// when it starts a lifetime or label.
fn char_literal_len(bytes: &[u8], i: usize,) -> usize {
    match bytes.get(i + 1,) {
        Some(b'\\',) => bytes[i + 2..].iter().position(|c| *c == b'\'',).map_or(1, |end| end + 3,),
        Some(lead,) if lead.is_ascii() => {
            if bytes.get(i + 2,) == Some(&b'\'',) { 3 } else { 1 }
        }
        // A multi-byte char: up to four UTF-8 bytes, then the closing quote.
        Some(_,) => (2..=5).find(|len| bytes.get(i + len,) == Some(&b'\'',),).map_or(1, |len| len + 1,),
        None => 1,
    }
}

fn line_cache() -> &'static Mutex<HashMap<String, Option<Arc<[String],>,>,>,> {
    static CACHE: OnceLock<Mutex<HashMap<String, Option<Arc<[String],>,>,>,>,> = OnceLock::new();
    CACHE.get_or_init(Default::default,)
}

/// The lines of `file`, read once per process.
pub fn source_lines(file: &str,) -> Option<Arc<[String],>,> {
    let mut cache = line_cache().lock().unwrap_or_else(PoisonError::into_inner,);
    cache
        .entry(file.to_string(),)
        .or_insert_with(|| {
            let loaded = resolve(file,).and_then(|path| std::fs::read_to_string(path,).ok(),);
            if loaded.is_none() {
                tracing::debug!(file, "assertion source unavailable");
            }
            loaded.map(|text| text.lines().map(str::to_string,).collect(),)
        },)
        .clone()
}

/// Candidate paths for a `file!()`-style path: as given, then relative to
/// the crate manifest directory and each of its ancestors.
fn resolve(file: &str,) -> Option<PathBuf,> {
    let path = Path::new(file,);
    if path.is_file() {
        return Some(path.to_path_buf(),);
    }
    if path.is_absolute() {
        return None;
    }
    let manifest = std::env::var_os("CARGO_MANIFEST_DIR",)?;
    Path::new(&manifest,).ancestors().map(|dir| dir.join(path,),).find(|candidate| candidate.is_file(),)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str,) -> Vec<&str,> {
        text.lines().collect()
    }

    #[test]
    fn single_line_statement() {
        let src = lines("fn t() {\n    let x = 1;\n    case.assert_true(x == 2);\n}\n",);
        assert_eq!(statement_bounds(&src, 3), Some((3, 3)));
    }

    #[test]
    fn wrapped_arguments_cover_every_line() {
        let src = lines(
            "fn t() {\n    case.assert_equal(\n        left,\n        right,\n    );\n    done();\n}\n",
        );
        // Reported on the opening line or on a line inside the call.
        assert_eq!(statement_bounds(&src, 2), Some((2, 5)));
        assert_eq!(statement_bounds(&src, 4), Some((2, 5)));
        assert_eq!(statement_bounds(&src, 5), Some((2, 5)));
    }

    #[test]
    fn three_line_statement_plus_context() {
        let src = lines(
            "fn t() {\n    let a = 1;\n    case.assert_equal(a,\n        2,\n        Context::none());\n    let b = 2;\n}\n",
        );
        let excerpt = SourceLocator::default().locate_in("t.rs", &src, 3,).unwrap();
        assert_eq!(excerpt.statement, (3, 5));
        assert_eq!(excerpt.start_line, 2);
        assert_eq!(excerpt.end_line, 6);
        assert_eq!(excerpt.failing_line, 3);
        assert_eq!(excerpt.lines.len(), 5);
    }

    #[test]
    fn brackets_inside_strings_and_comments_are_ignored() {
        let src = lines(
            "fn t() {\n    case.assert_true(s == \"(((\"); // ) unbalanced (\n    case.assert_true(c == '(');\n    case.assert_true(r#\"\"[\"#.is_empty());\n}\n",
        );
        assert_eq!(statement_bounds(&src, 2), Some((2, 2)));
        assert_eq!(statement_bounds(&src, 3), Some((3, 3)));
        assert_eq!(statement_bounds(&src, 4), Some((4, 4)));
    }

    #[test]
    fn lifetimes_do_not_swallow_brackets() {
        let src = lines("fn t<'a>(x: &'a str) {\n    case.assert_true(x.is_empty());\n}\n",);
        assert_eq!(statement_bounds(&src, 2), Some((2, 2)));
    }

    #[test]
    fn let_on_its_own_line_and_method_chains_join() {
        let src = lines(
            "fn t() {\n    let outcome =\n        case.assert_true(false)\n            .unwrap_err();\n    x();\n}\n",
        );
        assert_eq!(statement_bounds(&src, 3), Some((2, 4)));
    }

    #[test]
    fn chain_after_a_call_starts_at_the_let() {
        let src = [
            "fn t() {",
            "    let out = TestCase::new(\"a\", \"b\")",
            "        .assert_true(false, Context::new());",
            "}",
        ];
        assert_eq!(statement_bounds(&src, 3), Some((2, 3)));

        let src = [
            "fn t() {",
            "    let r = Some(&case)",
            "        .map(|case| case.assert_equal(&1, &2, Context::new()))",
            "        .into_iter()",
            "        .count();",
            "    done();",
            "}",
        ];
        assert_eq!(statement_bounds(&src, 3), Some((2, 5)));
        assert_eq!(statement_bounds(&src, 6), Some((6, 6)));
    }

    #[test]
    fn block_statements_end_at_their_brace() {
        let src = lines("fn t() {\n    if ready {\n        go();\n    }\n    case.assert_true(done);\n}\n",);
        assert_eq!(statement_bounds(&src, 5), Some((5, 5)));
        let src = lines("fn t() {\n    if ready {\n        go();\n    } else {\n        stop();\n    }\n    x();\n}\n",);
        assert_eq!(statement_bounds(&src, 7), Some((7, 7)));
    }

    #[test]
    fn nested_assertions_resolve_to_outermost_statement() {
        let src = lines(
            "fn t() {\n    case.assert_panics(|| {\n        case.assert_true(false).unwrap();\n    });\n}\n",
        );
        // The closure body line is reported; the enclosing call is unbalanced
        // from there, so the statement grows to the outer call.
        assert_eq!(statement_bounds(&src, 3), Some((2, 4)));
    }

    #[test]
    fn context_is_clamped_to_the_file() {
        let src = lines("case.assert_true(false);",);
        let excerpt = SourceLocator::new(3, 3,).locate_in("t.rs", &src, 1,).unwrap();
        assert_eq!((excerpt.start_line, excerpt.end_line), (1, 1));
    }

    #[test]
    fn out_of_range_line_has_no_statement() {
        let src = lines("a();\n",);
        assert_eq!(statement_bounds(&src, 0), None);
        assert_eq!(statement_bounds(&src, 9), None);
    }

    #[test]
    fn render_marks_statement_start_and_dedents() {
        let src = lines("    let a = 1;\n    case.assert_true(\n        a == 2);\n    done();\n",);
        let excerpt = SourceLocator::default().locate_in("t.rs", &src, 3,).unwrap();
        let rendered = excerpt.render();
        assert_eq!(
            rendered,
            [
                "      1 let a = 1;",
                " >    2 case.assert_true(",
                "      3     a == 2);",
                "      4 done();",
            ]
            .join("\n")
        );
    }

    #[test]
    fn missing_file_yields_no_excerpt() {
        assert!(SourceLocator::default().locate("definitely/not/here.rs", 1).is_none());
    }

    #[test]
    fn reads_this_file_from_disk() {
        let line = line!();
        let excerpt = SourceLocator::default().locate(file!(), line,).unwrap();
        assert!(excerpt.lines.iter().any(|(_, text)| text.contains("let line = line!();")));
    }
}
