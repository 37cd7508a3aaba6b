//! JSON with `//` line comments and `/* */` block comments.

use crate::error::{ErrorKind, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    String,
    StringEscape,
    LineComment,
    BlockComment,
    BlockCommentStar,
}

/// Remove comments outside of string literals.
///
/// A line comment ends at (and keeps) the next line break. Stripped block
/// comments leave nothing behind, exactly as if they were never written.
pub fn strip_comments(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut state = State::Code;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        state = match (state, c) {
            (State::Code, '/') if chars.peek() == Some(&'/') => {
                chars.next();
                State::LineComment
            },
            (State::Code, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                State::BlockComment
            },
            (State::Code, '"') => {
                out.push(c);
                State::String
            },
            (State::Code, _) => {
                out.push(c);
                State::Code
            },
            (State::String, '\\') => {
                out.push(c);
                State::StringEscape
            },
            (State::String, '"') => {
                out.push(c);
                State::Code
            },
            (State::String | State::StringEscape, _) => {
                out.push(c);
                State::String
            },
            (State::LineComment, '\n' | '\r') => {
                out.push(c);
                State::Code
            },
            (State::LineComment, _) => State::LineComment,
            (State::BlockComment | State::BlockCommentStar, '*') => State::BlockCommentStar,
            (State::BlockCommentStar, '/') => State::Code,
            (State::BlockComment | State::BlockCommentStar, _) => State::BlockComment,
        };
    }
    if matches!(state, State::BlockComment | State::BlockCommentStar) {
        exn::bail!(ErrorKind::UnclosedComment);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"a": 1}"#, r#"{"a": 1}"#)]
    #[case("{\"a\": 1} // trailing", "{\"a\": 1} ")]
    #[case("// first\n{\"a\": 1}", "\n{\"a\": 1}")]
    #[case("{/* inline */\"a\": 1}", "{\"a\": 1}")]
    #[case("{/* multi\nline **/\"a\": 1}", "{\"a\": 1}")]
    #[case(r#"{"url": "http://example.com"}"#, r#"{"url": "http://example.com"}"#)]
    #[case(r#"{"a": "/* not a comment */"}"#, r#"{"a": "/* not a comment */"}"#)]
    #[case(r#"{"a": "quote \" // still a string"}"#, r#"{"a": "quote \" // still a string"}"#)]
    #[case(r#"{"a": "backslash \\"} // comment"#, r#"{"a": "backslash \\"} "#)]
    #[case("{\"a\": 1 / 2}", "{\"a\": 1 / 2}")]
    #[case("// only\r\n", "\r\n")]
    fn test_strip_comments(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_comments(input).unwrap(), expected);
    }

    #[rstest]
    #[case("{/* never closed")]
    #[case("{/* almost *")]
    #[case("/*")]
    fn test_unclosed_comment(#[case] input: &str) {
        let err = strip_comments(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnclosedComment));
    }
}
