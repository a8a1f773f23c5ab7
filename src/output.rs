//! # Compiler Output Parser
//!
//! Turns the free-text streams of one Clue invocation into structured records:
//! - **Error blocks** on stderr: an `Error in <path>:<line>:<col>!` header followed
//!   by exactly one message line (`Error: "<text>"` or anything else, verbatim)
//! - **Compiled-file markers** on stdout: `Compiled file "<path>" in <duration>!`
//!
//! Unrelated lines are skipped. The parser keeps no state between invocations.

use regex::Regex;
use std::sync::LazyLock;

/// Matches an error header, capturing the path, the 1-based line and the 1-based column.
static ERROR_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Error in (.*):(\d+):(\d+)!$").expect("Output: regex failure")
});

/// Matches a quoted error message line.
static ERROR_MESSAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^Error: "(.*)"$"#).expect("Output: regex failure"));

/// Matches a compiled-file marker.
static COMPILED_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^Compiled file "(.*)" in (.*)!$"#).expect("Output: regex failure")
});

/// One parsed compiler error. Positions are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// The path as reported by the compiler. May be absolute, relative, or empty.
    pub path: String,
    pub line: u32,
    pub character: u32,
    pub message: String,
}

/// Everything recognized in one invocation's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    pub errors: Vec<ErrorRecord>,
    pub compiled_files: Vec<String>,
}

/// A header that has been seen but whose message line has not arrived yet.
#[derive(Debug)]
struct PendingError {
    path: String,
    line: u32,
    character: u32,
}

#[derive(Debug)]
enum BlockState {
    Seeking,
    ExpectMessage(PendingError),
}

/// Parses one invocation's stdout and stderr.
pub fn parse(stdout: &str, stderr: &str) -> ParsedOutput {
    ParsedOutput {
        errors: parse_errors(stderr),
        compiled_files: parse_compiled_files(stdout),
    }
}

/// Runs the two-state error automaton over stderr.
pub fn parse_errors(stderr: &str) -> Vec<ErrorRecord> {
    let mut errors = Vec::new();
    let mut state = BlockState::Seeking;

    for line in stderr.lines() {
        state = match state {
            BlockState::Seeking => match parse_header(line) {
                Some(pending) => BlockState::ExpectMessage(pending),
                None => BlockState::Seeking,
            },
            BlockState::ExpectMessage(pending) => {
                let message = ERROR_MESSAGE_RE
                    .captures(line)
                    .and_then(|caps| caps.get(1))
                    .map_or_else(|| line.to_string(), |m| m.as_str().to_string());
                errors.push(ErrorRecord {
                    path: pending.path,
                    line: pending.line,
                    character: pending.character,
                    message,
                });
                BlockState::Seeking
            }
        };
    }

    // A header still pending here had no message line and is discarded.
    errors
}

fn parse_header(line: &str) -> Option<PendingError> {
    let caps = ERROR_HEADER_RE.captures(line)?;
    let line_no: u32 = caps.get(2)?.as_str().parse().ok()?;
    let column: u32 = caps.get(3)?.as_str().parse().ok()?;
    Some(PendingError {
        path: caps.get(1)?.as_str().to_string(),
        line: line_no.saturating_sub(1),
        character: column.saturating_sub(1),
    })
}

/// Collects every compiled-file marker from stdout, in order.
pub fn parse_compiled_files(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| COMPILED_FILE_RE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_error_block() {
        let parsed = parse("", "Error in a/b.c:5:10!\nError: \"bad thing\"\n");
        assert_eq!(
            parsed.errors,
            vec![ErrorRecord {
                path: "a/b.c".to_string(),
                line: 4,
                character: 9,
                message: "bad thing".to_string(),
            }]
        );
        assert!(parsed.compiled_files.is_empty());
    }

    #[test]
    fn unquoted_message_is_kept_verbatim() {
        let errors = parse_errors("Error in main.clue:1:1!\nUnexpected token 'local'");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unexpected token 'local'");
        assert_eq!((errors[0].line, errors[0].character), (0, 0));
    }

    #[test]
    fn header_without_message_line_is_discarded() {
        assert!(parse_errors("Error in main.clue:3:4!").is_empty());
        assert!(parse_errors("Error in main.clue:3:4!\n").is_empty());
    }

    #[test]
    fn message_line_is_never_skipped() {
        // The line right after a header is its message even if it looks like another header.
        let errors = parse_errors("Error in a.clue:1:2!\nError in b.clue:3:4!\nError: \"x\"");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "a.clue");
        assert_eq!(errors[0].message, "Error in b.clue:3:4!");
    }

    #[test]
    fn unrelated_lines_are_skipped() {
        let stderr = "warming up\nError in src/x.clue:2:7!\nError: \"oops\"\nsome noise\nError in src/y.clue:10:1!\nError: \"again\"\n";
        let errors = parse_errors(stderr);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path, "src/x.clue");
        assert_eq!(errors[1].path, "src/y.clue");
        assert_eq!(errors[1].line, 9);
    }

    #[test]
    fn empty_path_and_crlf_are_accepted() {
        let errors = parse_errors("Error in :4:2!\r\nError: \"single\"\r\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "");
        assert_eq!(errors[0].message, "single");
    }

    #[test]
    fn path_with_colons_keeps_last_two_numbers() {
        let errors = parse_errors("Error in C:\\proj\\a.clue:12:3!\nError: \"win\"");
        assert_eq!(errors[0].path, "C:\\proj\\a.clue");
        assert_eq!((errors[0].line, errors[0].character), (11, 2));
    }

    #[test]
    fn compiled_markers_are_collected_in_order() {
        let stdout = "Compiled file \"x.clue\" in 4ms!\nnoise\nCompiled file \"dir/y.clue\" in 1.2s!\n";
        assert_eq!(parse_compiled_files(stdout), vec!["x.clue", "dir/y.clue"]);
    }
}
