//! Named regular expressions for the todo.txt line grammar.
//!
//! Every field the line parser extracts, and every span the line editor
//! rewrites, is located through one of these patterns.

use std::sync::LazyLock;

use regex::Regex;

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in pattern {pattern:?}: {e}"),
    }
}

/// Leading `(X)` priority token. Group 1 is the letter.
pub static PRIORITY_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"^\(([A-Z])\)"));

/// Completion marker: a literal `x` followed by a space at the start of the line.
pub static COMPLETED_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"^x "));

/// Completed line with its positional dates.
/// Group 1 is the completion date, group 2 the optional creation date.
pub static COMPLETED_DATES_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^x (\d{4}-\d{2}-\d{2})(?: (\d{4}-\d{2}-\d{2}))?(?:\s|$)")
});

/// Creation date of an active line, after the optional priority.
/// Group 1 is the date.
pub static CREATION_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(?:\([A-Z]\) )?(\d{4}-\d{2}-\d{2})(?:\s|$)"));

/// `t:` threshold token. Group 1 is the whole token, group 2 the value.
pub static THRESHOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:^|\s)(t:([0-9A-Za-z-]+))"));

/// `due:` token. Group 1 is the whole token, group 2 the value.
pub static DUE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?:^|\s)(due:([0-9A-Za-z-]+))"));

/// `pri:X` token left behind when a prioritized task is completed.
/// Group 1 is the whole token, group 2 the letter.
pub static PRI_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?:^|\s)(pri:([A-Z]))(?:\s|$)"));

/// Context (`@`) and project (`+`) tags. Group 1 is the tag.
pub static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:^|\s)([@+][0-9A-Za-z][0-9A-Za-z\-:/.]*)"));

/// First well-formed URL.
pub static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+[^\s]*"));

/// The `@today` tag as a whole token.
pub static TODAY_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?:^|\s)(@today)(?:\s|$)"));

/// Relative date offset such as `3d` or `2b`. Group 1 is the amount, group 2 the unit.
pub static RELATIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"^(\d+)([dwmyb])$"));

/// ISO calendar date.
pub static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d{4}-\d{2}-\d{2}$"));

/// Runs of two or more spaces.
pub static MULTI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r" {2,}"));
