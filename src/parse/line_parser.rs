use chrono::NaiveDate;

use crate::model::task::{DateValue, TaskFields};
use crate::parse::patterns::{
    COMPLETED_DATES_RE, COMPLETED_RE, CREATION_DATE_RE, DUE_RE, PRIORITY_RE, TAG_RE,
    THRESHOLD_RE, URL_RE,
};

/// Derive all fields of a task line.
///
/// Never fails: anything that does not fit the grammar is simply not
/// reported as a field, and the line stays an active task with no dates.
pub fn parse_fields(raw: &str) -> TaskFields {
    let completed = COMPLETED_RE.is_match(raw);

    let (completion_date, creation_date) = if completed {
        match COMPLETED_DATES_RE.captures(raw) {
            Some(caps) => (
                caps.get(1).and_then(|m| parse_iso(m.as_str())),
                caps.get(2).and_then(|m| parse_iso(m.as_str())),
            ),
            None => (None, None),
        }
    } else {
        let created = CREATION_DATE_RE
            .captures(raw)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_iso(m.as_str()));
        (None, created)
    };

    let priority = if completed {
        None
    } else {
        PRIORITY_RE
            .captures(raw)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().chars().next())
    };

    let tags = TAG_RE
        .captures_iter(raw)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    TaskFields {
        completed,
        priority,
        completion_date,
        creation_date,
        threshold: token_value(&THRESHOLD_RE, raw),
        due: token_value(&DUE_RE, raw),
        tags,
        url: URL_RE.find(raw).map(|m| m.as_str().to_string()),
    }
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Value of the first `key:value` token matched by `re` (group 2)
fn token_value(re: &regex::Regex, raw: &str) -> Option<DateValue> {
    re.captures(raw)
        .and_then(|c| c.get(2))
        .and_then(|m| DateValue::parse(m.as_str()))
}

/// Split file content into task lines. Blank lines are not tasks.
pub fn split_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Join task lines back into file content, one per line with a trailing newline.
pub fn join_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}
