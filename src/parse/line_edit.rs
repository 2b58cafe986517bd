//! Field-aware rewrites of a raw task line.
//!
//! Each function takes the current raw text and returns the new raw text.
//! Only the span that carries the edited field changes; everything else on
//! the line is kept byte for byte (except where whitespace normalization is
//! part of the operation). None of these can fail: a missing or malformed
//! token means "append a new one".

use chrono::NaiveDate;
use regex::Regex;

use crate::parse::patterns::{
    COMPLETED_DATES_RE, COMPLETED_RE, CREATION_DATE_RE, DUE_RE, MULTI_SPACE_RE, PRI_TAG_RE,
    PRIORITY_RE, THRESHOLD_RE, TODAY_RE,
};

/// Priority inserted when a line has none
pub const DEFAULT_PRIORITY: &str = "(A) ";

/// The tag toggled by [`toggle_today`]
pub const TODAY_TAG: &str = "@today";

/// Direction of a priority change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityShift {
    /// Toward `A`
    Raise,
    /// Toward `Z`
    Lower,
}

/// The two date-valued `key:value` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTag {
    /// `due:`
    Due,
    /// `t:`
    Threshold,
}

impl DateTag {
    pub fn prefix(self) -> &'static str {
        match self {
            DateTag::Due => "due:",
            DateTag::Threshold => "t:",
        }
    }

    /// Pattern whose group 1 is the whole token and group 2 the value
    pub fn pattern(self) -> &'static Regex {
        match self {
            DateTag::Due => &*DUE_RE,
            DateTag::Threshold => &*THRESHOLD_RE,
        }
    }

    /// Current value of the first token of this kind, as written
    pub fn value_in(self, raw: &str) -> Option<&str> {
        self.pattern()
            .captures(raw)
            .and_then(|c| c.get(2))
            .map(|m| m.as_str())
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Move the leading `(X)` one letter.
///
/// Shifting past `A` or `Z` leaves the line unchanged. A line without a
/// priority gets `(A) ` in front, whichever the direction.
pub fn shift_priority(raw: &str, shift: PriorityShift) -> String {
    let Some(letter) = PRIORITY_RE.captures(raw).and_then(|c| c.get(1)) else {
        return format!("{DEFAULT_PRIORITY}{raw}");
    };

    let current = letter.as_str().as_bytes()[0];
    let next = match shift {
        PriorityShift::Raise => current.checked_sub(1),
        PriorityShift::Lower => current.checked_add(1),
    };

    match next.filter(u8::is_ascii_uppercase) {
        Some(next) => format!(
            "{}{}{}",
            &raw[..letter.start()],
            next as char,
            &raw[letter.end()..]
        ),
        None => raw.to_string(),
    }
}

pub fn raise_priority(raw: &str) -> String {
    shift_priority(raw, PriorityShift::Raise)
}

pub fn lower_priority(raw: &str) -> String {
    shift_priority(raw, PriorityShift::Lower)
}

// ---------------------------------------------------------------------------
// Date tags
// ---------------------------------------------------------------------------

/// Set, replace or clear a `due:` / `t:` token.
///
/// The first existing token is replaced in place. Without one, the token is
/// appended. An empty `value` removes the token together with the space in
/// front of it.
pub fn set_date_tag(raw: &str, tag: DateTag, value: &str) -> String {
    let value = value.trim();
    let existing = tag.pattern().captures(raw).and_then(|c| c.get(1));

    match (existing, value.is_empty()) {
        (Some(token), true) => cut_token(raw, token.start(), token.end()),
        (Some(token), false) => format!(
            "{}{}{}{}",
            &raw[..token.start()],
            tag.prefix(),
            value,
            &raw[token.end()..]
        ),
        (None, true) => raw.to_string(),
        (None, false) if raw.is_empty() => format!("{}{}", tag.prefix(), value),
        (None, false) => format!("{} {}{}", raw, tag.prefix(), value),
    }
}

// ---------------------------------------------------------------------------
// Free text
// ---------------------------------------------------------------------------

/// Append `text` after a space and collapse repeated spaces.
pub fn append_text(raw: &str, text: &str) -> String {
    if text.trim().is_empty() {
        return raw.to_string();
    }
    normalize_whitespace(&format!("{raw} {text}"))
}

/// Delete the first literal occurrence of `text` and collapse repeated spaces.
/// Unchanged when `text` is empty or absent.
pub fn remove_text(raw: &str, text: &str) -> String {
    if text.is_empty() || !raw.contains(text) {
        return raw.to_string();
    }
    normalize_whitespace(&raw.replacen(text, "", 1))
}

/// Add `@today` if missing, remove it (and the space before it) if present.
pub fn toggle_today(raw: &str) -> String {
    match TODAY_RE.captures(raw).and_then(|c| c.get(1)) {
        Some(tag) => cut_token(raw, tag.start(), tag.end()),
        None if raw.is_empty() => TODAY_TAG.to_string(),
        None => format!("{raw} {TODAY_TAG}"),
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Mark a line done or not done.
///
/// Completing writes `x <today> ` in front and moves a leading priority to a
/// trailing `pri:X` token. Un-completing strips the marker and completion date
/// and turns `pri:X` back into a leading `(X) `. Lines already in the
/// requested state are returned unchanged.
pub fn set_completed(raw: &str, done: bool, today: NaiveDate) -> String {
    let is_done = COMPLETED_RE.is_match(raw);
    if done == is_done {
        return raw.to_string();
    }

    if done {
        let (body, priority) = match PRIORITY_RE.captures(raw) {
            Some(caps) => {
                let whole = &caps[0];
                (raw[whole.len()..].trim_start(), Some(caps[1].to_string()))
            }
            None => (raw, None),
        };
        let mut out = format!("x {} {}", today.format("%Y-%m-%d"), body);
        if let Some(p) = priority {
            out.push_str(" pri:");
            out.push_str(&p);
        }
        return out.trim_end().to_string();
    }

    let body = match COMPLETED_DATES_RE.captures(raw).and_then(|c| c.get(1)) {
        Some(completion) => raw[completion.end()..].trim_start(),
        None => raw[2..].trim_start(),
    };

    match PRI_TAG_RE.captures(body).and_then(|c| Some((c.get(1)?, c.get(2)?))) {
        Some((token, letter)) => {
            let rest = cut_token(body, token.start(), token.end());
            format!("({}) {}", letter.as_str(), rest).trim_end().to_string()
        }
        None => body.to_string(),
    }
}

/// Insert `today` as the creation date of an active line, after the
/// priority if there is one. Lines that are completed or already carry a
/// creation date are returned unchanged.
pub fn with_creation_date(raw: &str, today: NaiveDate) -> String {
    if COMPLETED_RE.is_match(raw) || CREATION_DATE_RE.is_match(raw) {
        return raw.to_string();
    }
    let date = today.format("%Y-%m-%d");
    match PRIORITY_RE.find(raw) {
        Some(m) => format!("{} {} {}", m.as_str(), date, raw[m.end()..].trim_start()),
        None => format!("{} {}", date, raw),
    }
}

// ---------------------------------------------------------------------------
// Whitespace and display
// ---------------------------------------------------------------------------

/// Collapse runs of spaces into one and trim both ends.
pub fn normalize_whitespace(s: &str) -> String {
    MULTI_SPACE_RE.replace_all(s.trim(), " ").into_owned()
}

/// A task is exactly one physical line: embedded line breaks become spaces.
pub fn strip_newlines(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Display form of a line: no completion marker, no positional dates, no
/// `pri:` token. Purely presentational; never written back.
pub fn pretty_print(raw: &str) -> String {
    let mut text = raw;
    if COMPLETED_RE.is_match(text) {
        text = match COMPLETED_DATES_RE.captures(text) {
            Some(caps) => {
                let end = caps.get(2).or_else(|| caps.get(1)).map_or(2, |m| m.end());
                &text[end..]
            }
            None => &text[2..],
        };
    }

    let mut out = text.trim_start().to_string();
    if let Some(caps) = CREATION_DATE_RE.captures(&out)
        && let Some(date) = caps.get(1)
    {
        out = cut_token(&out, date.start(), date.end());
    }
    if let Some(token) = PRI_TAG_RE.captures(&out).and_then(|c| c.get(1)) {
        out = cut_token(&out, token.start(), token.end());
    }
    normalize_whitespace(&out)
}

/// Remove `raw[start..end]` plus one adjoining whitespace character: the one
/// before it, or the one after it when the token opens the line.
fn cut_token(raw: &str, start: usize, end: usize) -> String {
    let before = &raw[..start];
    let after = &raw[end..];
    if let Some(c) = before.chars().next_back()
        && c.is_whitespace()
    {
        return format!("{}{}", &before[..before.len() - c.len_utf8()], after);
    }
    match after.chars().next() {
        Some(c) if c.is_whitespace() => format!("{}{}", before, &after[c.len_utf8()..]),
        _ => format!("{before}{after}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn raise_and_lower_inside_alphabet() {
        assert_eq!(raise_priority("(C) pay rent"), "(B) pay rent");
        assert_eq!(lower_priority("(C) pay rent"), "(D) pay rent");
    }

    #[test]
    fn priority_round_trip_every_letter() {
        for letter in 'B'..='Y' {
            let line = format!("({letter}) task +proj");
            assert_eq!(lower_priority(&raise_priority(&line)), line);
            assert_eq!(raise_priority(&lower_priority(&line)), line);
        }
    }

    #[test]
    fn priority_boundaries_are_no_ops() {
        assert_eq!(raise_priority("(A) top"), "(A) top");
        assert_eq!(lower_priority("(Z) bottom"), "(Z) bottom");
    }

    #[test]
    fn missing_priority_inserts_default_once() {
        assert_eq!(raise_priority("Buy milk @home"), "(A) Buy milk @home");
        assert_eq!(lower_priority("Buy milk @home"), "(A) Buy milk @home");
        // Raising the inserted priority is then a no-op, not a second prefix
        assert_eq!(raise_priority(&raise_priority("x")), "(A) x");
    }

    #[test]
    fn priority_only_touches_the_letter() {
        assert_eq!(
            raise_priority("(B) keep (B) in text  exactly"),
            "(A) keep (B) in text  exactly"
        );
    }

    #[test]
    fn due_set_replace_clear() {
        let once = set_date_tag("pay bill", DateTag::Due, "2024-06-10");
        assert_eq!(once, "pay bill due:2024-06-10");
        let twice = set_date_tag(&once, DateTag::Due, "2024-07-01");
        assert_eq!(twice, "pay bill due:2024-07-01");
        assert_eq!(twice.matches("due:").count(), 1);
        assert_eq!(set_date_tag(&twice, DateTag::Due, ""), "pay bill");
    }

    #[test]
    fn due_replace_in_middle_keeps_rest() {
        assert_eq!(
            set_date_tag("a due:2024-01-01 b  c", DateTag::Due, "3d"),
            "a due:3d b  c"
        );
        assert_eq!(
            set_date_tag("a due:2024-01-01 b", DateTag::Due, ""),
            "a b"
        );
    }

    #[test]
    fn clear_token_at_line_start() {
        assert_eq!(set_date_tag("t:2024-01-01 plan", DateTag::Threshold, ""), "plan");
    }

    #[test]
    fn clear_without_token_is_noop() {
        assert_eq!(set_date_tag("plan", DateTag::Threshold, ""), "plan");
    }

    #[test]
    fn malformed_token_is_still_replaced() {
        assert_eq!(
            set_date_tag("x due:someday", DateTag::Due, "2024-01-01"),
            "x due:2024-01-01"
        );
    }

    #[test]
    fn threshold_does_not_disturb_due() {
        let line = set_date_tag("a due:2024-01-01", DateTag::Threshold, "2023-12-25");
        assert_eq!(line, "a due:2024-01-01 t:2023-12-25");
        assert_eq!(DateTag::Threshold.value_in(&line), Some("2023-12-25"));
        assert_eq!(DateTag::Due.value_in(&line), Some("2024-01-01"));
    }

    #[test]
    fn append_and_remove_normalize_spaces() {
        assert_eq!(append_text("call bob", "+work"), "call bob +work");
        assert_eq!(append_text("call  bob ", " +work"), "call bob +work");
        assert_eq!(append_text("call bob", "   "), "call bob");
        assert_eq!(remove_text("call bob +work now", "+work"), "call bob now");
        assert_eq!(remove_text("a b a", "a"), "b a");
        assert_eq!(remove_text("call bob", "+missing"), "call bob");
    }

    #[test]
    fn toggle_today_scenario() {
        let a = raise_priority("Buy milk @home");
        assert_eq!(a, "(A) Buy milk @home");
        let b = toggle_today(&a);
        assert_eq!(b, "(A) Buy milk @home @today");
        let c = toggle_today(&b);
        assert_eq!(c, "(A) Buy milk @home");
    }

    #[test]
    fn toggle_today_in_middle_and_start() {
        assert_eq!(toggle_today("walk @today dog"), "walk dog");
        assert_eq!(toggle_today("@today walk"), "walk");
        assert_eq!(toggle_today("walk @todayish"), "walk @todayish @today");
        assert_eq!(toggle_today(""), "@today");
    }

    #[test]
    fn complete_moves_priority_to_tag() {
        let done = set_completed("(B) call mom", true, today());
        assert_eq!(done, "x 2024-06-01 call mom pri:B");
        assert_eq!(set_completed(&done, false, today()), "(B) call mom");
    }

    #[test]
    fn complete_keeps_creation_date() {
        let done = set_completed("2024-05-01 water plants", true, today());
        assert_eq!(done, "x 2024-06-01 2024-05-01 water plants");
        assert_eq!(set_completed(&done, false, today()), "2024-05-01 water plants");
    }

    #[test]
    fn complete_is_idempotent() {
        let done = "x 2024-01-01 thing";
        assert_eq!(set_completed(done, true, today()), done);
        assert_eq!(set_completed("thing", false, today()), "thing");
    }

    #[test]
    fn uncomplete_without_date() {
        assert_eq!(set_completed("x thing", false, today()), "thing");
    }

    #[test]
    fn newline_stripping() {
        assert_eq!(strip_newlines("a\nb\r\nc"), "a b c");
    }

    #[test]
    fn pretty_print_hides_bookkeeping() {
        assert_eq!(
            pretty_print("x 2024-06-01 2024-05-01 call mom pri:B"),
            "call mom"
        );
        assert_eq!(pretty_print("(A) 2024-05-01 call  mom"), "(A) call mom");
        assert_eq!(pretty_print("call mom @phone"), "call mom @phone");
    }

    #[test]
    fn creation_date_goes_after_priority() {
        assert_eq!(
            with_creation_date("(B) file taxes", today()),
            "(B) 2024-06-01 file taxes"
        );
        assert_eq!(with_creation_date("file taxes", today()), "2024-06-01 file taxes");
        assert_eq!(
            with_creation_date("2023-01-01 file taxes", today()),
            "2023-01-01 file taxes"
        );
        assert_eq!(with_creation_date("x done", today()), "x done");
    }
}
