use std::cell::OnceCell;
use std::fmt;

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use indexmap::IndexSet;
use serde::{Serialize, Serializer};

use crate::parse::line_parser::parse_fields;
use crate::parse::patterns::{ISO_DATE_RE, RELATIVE_DATE_RE};

/// Unit of a relative date offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetUnit {
    Day,
    Week,
    Month,
    Year,
    /// Monday through Friday only
    BusinessDay,
}

impl OffsetUnit {
    /// The letter used in the text form (`3d`, `2w`, ...)
    pub fn letter(self) -> char {
        match self {
            OffsetUnit::Day => 'd',
            OffsetUnit::Week => 'w',
            OffsetUnit::Month => 'm',
            OffsetUnit::Year => 'y',
            OffsetUnit::BusinessDay => 'b',
        }
    }

    pub fn from_letter(c: char) -> Option<OffsetUnit> {
        match c {
            'd' => Some(OffsetUnit::Day),
            'w' => Some(OffsetUnit::Week),
            'm' => Some(OffsetUnit::Month),
            'y' => Some(OffsetUnit::Year),
            'b' => Some(OffsetUnit::BusinessDay),
            _ => None,
        }
    }
}

/// Value of a `due:` or `t:` token: a calendar date or an offset from today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateValue {
    Date(NaiveDate),
    Relative { amount: u32, unit: OffsetUnit },
}

impl DateValue {
    /// Parse `YYYY-MM-DD` or `<digits><unit>`. Anything else is `None`.
    pub fn parse(s: &str) -> Option<DateValue> {
        if ISO_DATE_RE.is_match(s) {
            return NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(DateValue::Date);
        }
        let caps = RELATIVE_DATE_RE.captures(s)?;
        let amount = caps.get(1)?.as_str().parse().ok()?;
        let unit = OffsetUnit::from_letter(caps.get(2)?.as_str().chars().next()?)?;
        Some(DateValue::Relative { amount, unit })
    }

    /// The calendar date this value denotes when evaluated on `today`.
    ///
    /// Month and year offsets clamp to the end of the target month
    /// (Jan 31 + 1m = Feb 28/29). Returns `None` only on calendar overflow.
    pub fn resolve(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            DateValue::Date(d) => Some(d),
            DateValue::Relative { amount, unit } => match unit {
                OffsetUnit::Day => today.checked_add_signed(Duration::days(amount.into())),
                OffsetUnit::Week => today.checked_add_signed(Duration::weeks(amount.into())),
                OffsetUnit::Month => today.checked_add_months(Months::new(amount)),
                OffsetUnit::Year => today.checked_add_months(Months::new(amount.checked_mul(12)?)),
                OffsetUnit::BusinessDay => add_business_days(today, amount),
            },
        }
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DateValue::Relative { amount, unit } => write!(f, "{}{}", amount, unit.letter()),
        }
    }
}

impl Serialize for DateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `amount` weekdays after `start`. Whole weeks are added in one step, so
/// the cost does not grow with the offset.
fn add_business_days(start: NaiveDate, amount: u32) -> Option<NaiveDate> {
    if amount == 0 {
        return Some(start);
    }
    // counting from a weekend is the same as counting from the Friday before
    let back = match start.weekday() {
        Weekday::Sat => 1,
        Weekday::Sun => 2,
        _ => 0,
    };
    let mut date = start.checked_sub_signed(Duration::days(back))?;
    date = date.checked_add_signed(Duration::weeks(i64::from(amount / 5)))?;

    let mut left = amount % 5;
    while left > 0 {
        date = date.succ_opt()?;
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            left -= 1;
        }
    }
    Some(date)
}

/// Everything the line parser derives from a raw task line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskFields {
    pub completed: bool,
    pub priority: Option<char>,
    pub completion_date: Option<NaiveDate>,
    pub creation_date: Option<NaiveDate>,
    pub threshold: Option<DateValue>,
    pub due: Option<DateValue>,
    /// `@context` and `+project` tokens in order of first appearance
    pub tags: IndexSet<String>,
    pub url: Option<String>,
}

/// One line of the task file.
///
/// The raw text is authoritative. Fields are parsed on first access and
/// cached; editing a line means building a new `TaskLine` from new text.
#[derive(Clone)]
pub struct TaskLine {
    raw: String,
    fields: OnceCell<TaskFields>,
}

impl TaskLine {
    pub fn new(raw: impl Into<String>) -> Self {
        TaskLine {
            raw: raw.into(),
            fields: OnceCell::new(),
        }
    }

    /// The line exactly as stored in the file
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn into_raw(self) -> String {
        self.raw
    }

    /// Derived fields, parsed lazily
    pub fn fields(&self) -> &TaskFields {
        self.fields.get_or_init(|| parse_fields(&self.raw))
    }

    pub fn is_completed(&self) -> bool {
        self.fields().completed
    }

    pub fn priority(&self) -> Option<char> {
        self.fields().priority
    }

    pub fn due(&self) -> Option<DateValue> {
        self.fields().due
    }

    pub fn threshold(&self) -> Option<DateValue> {
        self.fields().threshold
    }

    pub fn tags(&self) -> &IndexSet<String> {
        &self.fields().tags
    }

    pub fn url(&self) -> Option<&str> {
        self.fields().url.as_deref()
    }
}

impl fmt::Debug for TaskLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskLine").field(&self.raw).finish()
    }
}

impl fmt::Display for TaskLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for TaskLine {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for TaskLine {}
