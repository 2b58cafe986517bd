use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::parse::normalize_whitespace;
use crate::parse::patterns::TAG_RE;

/// Quick-filter entries always offered first, in this order.
pub const PINNED_SUGGESTIONS: &[&str] = &[
    "(A)", "(B)", "(C)", "@now", "@today", "@home", "@work", "due:", "t:",
];

/// Tags never offered as suggestions.
pub const SUGGESTION_STOPLIST: &[&str] = &["@todo", "@done", "+todo"];

/// One term of a search phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    /// Lowercased text, without the `!`
    pub text: String,
    pub negated: bool,
}

/// A compiled search phrase.
///
/// `work !done` matches every line that contains "work" and does not
/// contain "done", ignoring case. Terms are substrings, so `wor` matches
/// `work`. The empty phrase matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    terms: Vec<SearchTerm>,
}

impl SearchFilter {
    pub fn compile(phrase: &str) -> Self {
        let terms = phrase
            .split_whitespace()
            .filter_map(|word| {
                let (negated, text) = match word.strip_prefix('!') {
                    Some(rest) => (true, rest),
                    None => (false, word),
                };
                if text.is_empty() {
                    return None;
                }
                Some(SearchTerm {
                    text: text.to_lowercase(),
                    negated,
                })
            })
            .collect();
        SearchFilter { terms }
    }

    pub fn matches(&self, line: &str) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let line = line.to_lowercase();
        self.terms
            .iter()
            .all(|t| line.contains(t.text.as_str()) != t.negated)
    }

    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The non-negated terms, in phrase order
    pub fn required_terms(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .filter(|t| !t.negated)
            .map(|t| t.text.as_str())
    }

    fn mentions(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.terms.iter().any(|t| t.text == tag)
    }
}

/// Cycle a quick-filter tag through the phrase: absent terms are added,
/// included terms become negated, negated terms are removed.
pub fn toggle_term(phrase: &str, tag: &str) -> String {
    let negated = format!("!{tag}");
    let mut found = false;
    let mut words: Vec<String> = Vec::new();

    for word in phrase.split_whitespace() {
        if word == tag {
            found = true;
            words.push(negated.clone());
        } else if word == negated {
            found = true;
        } else {
            words.push(word.to_string());
        }
    }
    if !found {
        words.push(tag.to_string());
    }
    normalize_whitespace(&words.join(" "))
}

// ---------------------------------------------------------------------------
// Tag suggestions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TagShape {
    Project,
    Context,
    Other,
}

fn tag_shape(tag: &str) -> TagShape {
    let plain = |rest: &str| rest.chars().all(|c| c.is_alphanumeric() || c == '-');
    if let Some(rest) = tag.strip_prefix('+')
        && plain(rest)
    {
        TagShape::Project
    } else if let Some(rest) = tag.strip_prefix('@')
        && plain(rest)
    {
        TagShape::Context
    } else {
        TagShape::Other
    }
}

/// Number at the end of a tag, e.g. 12 for `+sprint12`
fn numeric_suffix(tag: &str) -> Option<u64> {
    let digits = tag.len() - tag.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    tag[tag.len() - digits..].parse().ok()
}

fn is_suggestible(tag: &str) -> bool {
    !SUGGESTION_STOPLIST.contains(&tag) && !tag[1..].chars().all(|c| c.is_ascii_digit())
}

/// Quick-filter suggestions for the rows currently shown.
///
/// Pinned entries come first. Then every tag found in `rows` that is not on
/// the stop list and not already in `phrase`: projects, then contexts, then
/// the rest. Within a group a trailing number sorts higher numbers first,
/// then more frequent tags, then the order tags were first seen.
pub fn suggest_tags<'a>(rows: impl IntoIterator<Item = &'a str>, phrase: &str) -> Vec<String> {
    let filter = SearchFilter::compile(phrase);

    let mut counts: IndexMap<&'a str, usize> = IndexMap::new();
    for row in rows {
        for caps in TAG_RE.captures_iter(row) {
            if let Some(m) = caps.get(1) {
                *counts.entry(m.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut found: Vec<(&str, usize)> = counts
        .into_iter()
        .filter(|(tag, _)| is_suggestible(tag))
        .filter(|(tag, _)| !filter.mentions(tag))
        .filter(|(tag, _)| !PINNED_SUGGESTIONS.contains(tag))
        .collect();

    // stable: equal keys keep first-seen order
    found.sort_by(|(a, a_count), (b, b_count)| {
        tag_shape(a)
            .cmp(&tag_shape(b))
            .then_with(|| match (numeric_suffix(a), numeric_suffix(b)) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| b_count.cmp(a_count))
    });

    PINNED_SUGGESTIONS
        .iter()
        .map(|s| s.to_string())
        .chain(found.into_iter().map(|(tag, _)| tag.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_phrase_matches_all() {
        let f = SearchFilter::compile("   ");
        assert!(f.is_empty());
        assert!(f.matches("anything"));
        assert!(f.matches(""));
    }

    #[test]
    fn include_and_exclude() {
        let f = SearchFilter::compile("work !done");
        assert!(f.matches("(A) Finish report @WORK"));
        assert!(!f.matches("report @work done"));
        assert!(!f.matches("report @home"));
    }

    #[test]
    fn substring_not_token() {
        assert!(SearchFilter::compile("wor").matches("homework"));
    }

    #[test]
    fn flipping_a_required_term_flips_result() {
        let f = SearchFilter::compile("milk +shop !later");
        let line = "buy Milk +shop";
        assert!(f.matches(line));
        assert!(!f.matches("buy +shop"));
        assert!(!f.matches("buy milk +shop later"));
    }

    #[test]
    fn lone_bang_and_repeated_spaces_are_dropped() {
        let f = SearchFilter::compile("a  !  b");
        assert_eq!(
            f.terms(),
            &[
                SearchTerm {
                    text: "a".into(),
                    negated: false
                },
                SearchTerm {
                    text: "b".into(),
                    negated: false
                },
            ]
        );
    }

    #[test]
    fn required_terms_skip_negated() {
        let f = SearchFilter::compile("@Home !@work +garden");
        assert_eq!(f.required_terms().collect::<Vec<_>>(), vec!["@home", "+garden"]);
    }

    #[test]
    fn toggle_term_cycles() {
        let p = toggle_term("milk", "@home");
        assert_eq!(p, "milk @home");
        let p = toggle_term(&p, "@home");
        assert_eq!(p, "milk !@home");
        let p = toggle_term(&p, "@home");
        assert_eq!(p, "milk");
        assert_eq!(toggle_term("", "@now"), "@now");
    }

    #[test]
    fn suggestions_order_and_exclusions() {
        let rows = [
            "call bob @phone +garden",
            "weed beds +garden @outside",
            "ship +release2 @work",
            "ship +release10 http://x.test/@y",
            "plan @phone +garden @todo +1 @mail:bob",
        ];
        let got = suggest_tags(rows.iter().copied(), "!@outside");
        let computed: Vec<&str> = got[PINNED_SUGGESTIONS.len()..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(
            computed,
            vec![
                "+release10",
                "+release2",
                "+garden",
                "@phone",
                "@mail:bob",
            ]
        );
        assert_eq!(&got[..3], &["(A)", "(B)", "(C)"]);
    }

    #[test]
    fn pinned_never_repeated() {
        let got = suggest_tags(["@today @today @home @lab"], "");
        assert_eq!(got.iter().filter(|s| *s == "@today").count(), 1);
        assert_eq!(got.last().map(String::as_str), Some("@lab"));
    }

    #[test]
    fn numeric_suffix_parsing() {
        assert_eq!(numeric_suffix("+sprint12"), Some(12));
        assert_eq!(numeric_suffix("+sprint"), None);
        assert_eq!(tag_shape("+a-b"), TagShape::Project);
        assert_eq!(tag_shape("@x"), TagShape::Context);
        assert_eq!(tag_shape("@a/b"), TagShape::Other);
    }
}
