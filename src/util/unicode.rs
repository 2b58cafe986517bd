use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ELLIPSIS: char = '\u{2026}';

/// Terminal cells taken by one grapheme. A tab is printed as a single space.
fn grapheme_width(g: &str) -> usize {
    if g == "\t" { 1 } else { UnicodeWidthStr::width(g) }
}

/// Display width in terminal cells.
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).map(grapheme_width).sum()
}

/// Cut `s` to at most `max_cells` cells, ending in `…` when something was
/// dropped. Never splits a grapheme.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    let budget = max_cells - 1;
    let mut width = 0;
    let mut out = String::new();
    for g in s.graphemes(true) {
        let w = grapheme_width(g);
        if width + w > budget {
            break;
        }
        width += w;
        out.push_str(g);
    }
    out.push(ELLIPSIS);
    out
}

/// Pad `s` with spaces to `cells` wide, on the left when `right_align`.
/// Wider strings are returned as they are.
pub fn pad_to_width(s: &str, cells: usize, right_align: bool) -> String {
    let fill = " ".repeat(cells.saturating_sub(display_width(s)));
    if right_align {
        format!("{fill}{s}")
    } else {
        format!("{s}{fill}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_counts_cells_not_bytes() {
        assert_eq!(display_width("buy milk"), 8);
        assert_eq!(display_width("买牛奶"), 6);
        assert_eq!(display_width("cafe\u{0301}"), 4);
        assert_eq!(display_width("a\tb"), 3);
        assert_eq!(display_width(""), 0);
    }

    #[test]
    fn truncate_short_strings_untouched() {
        assert_eq!(truncate_to_width("call mom", 8), "call mom");
        assert_eq!(truncate_to_width("call mom", 0), "");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate_to_width("call mom @phone", 9), "call mom\u{2026}");
        assert_eq!(truncate_to_width("abc", 1), "\u{2026}");
    }

    #[test]
    fn truncate_respects_wide_graphemes() {
        // budget 4: two wide chars fit, the third does not
        let out = truncate_to_width("买牛奶了", 5);
        assert_eq!(out, "买牛\u{2026}");
        let out = truncate_to_width("买牛奶了", 4);
        assert_eq!(out, "买\u{2026}");
        assert!(display_width(&out) <= 4);
    }

    #[test]
    fn pad_left_and_right() {
        assert_eq!(pad_to_width("7", 3, true), "  7");
        assert_eq!(pad_to_width("7", 3, false), "7  ");
        assert_eq!(pad_to_width("1234", 3, true), "1234");
        assert_eq!(pad_to_width("买", 3, false), "买 ");
    }
}
