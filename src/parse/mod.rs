pub mod line_edit;
pub mod line_parser;
pub mod patterns;

pub use line_edit::{
    DateTag, PriorityShift, append_text, lower_priority, normalize_whitespace, pretty_print,
    raise_priority, remove_text, set_completed, set_date_tag, shift_priority, strip_newlines,
    toggle_today, with_creation_date,
};
pub use line_parser::{join_lines, parse_fields, split_lines};
