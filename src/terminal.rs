//! Terminal rendering for the demo host
//!
//! Builds ANSI strings for the input line and the suggestion list under it.

use crossterm::cursor;
use crossterm::terminal::{Clear, ClearType};
use crossterm::Command;

use crate::splice::floor_char_boundary;
use crate::store::SuggestionSnapshot;

/// Carriage return + newline (raw mode does not translate `\n`)
pub const CRLF: &str = "\r\n";

/// Move cursor up N lines
pub fn move_up(n: u16) -> String {
    let mut buf = String::new();
    let _ = cursor::MoveUp(n).write_ansi(&mut buf);
    buf
}

/// Move cursor to column (0-indexed)
pub fn move_to_column(col: u16) -> String {
    let mut buf = String::new();
    let _ = cursor::MoveToColumn(col).write_ansi(&mut buf);
    buf
}

/// Clear current line
pub fn clear_line() -> String {
    let mut buf = String::new();
    let _ = Clear(ClearType::CurrentLine).write_ansi(&mut buf);
    buf
}

/// Clear from cursor to end of screen
pub fn clear_below() -> String {
    let mut buf = String::new();
    let _ = Clear(ClearType::FromCursorDown).write_ansi(&mut buf);
    buf
}

/// Redraw the prompt line and up to `max_rows` suggestions below it, leaving
/// the cursor at `caret` (byte offset into `text`).
pub fn render_field(
    prompt: &str,
    text: &str,
    caret: usize,
    suggestions: &SuggestionSnapshot,
    max_rows: usize,
) -> String {
    let mut out = String::new();
    out.push('\r');
    out.push_str(&clear_line());
    out.push_str(prompt);
    out.push_str(text);

    let rows = suggestions.items.len().min(max_rows);
    for (i, item) in suggestions.items.iter().take(rows).enumerate() {
        out.push_str(CRLF);
        out.push_str(&clear_line());
        let marker = if suggestions.selected == Some(i) { '>' } else { ' ' };
        out.push_str(&format!("  {} {}", marker, item.term));
    }
    if suggestions.items.len() > rows {
        out.push_str(CRLF);
        out.push_str(&clear_line());
        out.push_str(&format!("    (+{} more)", suggestions.items.len() - rows));
    }

    out.push_str(CRLF);
    out.push_str(&clear_below());

    let below = rows + usize::from(suggestions.items.len() > rows) + 1;
    out.push_str(&move_up(below as u16));

    let caret = &text[..floor_char_boundary(text, caret)];
    let col = prompt.chars().count() + caret.chars().count();
    out.push_str(&move_to_column(col.min(u16::MAX as usize) as u16));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Suggestion;

    fn snapshot(terms: &[&str], selected: Option<usize>) -> SuggestionSnapshot {
        SuggestionSnapshot {
            items: terms
                .iter()
                .map(|t| Suggestion {
                    term: t.to_string(),
                    matched_pretext: String::new(),
                })
                .collect(),
            selected,
        }
    }

    #[test]
    fn test_ctrl_sequences() {
        assert!(!move_up(1).is_empty());
        assert!(!clear_line().is_empty());
        assert!(!clear_below().is_empty());
    }

    #[test]
    fn test_marks_selected_row() {
        let out = render_field("> ", "he", 2, &snapshot(&["hello", "help"], Some(1)), 5);
        assert!(out.contains("    hello"));
        assert!(out.contains("  > help"));
        assert!(out.ends_with(&format!("{}{}", move_up(3), move_to_column(4))));
    }

    #[test]
    fn test_truncates_long_lists() {
        let out = render_field("", "a", 1, &snapshot(&["a1", "a2", "a3"], Some(0)), 2);
        assert!(out.contains("(+1 more)"));
        assert!(!out.contains("a3"));
    }

    #[test]
    fn test_empty_list_still_clears_below() {
        let out = render_field("> ", "日本", 3, &SuggestionSnapshot::default(), 5);
        assert!(out.contains(&clear_below()));
        assert!(out.ends_with(&format!("{}{}", move_up(1), move_to_column(3))));
    }
}
