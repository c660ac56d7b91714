//! Splicing a confirmed suggestion back into the text
//!
//! A suggestion remembers the pretext tail it was computed for. By the time
//! the user confirms it the text may have moved on (fast typing, slow
//! providers). When the live pretext still ends with the matched tail we just
//! replace that tail. Otherwise we look for the part of the term the user has
//! already typed past the matched tail and avoid inserting it twice.
//!
//! All offsets are UTF-8 byte offsets into the text.

/// Text and caret after applying a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub text: String,
    /// Caret position to apply after the host has rendered `text`
    pub caret: usize,
}

/// Longest suffix of `a` that is also a prefix of `b`.
///
/// `find_overlap("firepit", "pitbull") == "pit"`
pub fn find_overlap<'b>(a: &str, b: &'b str) -> &'b str {
    let mut ends: Vec<usize> = b.char_indices().map(|(i, _)| i).skip(1).collect();
    ends.push(b.len());

    ends.into_iter()
        .rev()
        .map(|end| &b[..end])
        .find(|candidate| a.ends_with(candidate))
        .unwrap_or("")
}

/// Compute the new text for confirming `term` at `caret`.
///
/// `separator` is appended after the term; the caret lands after it.
pub fn splice(term: &str, matched_pretext: &str, text: &str, caret: usize, separator: &str) -> Splice {
    let caret = floor_char_boundary(text, caret);
    let live = &text[..caret];

    let prefix = if live.ends_with(matched_pretext) {
        &live[..live.len() - matched_pretext.len()]
    } else {
        let unmatched = strip_chars(term, matched_pretext.chars().count());
        let overlap = find_overlap(live, unmatched);
        // The matched tail may be longer than what is left of the live
        // pretext once it has been edited; never cut past the start.
        let keep = live.len().saturating_sub(overlap.len() + matched_pretext.len());
        &live[..floor_char_boundary(live, keep)]
    };

    let mut out = String::with_capacity(prefix.len() + term.len() + separator.len() + text.len() - caret);
    out.push_str(prefix);
    out.push_str(term);
    out.push_str(separator);
    let caret_after = out.len();
    out.push_str(&text[caret..]);

    Splice {
        text: out,
        caret: caret_after,
    }
}

/// Largest char boundary in `s` that is `<= index`, clamped to `s.len()`.
pub(crate) fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

fn strip_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[i..],
        None => "",
    }
}
