//! Residual description: the message text with amount and date tokens removed.

use crate::patterns::TokenPattern;

/// Remove every amount-, numeric-date- and textual-date-shaped token, then
/// collapse whitespace.
///
/// Removal is driven by the token shapes, not by what the resolvers
/// accepted, so "30/02/2024" disappears even though it is not a date.
/// Passes repeat until nothing changes: removing one token can bring two
/// fragments together into a new one.
pub fn strip(text: &str) -> String {
    let mut current = collapse_whitespace(text);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let removed = TokenPattern::STRIP_ORDER
        .into_iter()
        .fold(text.to_string(), |acc, pattern| pattern.remove_all(&acc));
    collapse_whitespace(&removed)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
