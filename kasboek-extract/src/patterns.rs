//! Token matchers shared by the resolvers and the description stripper.
//!
//! The resolvers read the first token of a kind, the stripper removes every
//! token of every kind. Both go through this module so the two can never
//! disagree about what a token looks like.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::LazyLock;

use kasboek_core::MonthTable;
use regex::Regex;

/// Euro marker before or after a loose run of digits and separators.
/// The run is cleaned up later, so "1.000,00", "10.50" and "1,000.00" all match.
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"€\s*(?P<pre>[0-9.,]+)|(?P<post>[0-9.,]+)\s*€").expect("amount pattern")
});

/// 01/01/2024, 1-1-24, 1.1.2024
static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<day>[0-9]{1,2})[./-](?P<month>[0-9]{1,2})[./-](?P<year>[0-9]{2,4})\b")
        .expect("numeric date pattern")
});

/// 12 jan 2024, 1 Januari 24. The month word is checked against the
/// month table by the resolver, not here.
static TEXTUAL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<day>[0-9]{1,2})\s+(?P<month>[a-zA-Z]+)\s+(?P<year>[0-9]{2,4})\b")
        .expect("textual date pattern")
});

/// Stands in for date characters while looking for amounts. It is neither
/// whitespace nor part of a number, so an amount can never reach across it.
const MASK: &str = "#";

/// The three token shapes, in the order the stripper removes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPattern {
    Amount,
    NumericDate,
    TextualDate,
}

impl TokenPattern {
    pub const STRIP_ORDER: [TokenPattern; 3] = [
        TokenPattern::Amount,
        TokenPattern::NumericDate,
        TokenPattern::TextualDate,
    ];

    /// Byte ranges of every non-overlapping match in `text`, left to right.
    pub fn spans(self, text: &str) -> Vec<Range<usize>> {
        match self {
            TokenPattern::Amount => amount_tokens(text).into_iter().map(|t| t.span).collect(),
            TokenPattern::NumericDate => NUMERIC_DATE.find_iter(text).map(|m| m.range()).collect(),
            TokenPattern::TextualDate => TEXTUAL_DATE.find_iter(text).map(|m| m.range()).collect(),
        }
    }

    /// Replace every match with a single space.
    pub fn remove_all(self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for span in self.spans(text) {
            out.push_str(&text[last..span.start]);
            out.push(' ');
            last = span.end;
        }
        out.push_str(&text[last..]);
        out
    }
}

/// An amount token before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountToken<'t> {
    /// Marker, whitespace and number together.
    pub span: Range<usize>,
    /// Digits and separators only.
    pub raw: &'t str,
}

/// A date token before calendar validation. Fields are the literal digit
/// and word runs from the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateToken<'t> {
    pub span: Range<usize>,
    pub day: &'t str,
    pub month: &'t str,
    pub year: &'t str,
}

pub fn first_numeric_date(text: &str) -> Option<DateToken<'_>> {
    date_token(&NUMERIC_DATE, text)
}

pub fn first_textual_date(text: &str) -> Option<DateToken<'_>> {
    date_token(&TEXTUAL_DATE, text)
}

fn date_token<'t>(re: &Regex, text: &'t str) -> Option<DateToken<'t>> {
    let caps = re.captures(text)?;
    Some(DateToken {
        span: caps.get(0)?.range(),
        day: caps.name("day")?.as_str(),
        month: caps.name("month")?.as_str(),
        year: caps.name("year")?.as_str(),
    })
}

/// Ranges that look like dates: every numeric date, and textual dates whose
/// word is a known month.
pub fn date_spans(text: &str) -> Vec<Range<usize>> {
    let numeric = NUMERIC_DATE.find_iter(text).map(|m| m.range());
    let textual = TEXTUAL_DATE
        .captures_iter(text)
        .filter(|caps| caps.name("month").is_some_and(|m| MonthTable::contains(m.as_str())))
        .filter_map(|caps| caps.get(0).map(|m| m.range()));
    numeric.chain(textual).collect()
}

/// Amount tokens, left to right, ignoring anything inside a date.
///
/// Without this, "12 jan 2024 € 15,00" would read the year as "2024 €".
pub fn amount_tokens(text: &str) -> Vec<AmountToken<'_>> {
    let masked = mask_dates(text);
    AMOUNT
        .captures_iter(&masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.name("pre").or_else(|| caps.name("post"))?;
            Some(AmountToken {
                span: whole.range(),
                raw: &text[number.range()],
            })
        })
        .collect()
}

pub fn first_amount_token(text: &str) -> Option<AmountToken<'_>> {
    let masked = mask_dates(text);
    let caps = AMOUNT.captures(&masked)?;
    let number = caps.name("pre").or_else(|| caps.name("post"))?;
    Some(AmountToken {
        span: caps.get(0)?.range(),
        raw: &text[number.range()],
    })
}

/// Overwrite date spans byte-for-byte so offsets stay valid for `text`.
fn mask_dates(text: &str) -> Cow<'_, str> {
    let mut spans = date_spans(text);
    if spans.is_empty() {
        return Cow::Borrowed(text);
    }
    spans.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        let start = span.start.max(last);
        if start >= span.end {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push_str(&MASK.repeat(span.end - start));
        last = span.end;
    }
    out.push_str(&text[last..]);
    Cow::Owned(out)
}
