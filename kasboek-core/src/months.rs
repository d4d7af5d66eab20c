//! Dutch month names and their standard abbreviations.

use std::collections::HashMap;
use std::sync::LazyLock;

const MONTHS: [(&str, u32); 23] = [
    ("jan", 1),
    ("januari", 1),
    ("feb", 2),
    ("februari", 2),
    ("mrt", 3),
    ("maart", 3),
    ("apr", 4),
    ("april", 4),
    ("mei", 5),
    ("jun", 6),
    ("juni", 6),
    ("jul", 7),
    ("juli", 7),
    ("aug", 8),
    ("augustus", 8),
    ("sep", 9),
    ("september", 9),
    ("okt", 10),
    ("oktober", 10),
    ("nov", 11),
    ("november", 11),
    ("dec", 12),
    ("december", 12),
];

static TABLE: LazyLock<HashMap<&'static str, u32>> = LazyLock::new(|| MONTHS.into_iter().collect());

/// Read-only lookup from a month word to its number (1-12).
pub struct MonthTable;

impl MonthTable {
    /// Resolve a month word, ignoring ASCII case. Only whole names and the
    /// listed abbreviations match; prefixes like "janu" do not.
    pub fn lookup(word: &str) -> Option<u32> {
        TABLE.get(word.to_ascii_lowercase().as_str()).copied()
    }

    pub fn contains(word: &str) -> bool {
        Self::lookup(word).is_some()
    }

    /// All known words, in calendar order.
    pub fn words() -> impl Iterator<Item = (&'static str, u32)> {
        MONTHS.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_names_and_abbreviations() {
        assert_eq!(MonthTable::lookup("januari"), Some(1));
        assert_eq!(MonthTable::lookup("mrt"), Some(3));
        assert_eq!(MonthTable::lookup("mei"), Some(5));
        assert_eq!(MonthTable::lookup("okt"), Some(10));
        assert_eq!(MonthTable::lookup("December"), Some(12));
        assert_eq!(MonthTable::lookup("JUL"), Some(7));
    }

    #[test]
    fn test_unknown_words() {
        // English spellings that differ from Dutch are not months here
        assert_eq!(MonthTable::lookup("march"), None);
        assert_eq!(MonthTable::lookup("may"), None);
        assert_eq!(MonthTable::lookup("oct"), None);
        assert_eq!(MonthTable::lookup("janu"), None);
        assert!(!MonthTable::contains(""));
    }

    #[test]
    fn test_every_month_covered() {
        for m in 1..=12 {
            assert!(MonthTable::words().any(|(_, n)| n == m), "month {m} missing");
        }
    }
}
