//! # Name Normalization
//!
//! Canonical form: NFKC, whitespace collapsed, legal suffixes stripped,
//! inner punctuation folded, title-cased. Two renderings of the same
//! business name normalize identically, which is what makes the exact
//! match band work.

use unicode_normalization::UnicodeNormalization;

/// Legal suffixes stripped from the end of a name, longest first.
/// Compared case-insensitively after punctuation folding.
const LEGAL_SUFFIXES: [&str; 8] = [
    "incorporated",
    "company",
    "corp",
    "inc",
    "llc",
    "ltd",
    "lp",
    "co",
];

/// Normalize a candidate franchisor name to its canonical form.
pub fn normalize_name(raw: &str) -> String {
    // Unicode NFKC first so width/compatibility variants fold together.
    let nfkc: String = raw.nfkc().collect();

    // Fold punctuation to spaces; ampersand keeps word status.
    let folded: String = nfkc
        .chars()
        .map(|c| {
            if c == '&' {
                '&'
            } else if c.is_alphanumeric() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut words: Vec<String> = folded
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();

    // Strip trailing legal suffixes, repeatedly: "Acme Burgers Co Inc"
    // reduces to "Acme Burgers".
    while let Some(last) = words.last() {
        if words.len() > 1 && LEGAL_SUFFIXES.contains(&last.as_str()) {
            words.pop();
        } else {
            break;
        }
    }

    words
        .iter()
        .map(|w| title_case(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
