//! Text normalization and similarity for place names, addresses and phones.

use std::collections::HashSet;

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};
use unicode_segmentation::UnicodeSegmentation;

const STOP_WORDS: &[&str] = &["the", "a", "an", "and", "of", "in", "at", "on", "for", "to", "by"];

const BUSINESS_WORDS: &[&str] = &[
    "restaurant",
    "hotel",
    "cafe",
    "bar",
    "bistro",
    "inn",
    "suite",
    "suites",
];

const ADDRESS_ABBREVIATIONS: &[(&str, &str)] = &[
    ("st", "street"),
    ("ave", "avenue"),
    ("av", "avenue"),
    ("blvd", "boulevard"),
    ("rd", "road"),
    ("dr", "drive"),
    ("ln", "lane"),
    ("pl", "place"),
    ("sq", "square"),
    ("ste", "suite"),
    ("fl", "floor"),
    ("n", "north"),
    ("s", "south"),
    ("e", "east"),
    ("w", "west"),
];

/// Strip diacritics, lowercase, and turn punctuation into word breaks.
/// Apostrophes are dropped so `Joe's` and `Joes` fold to the same word.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | '`'))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}

fn words(text: &str) -> Vec<String> {
    fold(text).unicode_words().map(str::to_string).collect()
}

/// Normalized comparison key for a place name.
///
/// Stop words and generic business words are removed. A name made only of
/// such words (`"The Bar"`) keeps them rather than normalizing to nothing.
pub fn normalize_name(name: &str) -> String {
    let all = words(name);
    let significant: Vec<&str> = all
        .iter()
        .map(String::as_str)
        .filter(|w| !STOP_WORDS.contains(w) && !BUSINESS_WORDS.contains(w))
        .collect();

    if significant.is_empty() {
        all.join(" ")
    } else {
        significant.join(" ")
    }
}

pub fn normalize_address(address: &str) -> String {
    words(address)
        .into_iter()
        .map(|w| {
            ADDRESS_ABBREVIATIONS
                .iter()
                .find(|(short, _)| *short == w)
                .map(|(_, long)| long.to_string())
                .unwrap_or(w)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_set_score(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();

    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count() as f64;
    let union = left.union(&right).count() as f64;
    let jaccard = shared / union;
    let containment = shared / left.len().min(right.len()) as f64;

    (jaccard + containment) / 2.0
}

fn similarity_of_normalized(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    token_set_score(a, b).max(strsim::normalized_levenshtein(a, b))
}

/// Name similarity in [0, 1].
pub fn name_similarity(a: &str, b: &str) -> f64 {
    similarity_of_normalized(&normalize_name(a), &normalize_name(b))
}

/// Address similarity in [0, 1].
pub fn address_similarity(a: &str, b: &str) -> f64 {
    similarity_of_normalized(&normalize_address(a), &normalize_address(b))
}

/// Last ten digits of a phone number, or `None` below seven digits.
pub fn phone_key(phone: &str) -> Option<String> {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 7 {
        return None;
    }
    let start = digits.len().saturating_sub(10);
    Some(digits[start..].iter().collect())
}

pub fn phones_match(a: &str, b: &str) -> bool {
    match (phone_key(a), phone_key(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
