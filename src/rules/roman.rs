//! Roman numeral to Arabic numeral conversion for titles.
//!
//! Only uppercase numerals II through XX are converted, and only as whole
//! words, so "DIVISION" or "Vivid" stay intact. A colon directly after the
//! numeral is kept ("Part XIV: Finale" -> "Part 14: Finale"). The single
//! letters X and V are ambiguous (letters, initials) and only convert when
//! they stand alone after whitespace.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static MULTI_LETTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(XX|XIX|XVIII|XVII|XVI|XV|XIV|XIII|XII|XI|IX|VIII|VII|VI|IV|III|II)\b").unwrap()
});

static SINGLE_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\s)(X|V)(:|\s|$)").unwrap());

fn value(numeral: &str) -> u32 {
    let digit = |c: char| match c {
        'I' => 1,
        'V' => 5,
        'X' => 10,
        _ => 0,
    };
    let digits: Vec<u32> = numeral.chars().map(digit).collect();
    digits
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            if digits.get(i + 1).is_some_and(|&next| next > d) {
                -(d as i64)
            } else {
                d as i64
            }
        })
        .sum::<i64>() as u32
}

/// Replace Roman numerals in `title` with Arabic numerals.
pub fn roman_to_arabic(title: &str) -> String {
    let converted = MULTI_LETTER.replace_all(title, |caps: &Captures| value(&caps[1]).to_string());
    // Run twice: adjacent single letters share the separating whitespace
    let mut result = converted.into_owned();
    for _ in 0..2 {
        result = SINGLE_LETTER
            .replace_all(&result, |caps: &Captures| {
                format!("{}{}{}", &caps[1], value(&caps[2]), &caps[3])
            })
            .into_owned();
    }
    result
}
