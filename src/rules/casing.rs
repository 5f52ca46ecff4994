//! Title casing for tag values.
//!
//! Two modes:
//! - [`CasingMode::Simple`]: first letter of every word uppercased.
//! - [`CasingMode::Linguistic`]: Chicago-style casing driven by a small
//!   part-of-speech lexicon. Articles, coordinating conjunctions and
//!   prepositions stay lowercase unless they open or close the value;
//!   particles, pronouns and everything else are capitalized.
//!
//! Both modes lowercase the remainder of each capitalized word, so later
//! fix-up rules (e.g. `Mc` -> `MC`) see a predictable shape.

/// Which casing pass runs first in the rule pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasingMode {
    Simple,
    Linguistic,
}

const ARTICLES: &[&str] = &["a", "an", "the"];

const CONJUNCTIONS: &[&str] = &["and", "but", "or", "nor", "as"];

const PREPOSITIONS: &[&str] = &[
    "about", "above", "across", "against", "along", "amid", "among", "around", "at", "atop",
    "below", "beneath", "beside", "besides", "between", "beyond", "by", "despite", "during",
    "except", "for", "from", "in", "inside", "into", "like", "near", "of", "on", "onto",
    "outside", "per", "than", "through", "throughout", "to", "toward", "towards", "under",
    "underneath", "unlike", "unto", "upon", "versus", "via", "vs", "with", "within",
    "without",
];

/// Subordinators that always open a clause.
const CLAUSE_MARKERS: &[&str] = &[
    "although", "because", "if", "though", "unless", "whereas", "whether", "while",
];

/// Words that are prepositions or subordinators depending on what follows.
const AMBIGUOUS_MARKERS: &[&str] = &["after", "before", "since", "till", "until", "once"];

const PRONOUNS: &[&str] = &[
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "this",
    "that", "there", "everything", "nothing", "someone", "everybody", "nobody",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Hyphen,
    Space,
    Other,
}

#[derive(Debug)]
struct Token<'a> {
    text: &'a str,
    kind: TokenKind,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Split a value into words, hyphens, whitespace runs and other punctuation.
///
/// Apostrophes between letters stay inside the word ("don't", "rock'n'roll").
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        let kind = if is_word_char(c) {
            TokenKind::Word
        } else if c == '-' {
            TokenKind::Hyphen
        } else if c.is_whitespace() {
            TokenKind::Space
        } else {
            TokenKind::Other
        };

        let mut j = i + 1;
        match kind {
            TokenKind::Word => {
                while j < chars.len() {
                    let c = chars[j].1;
                    let inner_apostrophe = (c == '\'' || c == '’')
                        && chars.get(j + 1).is_some_and(|&(_, n)| is_word_char(n));
                    if is_word_char(c) || inner_apostrophe {
                        j += 1;
                    } else {
                        break;
                    }
                }
            }
            TokenKind::Space => {
                while j < chars.len() && chars[j].1.is_whitespace() {
                    j += 1;
                }
            }
            TokenKind::Hyphen | TokenKind::Other => {}
        }

        let end = chars.get(j).map(|&(idx, _)| idx).unwrap_or(text.len());
        tokens.push(Token {
            text: &text[start..end],
            kind,
        });
        i = j;
    }

    tokens
}

/// Uppercase the first letter, lowercase the rest. Leading digits are kept,
/// so "5pm" becomes "5Pm" for the unit fix-ups to pick up.
pub fn capitalize(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut seen_letter = false;
    for c in word.chars() {
        if seen_letter {
            out.extend(c.to_lowercase());
        } else if c.is_alphabetic() {
            out.extend(c.to_uppercase());
            seen_letter = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// Capitalize every word of a multi-line text.
pub fn simple_case(text: &str) -> String {
    tokenize(text)
        .iter()
        .map(|t| match t.kind {
            TokenKind::Word => capitalize(t.text),
            _ => t.text.to_string(),
        })
        .collect()
}

/// Apply linguistic casing line by line; each line is one title.
pub fn linguistic_case(text: &str) -> String {
    text.split('\n')
        .map(linguistic_case_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn linguistic_case_line(line: &str) -> String {
    let tokens = tokenize(line);
    // Indices of non-space tokens; neighbours are looked up in this sequence
    let significant: Vec<usize> = (0..tokens.len())
        .filter(|&i| tokens[i].kind != TokenKind::Space)
        .collect();
    let words: Vec<usize> = significant
        .iter()
        .copied()
        .filter(|&i| tokens[i].kind == TokenKind::Word)
        .collect();

    let mut out = String::with_capacity(line.len());
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Word {
            out.push_str(token.text);
            continue;
        }

        let is_edge = words.first() == Some(&i) || words.last() == Some(&i);
        let pos = significant.iter().position(|&s| s == i).unwrap_or(0);
        let prev = pos.checked_sub(1).map(|p| &tokens[significant[p]]);
        let next = significant.get(pos + 1).map(|&n| &tokens[n]);
        let next_word = words
            .iter()
            .position(|&w| w == i)
            .and_then(|w| words.get(w + 1))
            .map(|&n| tokens[n].text);

        let before_hyphen = next.is_some_and(|t| t.kind == TokenKind::Hyphen)
            && prev.is_none_or(|t| t.kind != TokenKind::Hyphen);

        if is_edge || before_hyphen || should_capitalize(token.text, next_word) {
            out.push_str(&capitalize(token.text));
        } else {
            out.push_str(&token.text.to_lowercase());
        }
    }
    out
}

fn should_capitalize(word: &str, next_word: Option<&str>) -> bool {
    let lower = word.to_lowercase();
    let lower = lower.as_str();

    if CLAUSE_MARKERS.contains(&lower) {
        return true;
    }
    if AMBIGUOUS_MARKERS.contains(&lower) {
        return next_word.is_some_and(|n| PRONOUNS.contains(&n.to_lowercase().as_str()));
    }
    !(ARTICLES.contains(&lower) || CONJUNCTIONS.contains(&lower) || PREPOSITIONS.contains(&lower))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize_lowers_rest() {
        assert_eq!(capitalize("mcDONALD"), "Mcdonald");
        assert_eq!(capitalize("élan"), "Élan");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_capitalize_after_leading_digits() {
        assert_eq!(capitalize("5pm"), "5Pm");
        assert_eq!(capitalize("10AM"), "10Am");
        assert_eq!(capitalize("1999"), "1999");
        assert_eq!(simple_case("at 5pm"), "At 5Pm");
        assert_eq!(linguistic_case("\"meet me at 5pm\""), "\"Meet Me at 5Pm\"");
    }

    #[test]
    fn test_simple_case_every_word() {
        assert_eq!(simple_case("\"the sound of silence\""), "\"The Sound Of Silence\"");
        assert_eq!(simple_case("x-ray (remix)"), "X-Ray (Remix)");
        assert_eq!(simple_case("don't stop"), "Don't Stop");
    }

    #[test]
    fn test_linguistic_keeps_small_words_lower() {
        assert_eq!(
            linguistic_case("\"the sound of silence\""),
            "\"The Sound of Silence\""
        );
        assert_eq!(
            linguistic_case("\"war and peace in the city\""),
            "\"War and Peace in the City\""
        );
    }

    #[test]
    fn test_linguistic_first_and_last_always_capitalized() {
        assert_eq!(linguistic_case("\"of mice and men\""), "\"Of Mice and Men\"");
        assert_eq!(linguistic_case("\"what are you waiting for\""), "\"What Are You Waiting For\"");
    }

    #[test]
    fn test_linguistic_per_line() {
        assert_eq!(
            linguistic_case("\"in bloom\"\n\"a day in the life\""),
            "\"In Bloom\"\n\"A Day in the Life\""
        );
    }

    #[test]
    fn test_linguistic_clause_markers() {
        assert_eq!(
            linguistic_case("\"dance if you want to\""),
            "\"Dance If You Want To\""
        );
        assert_eq!(
            linguistic_case("\"ever since you left\""),
            "\"Ever Since You Left\""
        );
        assert_eq!(
            linguistic_case("\"calm before the storm\""),
            "\"Calm before the Storm\""
        );
    }

    #[test]
    fn test_linguistic_hyphen_neighbour() {
        assert_eq!(
            linguistic_case("\"a state-of-the-art machine\""),
            "\"A State-of-the-Art Machine\""
        );
        assert_eq!(linguistic_case("\"over-the-top\""), "\"Over-the-Top\"");
    }

    #[test]
    fn test_linguistic_leaves_digits_and_punctuation() {
        assert_eq!(linguistic_case("\"1999\""), "\"1999\"");
        assert_eq!(linguistic_case("\"\""), "\"\"");
    }
}
