//! Ordered text correction rules for the changes document.
//!
//! The rules run over the *value stream*: every editable value of the
//! document, one per line, still wrapped in its double quotes. Order:
//!
//! 1. Casing pass ([`CasingMode`])
//! 2. Fixed grammar/unit corrections (always on)
//! 3. Deletions, each gated by a config flag
//! 4. Replacements, each gated by a non-empty replacement string
//! 5. Whitespace collapse
//! 6. Uppercase the first letter after an opening quote
//!
//! Each rule is applied globally in one pass before the next rule runs.
//! No pattern can match a newline, so the number of lines never changes.

pub mod casing;
pub mod roman;

use regex::{Captures, NoExpand, Regex};

use crate::config::TextConfig;

pub use casing::CasingMode;

/// One step of the pipeline after casing.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Remove every match.
    Delete { name: &'static str, pattern: Regex },
    /// Replace every match with fixed text.
    Literal {
        name: &'static str,
        pattern: Regex,
        replacement: String,
    },
    /// Replace every match with a template that may reference capture groups.
    Template {
        name: &'static str,
        pattern: Regex,
        template: String,
    },
    /// Uppercase every match.
    Uppercase { name: &'static str, pattern: Regex },
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Delete { name, .. }
            | Rule::Literal { name, .. }
            | Rule::Template { name, .. }
            | Rule::Uppercase { name, .. } => name,
        }
    }

    fn delete(name: &'static str, pattern: &str) -> Self {
        Rule::Delete {
            name,
            pattern: compile(pattern),
        }
    }

    fn template(name: &'static str, pattern: &str, template: &str) -> Self {
        Rule::Template {
            name,
            pattern: compile(pattern),
            template: template.to_string(),
        }
    }

    /// Build a replacement from user text in `\1` notation.
    fn replacement(name: &'static str, pattern: &str, user_text: &str) -> Self {
        let pattern = compile(pattern);
        match translate_backrefs(user_text) {
            Some(template) => Rule::Template {
                name,
                pattern,
                template,
            },
            None => Rule::Literal {
                name,
                pattern,
                replacement: user_text.to_string(),
            },
        }
    }
}

/// The patterns below are fixed and tested; a failure is a programming error.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in rule pattern {pattern:?}: {e}"))
}

/// Convert `\1`..`\9` into `${1}`..`${9}`, escaping literal `$`.
///
/// Returns `None` when the text contains no back-reference.
fn translate_backrefs(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 4);
    let mut found = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek().is_some_and(|d| d.is_ascii_digit() && *d != '0') => {
                let digit = chars.next().unwrap_or('1');
                out.push_str(&format!("${{{digit}}}"));
                found = true;
            }
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    found.then_some(out)
}

/// Apply a single rule to the whole text.
pub fn apply_rule(rule: &Rule, text: &str) -> String {
    match rule {
        Rule::Delete { pattern, .. } => pattern.replace_all(text, NoExpand("")).into_owned(),
        Rule::Literal {
            pattern,
            replacement,
            ..
        } => pattern
            .replace_all(text, NoExpand(replacement.as_str()))
            .into_owned(),
        Rule::Template {
            pattern, template, ..
        } => pattern.replace_all(text, template.as_str()).into_owned(),
        Rule::Uppercase { pattern, .. } => pattern
            .replace_all(text, |caps: &Captures| caps[0].to_uppercase())
            .into_owned(),
    }
}

/// Corrections that always run after casing.
pub fn grammar_rules() -> Vec<Rule> {
    vec![
        Rule::template("aint", r"AiN't", "Ain't"),
        Rule::template("am-suffix", r"(\d)Am\b", "${1}AM"),
        Rule::template("nt-suffix", r"dN't", "dn't"),
        Rule::template("dont", r"DoN't", "Don't"),
        // "Ep." is left alone (abbreviation, e.g. "Ep. 3")
        Rule::template("ep", r"\bEp\b([^.])", "EP${1}"),
        Rule::template("mc", r"\bMc\b", "MC"),
        Rule::template("pm-suffix", r"(\d)Pm\b", "${1}PM"),
    ]
}

fn deletion_rules(text: &TextConfig) -> Vec<Rule> {
    let delete = &text.delete;
    let candidates = [
        (
            delete.bonus_track,
            "bonus-track",
            r" ?[\[(] ?[Bb]onus [Tt]rack ?[\])]",
        ),
        (delete.explicit, "explicit", r" ?[\[(] ?[Ee]xplicit ?[\])]"),
        (delete.lp, "lp", r" ?[(\[]?\b[Ll][Pp]\b ?[)\]]?"),
        (
            delete.original_mix,
            "original-mix",
            r" ?[\[(] ?[Oo]riginal [Mm]ix ?[\])]",
        ),
        (
            delete.produced_by,
            "produced-by",
            r" ?[(\[] ?[Pp]rod(?:\.|uced)(?: [Bb]y|)[^)\]\n]+ ?[)\]]",
        ),
    ];

    candidates
        .into_iter()
        .filter(|(enabled, _, _)| *enabled)
        .map(|(_, name, pattern)| Rule::delete(name, pattern))
        .collect()
}

fn replacement_rules(text: &TextConfig) -> Vec<Rule> {
    let r = &text.replace;
    // Words captured in front of a keyword; brackets and newlines excluded so
    // the capture stays inside one annotation
    let candidates: [(&str, &'static str, &str); 14] = [
        (r.edit.as_str(), "edit", r" ?[(\[] ?[Ee]dit ?[)\]]"),
        (r.extended.as_str(), "extended", r" ?[\[(] ?[Ee]xtended ?[\])]"),
        (
            r.extended_mix.as_str(),
            "extended-mix",
            r" ?[\[(]? ?[Ee]xtended [Mm]ix ?[\])]?",
        ),
        (
            r.instrumental.as_str(),
            "instrumental",
            r" ?[\[(] ?[Ii]nstr(?:\.|umental) ?[\])]",
        ),
        (r.live.as_str(), "live", r" ?[(\[] ?[Ll]ive ?[)\]]"),
        (r.ost.as_str(), "ost", r" Ost\b"),
        (
            r.soundtrack.as_str(),
            "soundtrack",
            r" ?[\[(]? ?[Oo]riginal (?:[Mm]ovie )?(?:[Mm]otion )?(?:[Pp]icture )?[Ss]oundtrack ?(?:[Aa]lbum)?[\])]?",
        ),
        (r.cover.as_str(), "cover", r"[\[(] ?(\w+) [Cc]over ?[\])]"),
        (r.mix.as_str(), "mix", r" ?[\[(] ?([^()\[\]\n]+) [Mm]ix ?[\])]"),
        (r.remix.as_str(), "remix", r"[Rr]emix"),
        (
            r.remix_bracketed.as_str(),
            "remix-bracketed",
            r" ?[\[(] ?[Rr]emix ?[\])]",
        ),
        (
            r.remix_named.as_str(),
            "remix-named",
            r" ?[\[(] ?([^()\[\]\n]+) [Rr]emix ?[\])]",
        ),
        (r.reprise.as_str(), "reprise", r"[Rr]eprise"),
        (
            r.version.as_str(),
            "version",
            r" ?[(\[] ?([^()\[\]\n]+) [Vv]ersion ?[)\]]",
        ),
    ];

    candidates
        .into_iter()
        .filter(|(replacement, _, _)| !replacement.is_empty())
        .map(|(replacement, name, pattern)| Rule::replacement(name, pattern, replacement))
        .collect()
}

fn closing_rules() -> Vec<Rule> {
    vec![
        Rule::template("collapse-spaces", r" {2,}", " "),
        Rule::Uppercase {
            name: "quote-initial",
            pattern: compile(r#""\w"#),
        },
    ]
}

/// The full ordered rule set for a run.
#[derive(Debug, Clone)]
pub struct TextRules {
    pub casing: CasingMode,
    pub rules: Vec<Rule>,
}

impl TextRules {
    pub fn from_config(text: &TextConfig) -> Self {
        let casing = if text.linguistic_casing {
            CasingMode::Linguistic
        } else {
            CasingMode::Simple
        };

        let mut rules = grammar_rules();
        rules.extend(deletion_rules(text));
        rules.extend(replacement_rules(text));
        rules.extend(closing_rules());

        Self { casing, rules }
    }

    /// Run casing and then every rule, in order, over `text`.
    pub fn apply(&self, text: &str) -> String {
        let cased = match self.casing {
            CasingMode::Simple => casing::simple_case(text),
            CasingMode::Linguistic => casing::linguistic_case(text),
        };

        self.rules.iter().fold(cased, |acc, rule| {
            let next = apply_rule(rule, &acc);
            if next != acc {
                tracing::debug!(rule = rule.name(), "rule changed text");
            }
            next
        })
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(Rule::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextConfig;

    fn run(text: &str) -> String {
        TextRules::from_config(&TextConfig::default()).apply(text)
    }

    fn run_fixed(text: &str) -> String {
        grammar_rules()
            .iter()
            .fold(text.to_string(), |acc, rule| apply_rule(rule, &acc))
    }

    #[test]
    fn test_rule_order() {
        let rules = TextRules::from_config(&TextConfig::default());
        let names = rules.rule_names();
        assert_eq!(names.first(), Some(&"aint"));
        assert_eq!(names[names.len() - 2], "collapse-spaces");
        assert_eq!(names.last(), Some(&"quote-initial"));

        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("mc") < pos("bonus-track"));
        assert!(pos("produced-by") < pos("edit"));
        assert!(pos("mix") < pos("remix"));
        assert!(pos("remix-named") < pos("version"));
    }

    #[test]
    fn test_gating() {
        let mut text = TextConfig::default();
        text.delete.explicit = false;
        text.replace.live = String::new();
        let names = TextRules::from_config(&text).rule_names();
        assert!(!names.contains(&"explicit"));
        assert!(!names.contains(&"live"));
        assert!(names.contains(&"bonus-track"));
    }

    #[test]
    fn test_translate_backrefs() {
        assert_eq!(translate_backrefs(r" (\1 mix)").as_deref(), Some(" (${1} mix)"));
        assert_eq!(translate_backrefs(" (edit)"), None);
        assert_eq!(translate_backrefs(r"$\1").as_deref(), Some("$$${1}"));
    }

    #[test]
    fn test_grammar_fixes() {
        assert_eq!(run_fixed("\"DoN't Stop\""), "\"Don't Stop\"");
        assert_eq!(run_fixed("\"AiN't No Sunshine\""), "\"Ain't No Sunshine\"");
        assert_eq!(run_fixed("\"DidN't\""), "\"Didn't\"");
        assert_eq!(run_fixed("\"5Am In Toronto\""), "\"5AM In Toronto\"");
        assert_eq!(run_fixed("\"Live At 11Pm\""), "\"Live At 11PM\"");
        assert_eq!(run_fixed("\"Mc Hammer\""), "\"MC Hammer\"");
        assert_eq!(run_fixed("\"Mcdonald\""), "\"Mcdonald\"");
        assert_eq!(run_fixed("\"Summer Ep\""), "\"Summer EP\"");
        assert_eq!(run_fixed("\"Ep. 4\""), "\"Ep. 4\"");
        assert_eq!(run_fixed("\"Amsterdam\""), "\"Amsterdam\"");
    }

    fn simple() -> TextRules {
        let mut text = TextConfig::default();
        text.linguistic_casing = false;
        TextRules::from_config(&text)
    }

    #[test]
    fn test_time_suffix_after_casing() {
        assert_eq!(run("\"meet me at 5pm\"\n\"10am\""), "\"Meet Me at 5PM\"\n\"10AM\"");
        assert_eq!(run("\"at 5PM\""), "\"At 5PM\"");
        assert_eq!(simple().apply("\"meet me at 5pm\""), "\"Meet Me At 5PM\"");
        assert_eq!(simple().apply("\"11Pm\""), "\"11PM\"");
    }

    #[test]
    fn test_full_pipeline_idempotent() {
        let inputs = [
            "\"don't stop me at 5pm\"\n\"mc ep\"",
            "\"ain't it fun\"\n\"summer ep (bonus track)\"",
            "\"couldn't ep. 2 at 10am\"",
            "\"song (dj shadow remix)\"\n\"film (original motion picture soundtrack)\"",
            "\"the sound of silence (live)\"\n\"song [edit]\"",
        ];
        for rules in [TextRules::from_config(&TextConfig::default()), simple()] {
            for input in inputs {
                let once = rules.apply(input);
                let twice = rules.apply(&once);
                assert_eq!(once, twice, "not idempotent for {input:?}");
            }
        }
    }

    #[test]
    fn test_deletions() {
        assert_eq!(run("\"song name (bonus track)\""), "\"Song Name\"");
        assert_eq!(run("\"song name [ explicit ]\""), "\"Song Name\"");
        assert_eq!(run("\"album lp\""), "\"Album\"");
        assert_eq!(run("\"track (original mix)\""), "\"Track\"");
        assert_eq!(run("\"beat (prod. by someone)\""), "\"Beat\"");
        assert_eq!(run("\"beat [produced by some one]\""), "\"Beat\"");
    }

    #[test]
    fn test_replacements() {
        assert_eq!(run("\"song [edit]\""), "\"Song (edit)\"");
        assert_eq!(run("\"song (instr.)\""), "\"Song (instrumental)\"");
        assert_eq!(run("\"song (live)\""), "\"Song (live)\"");
        assert_eq!(
            run("\"film (original motion picture soundtrack)\""),
            "\"Film OST\""
        );
        assert_eq!(run("\"film ost\""), "\"Film OST\"");
        assert_eq!(run("\"ostrich\""), "\"Ostrich\"");
    }

    #[test]
    fn test_backreference_preserves_inner_text() {
        assert_eq!(run("\"song (club mix)\""), "\"Song (Club mix)\"");
        assert_eq!(run("\"song (dj shadow remix)\""), "\"Song (Dj Shadow remix)\"");
        assert_eq!(run("\"song (acoustic version)\""), "\"Song (Acoustic version)\"");
        assert_eq!(run("\"song (beatles cover)\""), "\"Song (Beatles cover)\"");
    }

    #[test]
    fn test_bracketed_remix() {
        assert_eq!(run("\"song [remix]\""), "\"Song (remix)\"");
        assert_eq!(run("\"song remix\""), "\"Song remix\"");
    }

    #[test]
    fn test_reprise() {
        assert_eq!(run("\"theme reprise\""), "\"Theme reprise\"");
    }

    #[test]
    fn test_collapse_and_quote_initial() {
        let rules = TextRules::from_config(&TextConfig::default());
        let collapsed = apply_rule(&rules.rules[rules.rules.len() - 2], "\"a   b\"");
        assert_eq!(collapsed, "\"a b\"");
        let upper = apply_rule(rules.rules.last().unwrap(), "\"of mice\"\n\"the end\"");
        assert_eq!(upper, "\"Of mice\"\n\"The end\"");
    }

    #[test]
    fn test_line_count_preserved() {
        let input = "\"a (bonus track)\"\n\"\"\n\"b (club mix)\"\n\"2004\"\n\"3\"";
        assert_eq!(run(input).lines().count(), input.lines().count());
    }

    #[test]
    fn test_simple_mode() {
        let mut text = TextConfig::default();
        text.linguistic_casing = false;
        let rules = TextRules::from_config(&text);
        assert_eq!(rules.casing, CasingMode::Simple);
        assert_eq!(rules.apply("\"the sound of silence\""), "\"The Sound Of Silence\"");
    }
}
