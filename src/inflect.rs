//! English inflection for resource names.
//!
//! Resource names are canonicalised to lower snake case and pluralised on
//! their last word, so `"Book"`, `"book"` and `"books"` all name the same
//! resource. The rules cover the regular suffixes plus a short table of
//! irregular and uncountable nouns; they are not a general-purpose
//! dictionary.

use heck::ToSnakeCase;

const UNCOUNTABLE: &[&str] = &[
    "data",
    "equipment",
    "feedback",
    "fish",
    "information",
    "media",
    "metadata",
    "money",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
];

/// (singular, plural)
const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

const F_TO_VES: &[(&str, &str)] = &[
    ("half", "halves"),
    ("knife", "knives"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("shelf", "shelves"),
    ("wife", "wives"),
    ("wolf", "wolves"),
];

const O_TO_OES: &[&str] = &["echo", "hero", "potato", "tomato", "veto"];

/// Canonical resource name: lower snake case, plural form.
///
/// Idempotent: `canonical_name(canonical_name(x)) == canonical_name(x)`.
pub fn canonical_name(name: &str) -> String {
    pluralize(&name.to_snake_case())
}

/// Plural form of the last `_`-separated word.
pub fn pluralize(word: &str) -> String {
    map_last_word(word, pluralize_word)
}

/// Singular form of the last `_`-separated word.
pub fn singularize(word: &str) -> String {
    map_last_word(word, singularize_word)
}

fn map_last_word(word: &str, f: fn(&str) -> String) -> String {
    match word.rsplit_once('_') {
        Some((head, last)) if !last.is_empty() => format!("{}_{}", head, f(last)),
        _ => f(word),
    }
}

fn is_uncountable(word: &str) -> bool {
    UNCOUNTABLE.contains(&word.to_lowercase().as_str())
}

fn is_plural(word: &str) -> bool {
    let lower = word.to_lowercase();
    if IRREGULAR.iter().any(|(_, p)| *p == lower) || F_TO_VES.iter().any(|(_, p)| *p == lower) {
        return true;
    }
    if IRREGULAR.iter().any(|(s, _)| *s == lower) {
        return false;
    }
    lower.ends_with('s') && !(lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is"))
}

fn ends_with_consonant_y(word: &str) -> bool {
    let mut chars = word.chars().rev();
    matches!(
        (chars.next(), chars.next()),
        (Some('y'), Some(c)) if !"aeiou".contains(c)
    )
}

fn pluralize_word(word: &str) -> String {
    if word.is_empty() || is_uncountable(word) || is_plural(word) {
        return word.to_string();
    }
    let lower = word.to_lowercase();
    if let Some((_, plural)) = IRREGULAR.iter().chain(F_TO_VES).find(|(s, _)| *s == lower) {
        return plural.to_string();
    }
    if ends_with_consonant_y(&lower) {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if lower.ends_with("is") {
        return format!("{}es", &word[..word.len() - 2]);
    }
    if O_TO_OES.contains(&lower.as_str()) {
        return format!("{}es", word);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

fn singularize_word(word: &str) -> String {
    if word.is_empty() || is_uncountable(word) {
        return word.to_string();
    }
    let lower = word.to_lowercase();
    if let Some((singular, _)) = IRREGULAR.iter().chain(F_TO_VES).find(|(_, p)| *p == lower) {
        return singular.to_string();
    }
    if !is_plural(word) {
        return word.to_string();
    }
    if lower.ends_with("ies") && word.len() > 3 {
        return format!("{}y", &word[..word.len() - 3]);
    }
    // analyses -> analysis, theses -> thesis
    if let Some(stem) = ["yses", "theses", "crises"]
        .iter()
        .find_map(|s| lower.ends_with(s).then(|| &word[..word.len() - 2]))
    {
        return format!("{}is", stem);
    }
    if lower.ends_with("sses") || ends_with_consonant_uses(&lower) {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with("oes") {
        let stem = &lower[..lower.len() - 2];
        return if O_TO_OES.contains(&stem) {
            word[..word.len() - 2].to_string()
        } else {
            word[..word.len() - 1].to_string()
        };
    }
    if ["shes", "ches", "xes", "zzes"].iter().any(|s| lower.ends_with(s)) {
        return word[..word.len() - 2].to_string();
    }
    word[..word.len() - 1].to_string()
}

/// `statuses`, `buses`, but not `houses` or `causes`.
fn ends_with_consonant_uses(word: &str) -> bool {
    let Some(stem) = word.strip_suffix("uses") else {
        return false;
    };
    stem.chars()
        .next_back()
        .is_some_and(|c| !"aeiou".contains(c))
}
