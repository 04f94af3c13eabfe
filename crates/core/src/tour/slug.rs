//! URL slug derivation for tour names.

use std::sync::LazyLock;

use regex::Regex;

/// Runs of anything that is not a letter or digit become a single separator.
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex"));

/// Derive the URL slug for a tour name.
///
/// Lowercases the name, drops apostrophes, and collapses every run of
/// non-alphanumeric characters into a single `-`. Leading and trailing
/// separators are removed.
///
/// # Examples
///
/// ```
/// use tourbook_core::tour::slug::slugify;
///
/// assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
/// assert_eq!(slugify("  The Sea Explorer!  "), "the-sea-explorer");
/// ```
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase().replace(['\'', '\u{2019}'], "");
    SEPARATOR_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(slugify("The   Snow -- Adventurer"), "the-snow-adventurer");
    }

    #[test]
    fn strips_edge_punctuation() {
        assert_eq!(slugify("...The Park Camper?"), "the-park-camper");
    }

    #[test]
    fn apostrophes_do_not_split_words() {
        assert_eq!(slugify("The Hiker's Dream"), "the-hikers-dream");
        assert_eq!(slugify("The Hiker\u{2019}s Dream"), "the-hikers-dream");
    }

    #[test]
    fn keeps_digits_and_non_ascii_letters() {
        assert_eq!(slugify("Zürich 2 Day Tour"), "zürich-2-day-tour");
    }

    #[test]
    fn deterministic() {
        assert_eq!(slugify("The Wine Taster"), slugify("The Wine Taster"));
    }

    #[test]
    fn empty_name() {
        assert_eq!(slugify(""), "");
    }
}
