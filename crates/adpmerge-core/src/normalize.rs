// Player name canonicalization.
//
// Ranking providers and the Sleeper roster spell the same player differently
// ("Kenneth Walker III" vs "Ken Walker", "Ja'Marr Chase" vs "JaMarr Chase").
// `normalize_name` folds all of them onto one comparable key.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Generational suffixes, checked in order. Only the first one found at the
/// end of the name is removed per pass.
const SUFFIXES: &[&str] = &[" jr.", " jr", " sr.", " sr", " iii", " ii", " iv", " v"];

/// Characters removed outright.
const STRIPPED_CHARS: &[char] = &['.', '\'', '`'];

/// First-name variants mapped onto the form most ranking sites use.
///
/// These are literal substring replacements, not whole-word ones, so a name
/// that merely contains "anthony" is rewritten too. Known limitation.
const NAME_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("kenneth", "ken"),
    ("michael", "mike"),
    ("robert", "bob"),
    ("william", "will"),
    ("christopher", "chris"),
    ("matthew", "matt"),
    ("anthony", "tony"),
    ("joshua", "josh"),
    ("marquise", "hollywood"),
];

/// Upper bound on normalization passes. Each pass after the first can only
/// shorten the key, so this is never reached for real names.
const MAX_PASSES: usize = 8;

/// Normalize a player name into a matching key.
///
/// Steps: lowercase, trim, strip diacritics, drop one trailing suffix, remove
/// `.`/`'`/`` ` ``, turn `-` into a space, apply the nickname table, collapse
/// whitespace. The pass is repeated until the key stops changing, which makes
/// `normalize_name(normalize_name(x)) == normalize_name(x)` hold for every
/// input (e.g. "Smith Jr III" loses both suffixes).
pub fn normalize_name(name: &str) -> String {
    let mut current = normalize_pass(name);
    for _ in 1..MAX_PASSES {
        let next = normalize_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize_pass(name: &str) -> String {
    let lowered = name.to_lowercase();
    let trimmed = lowered.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let folded: String = trimmed.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let without_suffix = strip_suffix(&folded);

    let mut cleaned: String = without_suffix
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .map(|c| if c == '-' { ' ' } else { c })
        .collect();

    for (long, short) in NAME_SUBSTITUTIONS {
        if cleaned.contains(long) {
            cleaned = cleaned.replace(long, short);
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_suffix(name: &str) -> &str {
    SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .map(str::trim_end)
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize_name("  Justin Jefferson  "), "justin jefferson");
    }

    #[test]
    fn suffix_removed() {
        assert_eq!(
            normalize_name("Patrick Mahomes Jr."),
            normalize_name("patrick mahomes")
        );
        assert_eq!(normalize_name("Michael Pittman Jr."), "mike pittman");
        assert_eq!(normalize_name("Marvin Harrison Jr"), "marvin harrison");
        assert_eq!(normalize_name("Brian Thomas Jr."), "brian thomas");
    }

    #[test]
    fn roman_numeral_suffixes() {
        assert_eq!(normalize_name("Kenneth Walker III"), "ken walker");
        assert_eq!(normalize_name("Odell Beckham II"), "odell beckham");
        assert_eq!(normalize_name("Henry Ruggs IV"), "henry ruggs");
        assert_eq!(normalize_name("Someone V"), "someone");
    }

    #[test]
    fn suffix_must_be_its_own_token() {
        // "iv" inside a word is not a suffix
        assert_eq!(normalize_name("Davis Mills"), "davis mills");
        assert_eq!(normalize_name("Trev"), "trev");
    }

    #[test]
    fn apostrophes_removed() {
        assert_eq!(normalize_name("Ja'Marr Chase"), "jamarr chase");
        assert_eq!(normalize_name("D'Andre Swift"), "dandre swift");
        assert_eq!(normalize_name("Tre`Quan Smith"), "trequan smith");
    }

    #[test]
    fn periods_removed() {
        assert_eq!(normalize_name("A.J. Brown"), "aj brown");
        assert_eq!(normalize_name("D.K. Metcalf"), "dk metcalf");
    }

    #[test]
    fn hyphen_becomes_space() {
        assert_eq!(
            normalize_name("Jaxon Smith-Njigba"),
            "jaxon smith njigba"
        );
        assert_eq!(
            normalize_name("Amon-Ra St. Brown"),
            "amon ra st brown"
        );
    }

    #[test]
    fn accents_folded() {
        assert_eq!(normalize_name("Álvaro Núñez"), "alvaro nunez");
        assert_eq!(normalize_name("Zoë Müller"), "zoe muller");
    }

    #[test]
    fn nickname_table_applied() {
        assert_eq!(normalize_name("Kenneth Walker"), "ken walker");
        assert_eq!(normalize_name("Joshua Palmer"), "josh palmer");
        assert_eq!(normalize_name("Marquise Brown"), "hollywood brown");
        assert_eq!(normalize_name("Matthew Stafford"), "matt stafford");
    }

    #[test]
    fn nickname_substitution_is_substring_based() {
        // Documented limitation: not whole-word only.
        assert_eq!(normalize_name("Marcanthony Jones"), "marctony jones");
    }

    #[test]
    fn whitespace_collapsed() {
        assert_eq!(normalize_name("Josh \t  Allen"), "josh allen");
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn idempotent_on_awkward_inputs() {
        let names = [
            "Patrick Mahomes Jr.",
            "Smith Jr III",
            "Williamiam Test",
            "Joe Smith-V",
            "Someone v.",
            "Ja'Marr Chase",
            "Amon-Ra St. Brown",
            "Kenneth Walker III",
            "Álvaro Núñez Sr.",
            "",
            "  .  ",
            "Marquise 'Hollywood' Brown",
        ];
        for name in names {
            let once = normalize_name(name);
            assert_eq!(normalize_name(&once), once, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn stacked_suffixes_are_all_removed() {
        assert_eq!(normalize_name("John Smith Jr III"), "john smith");
    }

    #[test]
    fn source_independent() {
        // Same display name from roster or ranking yields the same key.
        let roster = normalize_name("Travis Etienne Jr.");
        let ranking = normalize_name("travis etienne");
        assert_eq!(roster, ranking);
    }
}
