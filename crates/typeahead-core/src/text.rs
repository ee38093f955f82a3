use std::collections::BTreeSet;

use unicode_segmentation::UnicodeSegmentation;

/// Lowercases the input and deletes every character that is not a unicode
/// letter, a unicode digit, or a literal space, then trims the ends.
///
/// Internal runs of spaces are kept as-is; only deletion and end-trimming
/// happen here, so `"a  -  b"` normalizes to `"a    b"`.
#[must_use]
pub fn normalize(input: &str) -> String {
    let kept: String = input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect();
    kept.trim_matches(' ').to_string()
}

/// Grapheme-cluster length. CJK ideographs count as one unit each,
/// independent of their UTF-8 byte width.
#[must_use]
pub fn grapheme_count(input: &str) -> usize {
    input.graphemes(true).count()
}

/// All prefixes of `word` from grapheme length `min_complete` through the
/// full word, sliced on grapheme boundaries. A word shorter than
/// `min_complete` contributes nothing.
#[must_use]
pub fn prefixes_for_word(word: &str, min_complete: usize) -> Vec<String> {
    let min_complete = min_complete.max(1);
    let graphemes: Vec<&str> = word.graphemes(true).collect();
    if graphemes.len() < min_complete {
        return Vec::new();
    }
    (min_complete..=graphemes.len())
        .map(|len| graphemes[..len].concat())
        .collect()
}

/// Normalizes `phrase`, splits it on literal spaces, drops stop words
/// (compared post-normalization, so the check is case/accent-insensitive),
/// and collects the de-duplicated prefixes of every surviving word.
///
/// An empty or all-punctuation phrase yields an empty set.
#[must_use]
pub fn prefixes_for_phrase(
    phrase: &str,
    min_complete: usize,
    stop_words: &BTreeSet<String>,
) -> BTreeSet<String> {
    normalize(phrase)
        .split(' ')
        .filter(|word| !word.is_empty() && !stop_words.contains(*word))
        .flat_map(|word| prefixes_for_word(word, min_complete))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_words(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn normalize_lowercases_and_strips_punctuation() {
        assert_eq!(normalize("Well, you should test this!"), "well you should test this");
        assert_eq!(normalize("  AT&T Park  "), "att park");
    }

    #[test]
    fn normalize_deletes_then_trims_without_collapsing_spaces() {
        assert_eq!(normalize("a - b"), "a  b");
        assert_eq!(normalize("?!.,"), "");
    }

    #[test]
    fn normalize_keeps_unicode_letters_and_digits() {
        assert_eq!(normalize("Café №5"), "café 5");
        assert_eq!(normalize("测试中文 test"), "测试中文 test");
    }

    #[test]
    fn grapheme_count_counts_ideographs_as_single_units() {
        assert_eq!(grapheme_count("test"), 4);
        assert_eq!(grapheme_count("测试中文"), 4);
        assert_eq!(grapheme_count(""), 0);
    }

    #[test]
    fn prefixes_for_word_emits_every_length_from_min_complete() {
        assert_eq!(
            prefixes_for_word("soulmate", 2),
            vec!["so", "sou", "soul", "soulm", "soulma", "soulmat", "soulmate"]
        );
    }

    #[test]
    fn mixed_case_input_is_normalized_before_prefixing() {
        let got = prefixes_for_phrase("SoUlmATE", 2, &BTreeSet::new());
        let want: BTreeSet<String> =
            ["so", "sou", "soul", "soulm", "soulma", "soulmat", "soulmate"]
                .iter()
                .map(|s| (*s).to_string())
                .collect();
        assert_eq!(got, want);
    }

    #[test]
    fn prefixes_for_word_slices_cjk_on_grapheme_boundaries() {
        assert_eq!(prefixes_for_word("测试中文", 2), vec!["测试", "测试中", "测试中文"]);
    }

    #[test]
    fn prefixes_for_short_word_are_empty() {
        assert!(prefixes_for_word("a", 2).is_empty());
        assert_eq!(prefixes_for_word("ab", 2), vec!["ab"]);
    }

    #[test]
    fn prefixes_for_phrase_mixes_cjk_and_ascii() {
        let got = prefixes_for_phrase("测试中文 test", 2, &BTreeSet::new());
        let want: BTreeSet<String> = ["测试", "测试中", "测试中文", "te", "tes", "test"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        assert_eq!(got, want);
    }

    #[test]
    fn prefixes_for_phrase_drops_stop_words_after_normalization() {
        let stops = stop_words(&["the", "at"]);
        let got = prefixes_for_phrase("The Knicks at MSG", 2, &stops);
        assert!(got.contains("knicks"));
        assert!(got.contains("msg"));
        assert!(!got.iter().any(|p| p == "th" || p == "the" || p == "at"));
    }

    #[test]
    fn prefixes_for_phrase_deduplicates_across_words() {
        let got = prefixes_for_phrase("test testing", 2, &BTreeSet::new());
        assert_eq!(got.iter().filter(|p| p.as_str() == "test").count(), 1);
    }

    #[test]
    fn empty_or_punctuation_only_phrase_yields_no_prefixes() {
        assert!(prefixes_for_phrase("", 2, &BTreeSet::new()).is_empty());
        assert!(prefixes_for_phrase("?!...", 2, &BTreeSet::new()).is_empty());
    }
}
