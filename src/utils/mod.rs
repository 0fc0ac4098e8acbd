//! Utility functions and helpers.

use unicode_segmentation::UnicodeSegmentation;

/// Truncate a label to at most `max` graphemes for log output.
///
/// Stop names are Latin-2 territory (č, š, ž), so byte slicing is not safe.
pub fn truncate_label(text: &str, max: usize) -> String {
    match text.grapheme_indices(true).nth(max) {
        Some((cut, _)) => format!("{}..", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_labels_pass_through() {
        assert_eq!(truncate_label("Bled", 18), "Bled");
    }

    #[test]
    fn long_labels_are_cut_with_ellipsis() {
        assert_eq!(truncate_label("abcdefgh", 4), "abcd..");
    }

    #[test]
    fn truncation_respects_multibyte_graphemes() {
        assert_eq!(truncate_label("Šenčur pri Kranju", 6), "Šenčur..");
    }
}
