//! Accent- and case-insensitive text normalization for place-name matching

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Decompose, strip combining marks, lowercase and trim.
///
/// `normalize("  São Paulo ") == "sao paulo"`
#[must_use]
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("São Paulo", "sao paulo")]
    #[case("  FLORIANÓPOLIS ", "florianopolis")]
    #[case("Goiânia", "goiania")]
    #[case("João Pessoa", "joao pessoa")]
    #[case("Maceió", "maceio")]
    #[case("", "")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_accent_and_case_insensitive() {
        assert_eq!(normalize("São Paulo"), normalize("sao paulo"));
        assert_eq!(normalize("BELÉM"), normalize("belem"));
    }

    #[rstest]
    #[case("São Paulo")]
    #[case(" Ribeirão Preto ")]
    #[case("Çàñ ÿõü")]
    #[case("already plain")]
    fn test_normalize_is_idempotent(#[case] input: &str) {
        let once = normalize(input);
        assert_eq!(normalize(&once), once);
    }
}
