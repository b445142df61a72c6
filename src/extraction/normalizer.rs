//! Line filtering and OCR punctuation cleanup.

use lazy_static::lazy_static;
use regex::Regex;

use super::types::{NormalizedLine, SkipReason};

lazy_static! {
    static ref DIGIT_TO_DIGIT: Regex = Regex::new(r"([0-9])to([0-9])").expect("valid regex");
    static ref WORD_TO: Regex = Regex::new(r"\bto\b").expect("valid regex");
    static ref MULTI_SPACE: Regex = Regex::new(r"\s{2,}").expect("valid regex");
}

/// Filters a raw line and produces its normalized form.
///
/// Noise keywords are matched case-insensitively as substrings of the trimmed
/// line. Keywords are expected in lower case.
pub fn normalize_line(raw: &str, noise_keywords: &[String]) -> Result<NormalizedLine, SkipReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SkipReason::Blank);
    }
    if trimmed.split_whitespace().count() < 2 {
        return Err(SkipReason::TooFewTokens);
    }

    if !noise_keywords.is_empty() {
        let lowered = trimmed.to_lowercase();
        if let Some(keyword) = noise_keywords.iter().find(|k| lowered.contains(k.as_str())) {
            return Err(SkipReason::NoiseKeyword(keyword.clone()));
        }
    }

    Ok(NormalizedLine::new(clean_punctuation(trimmed)))
}

/// Dash, `to` and colon substitutions followed by whitespace collapsing
pub fn clean_punctuation(line: &str) -> String {
    let dashed = line.replace(['—', '–'], "-");
    let ranged = DIGIT_TO_DIGIT.replace_all(&dashed, "$1-$2");
    let worded = WORD_TO.replace_all(&ranged, "-");
    let coloned = worded.replace(':', "-");
    MULTI_SPACE.replace_all(&coloned, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_blank_and_single_token_lines_are_skipped() {
        assert_eq!(normalize_line("   ", &[]), Err(SkipReason::Blank));
        assert_eq!(normalize_line("", &[]), Err(SkipReason::Blank));
        assert_eq!(normalize_line("  Haemogram  ", &[]), Err(SkipReason::TooFewTokens));
    }

    #[test]
    fn test_noise_keyword_is_case_insensitive() {
        let noise = keywords(&["pin", "page"]);
        assert_eq!(
            normalize_line("PIN CODE 560001", &noise),
            Err(SkipReason::NoiseKeyword("pin".to_string()))
        );
        assert_eq!(
            normalize_line("Page 1 of 3", &noise),
            Err(SkipReason::NoiseKeyword("page".to_string()))
        );
        assert!(normalize_line("Hemoglobin 13.5", &noise).is_ok());
    }

    #[test]
    fn test_empty_keyword_set_keeps_everything() {
        let line = normalize_line("PIN CODE 560001", &[]).unwrap();
        assert_eq!(line.as_str(), "PIN CODE 560001");
    }

    #[test]
    fn test_dashes_are_unified() {
        assert_eq!(clean_punctuation("WBC 8.2 4.0–11.0"), "WBC 8.2 4.0-11.0");
        assert_eq!(clean_punctuation("WBC 8.2 4.0—11.0"), "WBC 8.2 4.0-11.0");
    }

    #[test]
    fn test_to_between_numbers_becomes_dash() {
        assert_eq!(clean_punctuation("Glucose 98 70 to 110"), "Glucose 98 70 - 110");
        assert_eq!(clean_punctuation("Glucose 98 70to110"), "Glucose 98 70-110");
    }

    #[test]
    fn test_to_inside_words_is_kept() {
        assert_eq!(
            clean_punctuation("Total Protein 7.1 6.0 to 8.3"),
            "Total Protein 7.1 6.0 - 8.3"
        );
        assert_eq!(clean_punctuation("Prothrombin 13 11-14"), "Prothrombin 13 11-14");
    }

    #[test]
    fn test_colon_and_spacing() {
        assert_eq!(
            clean_punctuation("Hemoglobin:   13.5\t\tg/dL"),
            "Hemoglobin- 13.5 g/dL"
        );
    }
}
