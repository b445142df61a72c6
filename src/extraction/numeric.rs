//! Numeric tokens, reference ranges and the choice of test value.

use lazy_static::lazy_static;
use regex::Regex;

use super::types::{LineError, NormalizedLine, NumericToken, RangeMatch, ReferenceRange};

// ASCII digits only: every match must parse as f64.
const NUMBER: &str = r"[0-9]+\.?[0-9]*";

lazy_static! {
    static ref NUMBER_REGEX: Regex = Regex::new(NUMBER).expect("valid regex");
    pub(crate) static ref RANGE_REGEX: Regex =
        Regex::new(&format!(r"({NUMBER})\s*[-–to]+\s*({NUMBER})")).expect("valid regex");
}

// Overlong literals saturate to infinity and still form a range.
fn parse_bound(literal: &str) -> Result<f64, LineError> {
    literal
        .parse::<f64>()
        .map_err(|_| LineError::InvalidRangeBound(literal.to_string()))
}

/// Leftmost `<number> <separator> <number>` in the line, if any
pub fn find_reference_range(line: &NormalizedLine) -> Result<Option<RangeMatch>, LineError> {
    let Some(caps) = RANGE_REGEX.captures(line.as_str()) else {
        return Ok(None);
    };
    let low_literal = caps[1].to_string();
    let high_literal = caps[2].to_string();

    let range = ReferenceRange {
        low: parse_bound(&low_literal)?,
        high: parse_bound(&high_literal)?,
    };

    Ok(Some(RangeMatch {
        range,
        low_literal,
        high_literal,
    }))
}

/// Every maximal numeric run, in line order, range bounds included
pub fn find_numeric_tokens(line: &NormalizedLine) -> Vec<NumericToken> {
    NUMBER_REGEX
        .find_iter(line.as_str())
        .filter_map(|m| {
            let literal = m.as_str();
            literal.parse::<f64>().ok().map(|value| NumericToken {
                literal: literal.to_string(),
                value,
            })
        })
        .collect()
}

/// Pick the token that holds the measured value.
///
/// With a range the first token whose literal differs from both bound literals
/// wins, falling back to the first token. Without a range the line must carry
/// exactly one number.
pub fn choose_test_value<'a>(
    tokens: &'a [NumericToken],
    range: Option<&RangeMatch>,
) -> Option<&'a NumericToken> {
    match range {
        Some(range) => tokens
            .iter()
            .find(|t| !range.is_bound_literal(&t.literal))
            .or_else(|| tokens.first()),
        None if tokens.len() == 1 => tokens.first(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> NormalizedLine {
        NormalizedLine::new(text.to_string())
    }

    #[test]
    fn test_range_found_with_spaces() {
        let found = find_reference_range(&line("WBC Count 18.2 4.0 - 11.0"))
            .unwrap()
            .unwrap();
        assert_eq!(found.range, ReferenceRange { low: 4.0, high: 11.0 });
        assert_eq!(found.low_literal, "4.0");
        assert_eq!(found.high_literal, "11.0");
    }

    #[test]
    fn test_leftmost_range_wins() {
        let found = find_reference_range(&line("Ratio 1-2 3-4")).unwrap().unwrap();
        assert_eq!(found.low_literal, "1");
        assert_eq!(found.high_literal, "2");
    }

    #[test]
    fn test_no_range() {
        assert!(find_reference_range(&line("Sodium 140 mmol/L")).unwrap().is_none());
    }

    #[test]
    fn test_overflowing_bound_becomes_infinite() {
        let huge = "9".repeat(400);
        let text = format!("Platelets 250 150-{huge}");
        let found = find_reference_range(&line(&text)).unwrap().unwrap();
        assert_eq!(found.range.low, 150.0);
        assert_eq!(found.range.high, f64::INFINITY);
        assert_eq!(found.high_literal, huge);
    }

    #[test]
    fn test_tokens_in_order() {
        let tokens = find_numeric_tokens(&line("Hemoglobin 13.5 12.0-15.0 g/dL"));
        let literals: Vec<&str> = tokens.iter().map(|t| t.literal.as_str()).collect();
        assert_eq!(literals, vec!["13.5", "12.0", "15.0"]);
        assert_eq!(tokens[0].value, 13.5);
    }

    #[test]
    fn test_value_skips_range_literals() {
        let l = line("Glucose 70-110 98");
        let tokens = find_numeric_tokens(&l);
        let range = find_reference_range(&l).unwrap();
        let value = choose_test_value(&tokens, range.as_ref()).unwrap();
        assert_eq!(value.literal, "98");
    }

    #[test]
    fn test_value_equal_to_bound_falls_back_to_first_token() {
        let l = line("Calcium 10 8-10");
        let tokens = find_numeric_tokens(&l);
        let range = find_reference_range(&l).unwrap();
        // range is 8-10, so every token is a bound literal
        let value = choose_test_value(&tokens, range.as_ref()).unwrap();
        assert_eq!(value.literal, "10");
    }

    #[test]
    fn test_without_range_needs_exactly_one_token() {
        let one = find_numeric_tokens(&line("Sodium 140"));
        assert_eq!(choose_test_value(&one, None).unwrap().literal, "140");

        let two = find_numeric_tokens(&line("Sodium 140 145"));
        assert!(choose_test_value(&two, None).is_none());

        let none = find_numeric_tokens(&line("Blood Group"));
        assert!(choose_test_value(&none, None).is_none());
    }
}
