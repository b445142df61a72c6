//! Out-of-range flag.

use super::types::ReferenceRange;

/// `true` only when a range exists, the value parses, and it falls outside `[low, high]`.
///
/// A reversed range (`low > high`) contains nothing, so any parsable value is flagged.
pub fn is_out_of_range(value_literal: &str, range: Option<&ReferenceRange>) -> bool {
    let Some(range) = range else {
        return false;
    };
    match value_literal.parse::<f64>() {
        Ok(value) => !range.contains(value),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WBC: ReferenceRange = ReferenceRange { low: 4.0, high: 11.0 };

    #[test]
    fn test_outside_is_flagged() {
        assert!(is_out_of_range("18.2", Some(&WBC)));
        assert!(is_out_of_range("3.9", Some(&WBC)));
    }

    #[test]
    fn test_bounds_are_in_range() {
        assert!(!is_out_of_range("4.0", Some(&WBC)));
        assert!(!is_out_of_range("11", Some(&WBC)));
        assert!(!is_out_of_range("7.5", Some(&WBC)));
    }

    #[test]
    fn test_missing_range_or_bad_value() {
        assert!(!is_out_of_range("18.2", None));
        assert!(!is_out_of_range("n/a", Some(&WBC)));
    }

    #[test]
    fn test_reversed_range_flags_everything() {
        let reversed = ReferenceRange { low: 11.0, high: 4.0 };
        assert!(is_out_of_range("7.5", Some(&reversed)));
    }
}
