//! Evaluation of `If` conditions.
//!
//! A condition is `true`, `false`, or `left OP right` where `OP` is one of
//! `==`, `!=`, `<`, `<=`, `>`, `>=`, `contains` or `!contains`. Property
//! references are expanded before evaluation, so operands are plain text.
//! Both operands are compared as numbers when both parse as numbers, unless
//! string comparison is requested.

use std::cmp::Ordering;

use crate::parameter::parse_bool;

/// Operators, longest first so `<=` is not read as `<`.
const OPERATORS: [&str; 8] = ["!contains", "contains", "<=", ">=", "==", "!=", "<", ">"];

/// Evaluate an expanded condition.
///
/// # Errors
///
/// Returns a description of the problem if the condition has no operator,
/// has an empty operand, or applies an ordering operator to values that
/// cannot be ordered.
pub fn evaluate_condition(
    expression: &str,
    compare_as_strings: bool,
) -> std::result::Result<bool, String> {
    let expression = expression.trim();

    if let Some(value) = parse_bool(expression) {
        return Ok(value);
    }

    let Some((operator, position)) = find_operator(expression) else {
        return Err(format!(
            "Condition `{expression}` has no comparison operator"
        ));
    };

    let left = expression[..position].trim();
    let right = expression[position + operator.len()..].trim();

    if left.is_empty() || right.is_empty() {
        return Err(format!("Condition `{expression}` is missing an operand"));
    }

    match operator {
        "contains" => return Ok(left.contains(right)),
        "!contains" => return Ok(!left.contains(right)),
        _ => {}
    }

    let ordering = compare(left, right, compare_as_strings);

    Ok(match operator {
        "==" => ordering == Some(Ordering::Equal),
        "!=" => ordering != Some(Ordering::Equal),
        _ => {
            let Some(ordering) = ordering else {
                return Err(format!(
                    "Values in condition `{expression}` cannot be ordered"
                ));
            };
            match operator {
                "<" => ordering == Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                ">" => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }
        }
    })
}

fn find_operator(expression: &str) -> Option<(&'static str, usize)> {
    OPERATORS
        .iter()
        .filter_map(|operator| expression.find(operator).map(|position| (*operator, position)))
        .min_by_key(|(operator, position)| (*position, std::cmp::Reverse(operator.len())))
}

fn compare(left: &str, right: &str, compare_as_strings: bool) -> Option<Ordering> {
    if !compare_as_strings {
        if let (Ok(l), Ok(r)) = (left.parse::<f64>(), right.parse::<f64>()) {
            return l.partial_cmp(&r);
        }
    }
    Some(left.cmp(right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(evaluate_condition("true", false), Ok(true));
        assert_eq!(evaluate_condition(" False ", false), Ok(false));
    }

    #[test]
    fn test_numeric_comparisons() {
        assert_eq!(evaluate_condition("10 > 9", false), Ok(true));
        assert_eq!(evaluate_condition("2.0 == 2", false), Ok(true));
        assert_eq!(evaluate_condition("3 <= 3", false), Ok(true));
        assert_eq!(evaluate_condition("3 >= 4", false), Ok(false));
        assert_eq!(evaluate_condition("1 != 1", false), Ok(false));
    }

    #[test]
    fn test_string_comparisons() {
        assert_eq!(evaluate_condition("10 > 9", true), Ok(false));
        assert_eq!(evaluate_condition("abc == abc", false), Ok(true));
        assert_eq!(evaluate_condition("abc < abd", false), Ok(true));
    }

    #[test]
    fn test_contains() {
        assert_eq!(evaluate_condition("layer_one contains one", false), Ok(true));
        assert_eq!(evaluate_condition("layer_one !contains one", false), Ok(false));
    }

    #[test]
    fn test_invalid_conditions() {
        assert!(evaluate_condition("maybe", false).is_err());
        assert!(evaluate_condition("== 3", false).is_err());
        assert!(evaluate_condition("1 <", false).is_err());
    }
}
