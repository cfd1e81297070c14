use tally_expr::{is_candidate, validate, ValidationError};

#[test]
fn plain_numbers_and_arithmetic_evaluate() {
    assert_eq!(validate("42"), Ok(42));
    assert_eq!(validate(" 6 "), Ok(6));
    assert_eq!(validate("2*3+1"), Ok(7));
    assert_eq!(validate("(10 - 1) / 3"), Ok(3));
    assert_eq!(validate("2**10"), Ok(1024));
}

#[test]
fn fractional_results_round_half_to_even() {
    assert_eq!(validate("5/2"), Ok(2));
    assert_eq!(validate("7/2"), Ok(4));
    assert_eq!(validate("10/3"), Ok(3));
    assert_eq!(validate("2.6"), Ok(3));
}

#[test]
fn foreign_characters_or_no_digit_are_not_moves() {
    assert_eq!(validate("hello"), Err(ValidationError::NotANumberExpression));
    assert_eq!(validate("5!"), Err(ValidationError::NotANumberExpression));
    assert_eq!(validate("()"), Err(ValidationError::NotANumberExpression));
    assert_eq!(validate(""), Err(ValidationError::NotANumberExpression));
    assert_eq!(validate("   "), Err(ValidationError::NotANumberExpression));
    assert!(!is_candidate("1e5"));
    assert!(is_candidate("1+1"));
}

#[test]
fn malformed_expressions_are_syntax_errors() {
    for text in ["1 +", "(2", "2)", "1..2", "*3", "007", "1 2", "3 * * 4"] {
        assert!(
            matches!(validate(text), Err(ValidationError::Syntax { .. })),
            "expected syntax error for {text:?}"
        );
    }
    assert_eq!(validate("00"), Ok(0));
}

#[test]
fn division_by_zero_is_classified() {
    assert_eq!(validate("10/0"), Err(ValidationError::DivisionByZero));
    assert_eq!(validate("1//(2-2)"), Err(ValidationError::DivisionByZero));
    assert_eq!(validate("0**-1"), Err(ValidationError::DivisionByZero));
}

#[test]
fn syntax_is_reported_before_division_by_zero() {
    assert!(matches!(
        validate("1/0 +"),
        Err(ValidationError::Syntax { .. })
    ));
}

#[test]
fn huge_results_are_out_of_range() {
    assert_eq!(validate("9**9**9"), Err(ValidationError::OutOfRange));
    assert_eq!(validate("10**19"), Err(ValidationError::OutOfRange));
}
