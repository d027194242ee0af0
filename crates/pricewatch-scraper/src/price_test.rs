use super::*;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn two_digit() -> ParseOptions {
    ParseOptions::with_policy(SeparatorPolicy::TwoDigitDecimal)
}

// -----------------------------------------------------------------------
// separator disambiguation
// -----------------------------------------------------------------------

#[test]
fn us_format_with_thousands_and_cents() {
    assert_eq!(parse_price("$1,234.56").unwrap(), dec("1234.56"));
}

#[test]
fn european_format_with_thousands_and_cents() {
    assert_eq!(parse_price("1.234,56").unwrap(), dec("1234.56"));
}

#[test]
fn brazilian_real_with_symbol() {
    assert_eq!(parse_price("R$ 1.234,56").unwrap(), dec("1234.56"));
}

#[test]
fn comma_thousands_without_cents() {
    assert_eq!(parse_price("1,234").unwrap(), dec("1234"));
}

#[test]
fn comma_decimal_with_two_digits() {
    assert_eq!(parse_price("12,99").unwrap(), dec("12.99"));
}

#[test]
fn repeated_comma_is_thousands() {
    assert_eq!(parse_price("1,234,567").unwrap(), dec("1234567"));
}

#[test]
fn comma_with_one_trailing_digit_is_thousands() {
    assert_eq!(parse_price("12,5").unwrap(), dec("125"));
}

#[test]
fn repeated_dot_is_thousands() {
    assert_eq!(parse_price("1.234.567").unwrap(), dec("1234567"));
}

#[test]
fn single_dot_with_two_digits_is_decimal() {
    assert_eq!(parse_price("19.99").unwrap(), dec("19.99"));
}

#[test]
fn single_dot_with_three_digits_is_decimal_by_default() {
    assert_eq!(parse_price("1.234").unwrap(), dec("1.234"));
}

#[test]
fn single_dot_with_one_digit_is_decimal_by_default() {
    assert_eq!(parse_price("4.5").unwrap(), dec("4.5"));
}

#[test]
fn two_digit_policy_reads_single_dot_thousands() {
    assert_eq!(parse_price_with("1.234", two_digit()).unwrap(), dec("1234"));
}

#[test]
fn two_digit_policy_keeps_cents() {
    assert_eq!(parse_price_with("1.99", two_digit()).unwrap(), dec("1.99"));
}

#[test]
fn two_digit_policy_does_not_change_mixed_separators() {
    assert_eq!(
        parse_price_with("1.234,5", two_digit()).unwrap(),
        dec("1234.5")
    );
}

#[test]
fn both_separators_last_one_wins() {
    assert_eq!(parse_price("1.234.567,89").unwrap(), dec("1234567.89"));
    assert_eq!(parse_price("1,234,567.89").unwrap(), dec("1234567.89"));
}

// -----------------------------------------------------------------------
// token isolation
// -----------------------------------------------------------------------

#[test]
fn zero_price_is_valid() {
    assert_eq!(parse_price("$0.00").unwrap(), Decimal::ZERO);
}

#[test]
fn space_grouped_thousands() {
    assert_eq!(parse_price("R$ 1 234,56").unwrap(), dec("1234.56"));
}

#[test]
fn no_break_space_grouped_thousands() {
    assert_eq!(parse_price("1\u{a0}234,56\u{a0}€").unwrap(), dec("1234.56"));
}

#[test]
fn trailing_unit_suffix_is_ignored() {
    assert_eq!(parse_price("$4.99/each").unwrap(), dec("4.99"));
}

#[test]
fn trailing_promotion_text_is_ignored() {
    assert_eq!(parse_price("$19.99 Save 20%").unwrap(), dec("19.99"));
}

#[test]
fn range_takes_lower_bound() {
    assert_eq!(parse_price("$1,234.56 - $2,000.00").unwrap(), dec("1234.56"));
}

#[test]
fn trailing_period_ends_token() {
    assert_eq!(parse_price("Now 15.50.").unwrap(), dec("15.50"));
}

#[test]
fn leading_decimal_point_is_kept() {
    assert_eq!(parse_price("$.99").unwrap(), dec("0.99"));
}

#[test]
fn space_before_non_group_stops_token() {
    assert_eq!(parse_price("2 for 5").unwrap(), dec("2"));
}

#[test]
fn non_ascii_currency_symbols_are_skipped() {
    assert_eq!(parse_price("¥ 12,800").unwrap(), dec("12800"));
    assert_eq!(parse_price("£7.25").unwrap(), dec("7.25"));
}

// -----------------------------------------------------------------------
// failures
// -----------------------------------------------------------------------

#[test]
fn empty_text_has_no_digits() {
    assert_eq!(parse_price(""), Err(PriceParseError::NoDigitsFound));
}

#[test]
fn word_without_digits_has_no_digits() {
    assert_eq!(parse_price("Free"), Err(PriceParseError::NoDigitsFound));
    assert_eq!(parse_price("Esgotado"), Err(PriceParseError::NoDigitsFound));
}

#[test]
fn separators_without_digits_have_no_digits() {
    assert_eq!(parse_price(".,.,"), Err(PriceParseError::NoDigitsFound));
}

#[test]
fn oversized_number_is_malformed() {
    let text = "9".repeat(40);
    assert!(matches!(
        parse_price(&text),
        Err(PriceParseError::MalformedNumber { .. })
    ));
}

#[test]
fn minus_sign_is_not_carried_into_the_value() {
    assert_eq!(parse_price("-5.00").unwrap(), dec("5.00"));
}

// -----------------------------------------------------------------------
// properties
// -----------------------------------------------------------------------

#[test]
fn digit_only_strings_parse_to_their_integer_value() {
    for n in [0u64, 7, 42, 999, 1_000, 123_456, 9_876_543_210, u64::MAX] {
        let text = n.to_string();
        assert_eq!(parse_price(&text).unwrap(), Decimal::from(n), "input {text}");
    }
    assert_eq!(parse_price("007").unwrap(), dec("7"));
}

#[test]
fn reparsing_canonical_form_is_idempotent() {
    let inputs = [
        "$1,234.56",
        "1.234,56",
        "12,99",
        "1,234",
        "$0.00",
        "1.234.567",
        "R$ 1 234,56",
        "4.5",
        "1.234",
        "$.99",
    ];
    for input in inputs {
        let first = parse_price(input).unwrap();
        let second = parse_price(&first.to_string()).unwrap();
        assert_eq!(first, second, "input {input}");
    }
}

#[test]
fn parsed_prices_are_never_negative() {
    for input in ["-1", "−12,99", "(5.00)", "- $3"] {
        let value = parse_price(input).unwrap();
        assert!(value >= Decimal::ZERO, "input {input} gave {value}");
    }
}
