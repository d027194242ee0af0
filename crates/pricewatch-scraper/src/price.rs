//! Price text normalization.
//!
//! Turns the text of a matched element (`"R$ 1.234,56"`, `"$19.99 / each"`,
//! `"12,99 €"`) into a [`Decimal`] in major currency units. Currency is never
//! read from the text; callers attach it from page context.

use std::str::FromStr;

use pricewatch_core::SeparatorPolicy;
use rust_decimal::Decimal;

use crate::error::PriceParseError;

/// Knobs for [`parse_price_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub separator_policy: SeparatorPolicy,
}

impl ParseOptions {
    #[must_use]
    pub fn with_policy(separator_policy: SeparatorPolicy) -> Self {
        Self { separator_policy }
    }
}

/// Parses candidate price text with the default [`SeparatorPolicy::Decimal`].
///
/// # Errors
///
/// - [`PriceParseError::NoDigitsFound`] when the text has no digits at all
///   (`""`, `"Free"`, `"Esgotado"`).
/// - [`PriceParseError::MalformedNumber`] when the canonical form cannot be
///   represented as a `Decimal`.
pub fn parse_price(text: &str) -> Result<Decimal, PriceParseError> {
    parse_price_with(text, ParseOptions::default())
}

/// Parses candidate price text.
///
/// Only the first numeric token is considered, so `"$10 - $20"` yields 10 and
/// `"R$ 99,90 Economize 20%"` yields 99.90. Within that token:
///
/// - both `.` and `,` present: the last one is the decimal separator, every
///   earlier separator groups thousands;
/// - only `,`: decimal when it occurs once with exactly two digits after it,
///   thousands otherwise;
/// - only `.`: thousands when it occurs more than once, otherwise decided by
///   `options.separator_policy`;
/// - neither: the digits are the integer value.
///
/// # Errors
///
/// See [`parse_price`].
pub fn parse_price_with(text: &str, options: ParseOptions) -> Result<Decimal, PriceParseError> {
    let token = numeric_token(text).ok_or(PriceParseError::NoDigitsFound)?;
    let canonical = canonicalize(&token, options.separator_policy);

    let value = Decimal::from_str(&canonical).map_err(|_| PriceParseError::MalformedNumber {
        canonical: canonical.clone(),
    })?;

    // Cleaning never keeps a sign, so this only guards the invariant.
    if value.is_sign_negative() && !value.is_zero() {
        return Err(PriceParseError::Negative { canonical });
    }

    Ok(value)
}

/// Extracts the first run of digits and the separators between them.
///
/// A `.` or `,` is kept only when a digit follows it, so trailing punctuation
/// (`"19.99."`) ends the token. A separator immediately before the first
/// digit is kept (`"$.99"`). Spaces between digit groups (`"1 234,56"`,
/// including no-break and thin spaces) are dropped when exactly three digits
/// follow them.
///
/// Returns `None` when the text contains no ASCII digit.
fn numeric_token(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let first_digit = chars.iter().position(char::is_ascii_digit)?;

    let mut token = String::with_capacity(chars.len() - first_digit + 1);
    if first_digit > 0 && is_separator(chars[first_digit - 1]) {
        token.push(chars[first_digit - 1]);
    }

    let mut i = first_digit;
    while i < chars.len() {
        let c = chars[i];
        let next_is_digit = chars.get(i + 1).is_some_and(char::is_ascii_digit);

        let group_space =
            is_group_space(c) && chars[i - 1].is_ascii_digit() && is_digit_group(&chars, i + 1);

        if c.is_ascii_digit() || (is_separator(c) && next_is_digit) {
            token.push(c);
        } else if !group_space {
            break;
        }
        i += 1;
    }

    Some(token)
}

/// `true` when `chars[start..]` begins with exactly three digits.
fn is_digit_group(chars: &[char], start: usize) -> bool {
    let group_ok = (start..start + 3).all(|j| chars.get(j).is_some_and(char::is_ascii_digit));
    group_ok && !chars.get(start + 3).is_some_and(char::is_ascii_digit)
}

fn is_separator(c: char) -> bool {
    c == '.' || c == ','
}

fn is_group_space(c: char) -> bool {
    matches!(c, ' ' | '\u{00A0}' | '\u{2009}' | '\u{202F}')
}

/// Rewrites a token of digits, `.` and `,` into a plain `1234.56` form.
fn canonicalize(token: &str, policy: SeparatorPolicy) -> String {
    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');

    let decimal_at = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => Some(dot.max(comma)),
        (None, Some(comma)) => {
            let single = token.matches(',').count() == 1;
            (single && trailing_digits(token, comma) == 2).then_some(comma)
        }
        (Some(dot), None) => {
            let single = token.matches('.').count() == 1;
            let decimal = match policy {
                SeparatorPolicy::Decimal => single,
                SeparatorPolicy::TwoDigitDecimal => single && trailing_digits(token, dot) == 2,
            };
            decimal.then_some(dot)
        }
        (None, None) => None,
    };

    let mut canonical = String::with_capacity(token.len() + 1);
    for (idx, c) in token.char_indices() {
        if Some(idx) == decimal_at {
            if canonical.is_empty() {
                canonical.push('0');
            }
            canonical.push('.');
        } else if c.is_ascii_digit() {
            canonical.push(c);
        }
    }
    canonical
}

/// Number of characters after byte offset `sep`. Tokens are ASCII.
fn trailing_digits(token: &str, sep: usize) -> usize {
    token.len() - sep - 1
}

#[cfg(test)]
#[path = "price_test.rs"]
mod tests;
