//! Page-level signals that accompany an extracted price: currency and
//! availability. Both are cheap substring scans over the raw HTML.

/// Bytes of the page inspected by [`detect_currency`].
const CURRENCY_SAMPLE_BYTES: usize = 5000;

/// Checked in order; the first one present wins.
const CURRENCY_CODES: [&str; 7] = ["BRL", "USD", "EUR", "GBP", "JPY", "CAD", "AUD"];

/// Multi-character symbols come before `$` so `R$` is not read as USD.
const CURRENCY_SYMBOLS: [(&str, &str); 7] = [
    ("R$", "BRL"),
    ("C$", "CAD"),
    ("A$", "AUD"),
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
];

/// Lowercase phrases that mark a page as not purchasable on any retailer.
const UNAVAILABLE_PHRASES: [&str; 17] = [
    "out of stock",
    "currently unavailable",
    "not available",
    "sold out",
    "no longer available",
    "discontinued",
    "indisponível",
    "esgotado",
    "fora de estoque",
    "produto indisponível",
    "sem estoque",
    "temporariamente indisponível",
    "não disponível",
    "produto esgotado",
    "estoque esgotado",
    "fora de linha",
    "descontinuado",
];

/// Detects the page currency from the head of the document.
///
/// Looks for an explicit ISO 4217 code first, then a currency symbol, and
/// falls back to `default` when neither appears.
#[must_use]
pub fn detect_currency(html: &str, default: &str) -> String {
    let sample = head(html, CURRENCY_SAMPLE_BYTES);

    CURRENCY_CODES
        .iter()
        .find(|code| sample.contains(*code))
        .copied()
        .or_else(|| {
            CURRENCY_SYMBOLS
                .iter()
                .find(|(symbol, _)| sample.contains(symbol))
                .map(|(_, code)| *code)
        })
        .unwrap_or(default)
        .to_owned()
}

/// Returns `false` when the page contains a generic or retailer-specific
/// unavailability phrase.
///
/// `extra_phrases` are matched case-insensitively like the built-in list.
#[must_use]
pub fn is_available<S: AsRef<str>>(html: &str, extra_phrases: &[S]) -> bool {
    let page = html.to_lowercase();

    let generic = UNAVAILABLE_PHRASES.iter().any(|p| page.contains(p));
    let specific = extra_phrases
        .iter()
        .map(|p| p.as_ref().trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .any(|p| page.contains(&p));

    !(generic || specific)
}

/// The longest prefix of `s` that fits in `max_bytes` and ends on a char
/// boundary.
fn head(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
