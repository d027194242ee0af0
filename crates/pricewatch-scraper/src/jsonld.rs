//! schema.org JSON-LD offer lookup.
//!
//! Product pages often embed `<script type="application/ld+json">` with a
//! `Product` whose `offers` carry a machine-formatted price. This module pulls
//! the first such price out as text so it can go through the same parser as
//! visible prices.

use serde_json::{Map, Value};

/// Nesting depth beyond which the walk gives up.
const MAX_DEPTH: usize = 8;

/// Returns the first offer price found in a JSON-LD document, as text.
///
/// Accepts a top-level object, an array, or an `@graph` container. Within an
/// offer, `price` wins over `lowPrice`, which wins over
/// `priceSpecification.price`. Returns `None` for invalid JSON or documents
/// without offers.
pub(crate) fn find_offer_price(json_text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(json_text.trim()).ok()?;
    walk(&value, false, 0)
}

fn walk(value: &Value, in_offers: bool, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }

    match value {
        Value::Array(items) => items.iter().find_map(|v| walk(v, in_offers, depth + 1)),
        Value::Object(map) => {
            if in_offers || is_offer(map) {
                if let Some(price) = offer_price(map) {
                    return Some(price);
                }
            }

            if let Some(price) = map
                .get("offers")
                .and_then(|offers| walk(offers, true, depth + 1))
            {
                return Some(price);
            }

            map.get("@graph")
                .and_then(|graph| walk(graph, false, depth + 1))
        }
        _ => None,
    }
}

/// `@type` may be a plain string or an array of strings.
fn is_offer(map: &Map<String, Value>) -> bool {
    let is_offer_type = |t: &str| t == "Offer" || t == "AggregateOffer";
    match map.get("@type") {
        Some(Value::String(t)) => is_offer_type(t),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(is_offer_type),
        _ => false,
    }
}

fn offer_price(map: &Map<String, Value>) -> Option<String> {
    ["price", "lowPrice"]
        .iter()
        .find_map(|key| map.get(*key).and_then(scalar_text))
        .or_else(|| {
            let spec = map.get("priceSpecification")?;
            let spec = match spec {
                Value::Array(items) => items.first()?,
                other => other,
            };
            spec.get("price").and_then(scalar_text)
        })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
