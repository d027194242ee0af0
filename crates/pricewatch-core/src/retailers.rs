//! Per-retailer scraping configuration loaded from `config/retailers.yaml`.
//!
//! Each retailer is pure data: an ordered selector list, the parse policy for
//! ambiguous separators, and small post-processing rules. Nothing in here
//! touches HTML; the scraper crate compiles these entries into profiles.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// How a lone `.` in a candidate price is interpreted when no `,` is present.
///
/// Commas follow a fixed rule (a single `,` with exactly two trailing digits
/// is a decimal separator). Dots are ambiguous across locales, so the policy
/// is chosen per retailer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorPolicy {
    /// A single `.` is always decimal (`"1.5"` → 1.5, `"1.234"` → 1.234).
    /// Multiple dots are thousands separators.
    #[default]
    Decimal,
    /// A single `.` is decimal only when exactly two digits follow it;
    /// otherwise it groups thousands (`"1.234"` → 1234).
    TwoDigitDecimal,
}

impl std::fmt::Display for SeparatorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeparatorPolicy::Decimal => write!(f, "decimal"),
            SeparatorPolicy::TwoDigitDecimal => write!(f, "two_digit_decimal"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailerConfig {
    /// Stable identifier stored on product links, e.g. `"mercadolivre"`.
    pub id: String,
    pub name: String,
    /// Alternative identifiers accepted when resolving a retailer.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// ISO 4217 code used when the page carries no recognizable currency.
    pub default_currency: String,
    #[serde(default)]
    pub separator_policy: SeparatorPolicy,
    /// CSS selectors, most reliable first.
    pub selectors: Vec<String>,
    /// Regex patterns removed from candidate text before price parsing.
    #[serde(default)]
    pub strip: Vec<String>,
    /// Lowercase phrases that mark a product page as unavailable, in addition
    /// to the generic list.
    #[serde(default)]
    pub unavailable_phrases: Vec<String>,
}

impl RetailerConfig {
    /// Returns `true` if `key` names this retailer by id or alias, ignoring case.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        self.id.eq_ignore_ascii_case(key)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(key))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetailersFile {
    pub retailers: Vec<RetailerConfig>,
}

impl RetailersFile {
    /// Resolves a retailer by id or alias, case-insensitively.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&RetailerConfig> {
        self.retailers.iter().find(|r| r.matches(key))
    }

    /// Every id and alias this file accepts, in file order.
    #[must_use]
    pub fn known_keys(&self) -> Vec<&str> {
        self.retailers
            .iter()
            .flat_map(|r| {
                std::iter::once(r.id.as_str()).chain(r.aliases.iter().map(String::as_str))
            })
            .collect()
    }
}

/// Load and validate the retailers configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_retailers(path: &Path) -> Result<RetailersFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RetailersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_retailers(&content)
}

/// Parse and validate retailers configuration from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text cannot be parsed or fails validation.
pub fn parse_retailers(content: &str) -> Result<RetailersFile, ConfigError> {
    let retailers_file: RetailersFile =
        serde_yaml::from_str(content).map_err(ConfigError::RetailersFileParse)?;

    validate_retailers(&retailers_file)?;

    Ok(retailers_file)
}

fn validate_retailers(retailers_file: &RetailersFile) -> Result<(), ConfigError> {
    let mut seen_keys = HashSet::new();

    for retailer in &retailers_file.retailers {
        if !is_valid_id(&retailer.id) {
            return Err(ConfigError::Validation(format!(
                "retailer id '{}' must be non-empty and use only a-z, 0-9, '_' or '-'",
                retailer.id
            )));
        }

        if retailer.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "retailer '{}' must have a non-empty name",
                retailer.id
            )));
        }

        let currency = &retailer.default_currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Validation(format!(
                "retailer '{}' has invalid default_currency '{currency}'; expected a 3-letter ISO code",
                retailer.id
            )));
        }

        if retailer.selectors.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "retailer '{}' has no price selectors",
                retailer.id
            )));
        }

        let keys = std::iter::once(&retailer.id).chain(retailer.aliases.iter());
        for key in keys {
            if !seen_keys.insert(key.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate retailer id or alias: '{key}' (from retailer '{}')",
                    retailer.id
                )));
            }
        }
    }

    Ok(())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
#[path = "retailers_test.rs"]
mod tests;
