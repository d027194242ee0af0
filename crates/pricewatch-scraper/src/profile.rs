//! Compiled per-retailer extraction profiles.
//!
//! A [`RetailerProfile`] is built once from a [`RetailerConfig`] and reused
//! for every page of that retailer: selectors and strip patterns are
//! compiled up front, so scraping a page does no parsing of configuration.

use pricewatch_core::{RetailerConfig, RetailersFile};
use regex::Regex;

use crate::error::ScraperError;
use crate::extract::{extract_with, CandidateRules, ExtractionOutcome, SelectorList};
use crate::price::ParseOptions;
use crate::signals;

#[derive(Debug, Clone)]
pub struct RetailerProfile {
    id: String,
    name: String,
    default_currency: String,
    selectors: SelectorList,
    rules: CandidateRules,
    unavailable_phrases: Vec<String>,
}

impl RetailerProfile {
    /// Compiles a retailer's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidRule`] if a `strip` entry is not a valid
    /// regular expression.
    pub fn from_config(config: &RetailerConfig) -> Result<Self, ScraperError> {
        let strip = config
            .strip
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ScraperError::InvalidRule {
                    retailer: config.id.clone(),
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            default_currency: config.default_currency.clone(),
            selectors: SelectorList::parse(&config.selectors),
            rules: CandidateRules {
                parse: ParseOptions::with_policy(config.separator_policy),
                strip,
            },
            unavailable_phrases: config
                .unavailable_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }

    #[must_use]
    pub fn selectors(&self) -> &SelectorList {
        &self.selectors
    }

    /// Runs the extraction orchestrator with this retailer's selectors and
    /// candidate rules.
    #[must_use]
    pub fn extract(&self, html: &str) -> ExtractionOutcome {
        extract_with(html, &self.selectors, &self.rules)
    }

    /// Page currency, falling back to the retailer default.
    #[must_use]
    pub fn currency(&self, html: &str) -> String {
        signals::detect_currency(html, &self.default_currency)
    }

    #[must_use]
    pub fn is_available(&self, html: &str) -> bool {
        signals::is_available(html, self.unavailable_phrases.as_slice())
    }
}

/// All configured retailers, compiled.
///
/// Key resolution goes through [`RetailersFile::find`], so ids and aliases
/// mean the same thing here as in the configuration file.
#[derive(Debug, Clone)]
pub struct RetailerProfiles {
    file: RetailersFile,
    profiles: Vec<RetailerProfile>,
}

impl RetailerProfiles {
    /// Compiles every retailer in the file.
    ///
    /// # Errors
    ///
    /// Returns the first [`ScraperError::InvalidRule`] encountered.
    pub fn from_file(file: &RetailersFile) -> Result<Self, ScraperError> {
        let profiles = file
            .retailers
            .iter()
            .map(RetailerProfile::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = profiles.len(), "compiled retailer profiles");
        Ok(Self {
            file: file.clone(),
            profiles,
        })
    }

    /// Resolves a retailer by id or alias, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownRetailer`] listing every accepted key.
    pub fn get(&self, key: &str) -> Result<&RetailerProfile, ScraperError> {
        self.file
            .find(key)
            .and_then(|config| self.profiles.iter().find(|p| p.id == config.id))
            .ok_or_else(|| ScraperError::UnknownRetailer {
                retailer: key.to_owned(),
                supported: self.supported().join(", "),
            })
    }

    /// Every accepted id and alias, in file order.
    #[must_use]
    pub fn supported(&self) -> Vec<&str> {
        self.file.known_keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetailerProfile> {
        self.profiles.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pricewatch_core::parse_retailers;
    use rust_decimal::Decimal;

    use super::*;

    const YAML: &str = r#"
retailers:
  - id: mercadolivre
    name: Mercado Livre
    aliases: [mercado_livre]
    default_currency: BRL
    separator_policy: two_digit_decimal
    selectors:
      - "span.andes-money-amount__fraction"
      - 'meta[itemprop="price"]'
    unavailable_phrases: [anúncio pausado]
  - id: generic
    name: Generic
    default_currency: USD
    selectors: [".price"]
    strip: ['(?i)\s*/\s*each\s*$']
"#;

    fn profiles() -> RetailerProfiles {
        RetailerProfiles::from_file(&parse_retailers(YAML).unwrap()).unwrap()
    }

    #[test]
    fn resolves_ids_and_aliases_case_insensitively() {
        let profiles = profiles();
        assert_eq!(profiles.get("mercadolivre").unwrap().id(), "mercadolivre");
        assert_eq!(profiles.get("Mercado_Livre").unwrap().id(), "mercadolivre");
        assert_eq!(profiles.get(" GENERIC ").unwrap().id(), "generic");
        assert_eq!(profiles.len(), 2);
    }

    #[test]
    fn resolution_agrees_with_the_retailers_file() {
        let file = parse_retailers(YAML).unwrap();
        let profiles = RetailerProfiles::from_file(&file).unwrap();

        assert_eq!(profiles.supported(), file.known_keys());
        for key in ["MERCADO_LIVRE", "generic", "magalu"] {
            assert_eq!(
                profiles.get(key).ok().map(RetailerProfile::id),
                file.find(key).map(|c| c.id.as_str()),
                "key {key}"
            );
        }
    }

    #[test]
    fn unknown_retailer_lists_supported_keys() {
        let err = profiles().get("magalu").unwrap_err();
        match err {
            ScraperError::UnknownRetailer { retailer, supported } => {
                assert_eq!(retailer, "magalu");
                assert_eq!(supported, "mercadolivre, mercado_livre, generic");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_strip_pattern_is_rejected() {
        let yaml = r#"
retailers:
  - id: broken
    name: Broken
    default_currency: USD
    selectors: [".price"]
    strip: ["(unclosed"]
"#;
        let err = RetailerProfiles::from_file(&parse_retailers(yaml).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ScraperError::InvalidRule { ref retailer, .. } if retailer == "broken"
        ));
    }

    #[test]
    fn profile_applies_separator_policy() {
        let profiles = profiles();
        let ml = profiles.get("mercadolivre").unwrap();
        let html = r#"<span class="andes-money-amount__fraction">2.499</span>"#;
        assert_eq!(ml.extract(html).price(), Some(Decimal::from(2499)));
    }

    #[test]
    fn profile_applies_strip_rules() {
        let profiles = profiles();
        let generic = profiles.get("generic").unwrap();
        let html = r#"<span class="price">$4.99 / each</span>"#;
        assert_eq!(
            generic.extract(html).price(),
            Some(Decimal::from_str("4.99").unwrap())
        );
    }

    #[test]
    fn shipped_amazon_profile_skips_installment_prefix() {
        let file = parse_retailers(include_str!("../../../config/retailers.yaml")).unwrap();
        let profiles = RetailerProfiles::from_file(&file).unwrap();
        let amazon = profiles.get("amazon_br").unwrap();

        let offscreen = |text: &str| {
            format!(r#"<span class="a-price"><span class="a-offscreen">{text}</span></span>"#)
        };

        assert_eq!(
            amazon.extract(&offscreen("10x de R$ 129,90")).price(),
            Some(Decimal::from_str("129.90").unwrap())
        );
        assert_eq!(
            amazon.extract(&offscreen("R$ 1.299,00")).price(),
            Some(Decimal::from(1299))
        );
    }

    #[test]
    fn profile_signals_use_retailer_defaults() {
        let profiles = profiles();
        let ml = profiles.get("mercadolivre").unwrap();
        assert_eq!(ml.currency("<p>sem preço</p>"), "BRL");
        assert!(!ml.is_available("<div>Anúncio pausado pelo vendedor</div>"));
        assert!(ml.is_available("<div>Comprar agora</div>"));
    }
}
