//! Operator symbol selection.

use crate::error::{CoreError, Result};
use serde::Serialize;

/// Non-empty ordered set of selected symbols.
///
/// The first symbol is the primary one and drives single-symbol widgets
/// (order ticket, microstructure panel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionSet {
    symbols: Vec<String>,
}

impl SubscriptionSet {
    /// Build from user input. Symbols are trimmed and upper-cased; duplicates
    /// keep their first position.
    pub fn new<I, S>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for raw in symbols {
            let symbol = normalize_symbol(raw.as_ref())?;
            if !normalized.contains(&symbol) {
                normalized.push(symbol);
            }
        }
        if normalized.is_empty() {
            return Err(CoreError::EmptySelection);
        }
        Ok(Self {
            symbols: normalized,
        })
    }

    /// Parse a comma separated list (`"btc, eth"`).
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(list.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn primary(&self) -> &str {
        // Non-empty by construction.
        &self.symbols[0]
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in `self` that are not in `previous`, and vice versa.
    pub fn diff(&self, previous: &SubscriptionSet) -> (Vec<String>, Vec<String>) {
        let added = self
            .symbols
            .iter()
            .filter(|s| !previous.contains(s))
            .cloned()
            .collect();
        let removed = previous
            .symbols
            .iter()
            .filter(|s| !self.contains(s))
            .cloned()
            .collect();
        (added, removed)
    }
}

fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_'));
    if valid {
        Ok(symbol)
    } else {
        Err(CoreError::InvalidSymbol(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_is_first_selection() {
        let set = SubscriptionSet::new(["eth", "BTC", "eth"]).unwrap();
        assert_eq!(set.primary(), "ETH");
        assert_eq!(set.symbols(), &["ETH".to_string(), "BTC".to_string()]);
    }

    #[test]
    fn test_empty_selection_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            SubscriptionSet::new(empty),
            Err(CoreError::EmptySelection)
        ));
        assert!(matches!(
            SubscriptionSet::parse(" , "),
            Err(CoreError::EmptySelection)
        ));
    }

    #[test]
    fn test_invalid_symbol_rejected() {
        assert!(SubscriptionSet::new(["BTC", "ET H"]).is_err());
    }

    #[test]
    fn test_diff() {
        let old = SubscriptionSet::parse("BTC,ETH").unwrap();
        let new = SubscriptionSet::parse("ETH,SOL").unwrap();
        let (added, removed) = new.diff(&old);
        assert_eq!(added, vec!["SOL".to_string()]);
        assert_eq!(removed, vec!["BTC".to_string()]);
    }
}
