use std::{cmp::Ordering, collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

/// Kind of security a [`Symbol`] refers to.
///
/// Declaration order is significant: it is the tie-breaker when symbols are sorted.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    EnumString,
    EnumIter,
)]
pub enum SecurityType {
    #[default]
    Base,
    Equity,
    Option,
    Commodity,
    Forex,
    Future,
    Cfd,
    Crypto,
    FutureOption,
    Index,
    IndexOption,
}

/// Identity of a symbol within a market.
///
/// Name and market are compared case-insensitively, so `"AAPL"` on `"USA"` and `"aapl"` on
/// `"usa"` are the same symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolKey {
    name: String,
    market: String,
    security: SecurityType,
}

impl SymbolKey {
    pub fn new(name: &str, market: &str, security: SecurityType) -> Self {
        Self {
            name: name.to_lowercase(),
            market: market.to_lowercase(),
            security,
        }
    }

    /// Returns the lowercased symbol name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lowercased market name.
    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn security(&self) -> SecurityType {
        self.security
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.security, self.market, self.name)
    }
}

/// A tradable symbol acquired for a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    id: Option<String>,
    active: bool,
    name: String,
    market: String,
    security: SecurityType,
    properties: BTreeMap<String, String>,
}

impl Default for Symbol {
    fn default() -> Self {
        Self {
            id: None,
            active: true,
            name: "symbol".to_string(),
            market: String::new(),
            security: SecurityType::Base,
            properties: BTreeMap::new(),
        }
    }
}

impl Symbol {
    /// Creates a new active symbol.
    pub fn new(name: impl Into<String>, market: impl Into<String>, security: SecurityType) -> Self {
        Self {
            name: name.into(),
            market: market.into(),
            security,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns `true` if data should be acquired for this symbol.
    pub fn active(&self) -> bool {
        self.active
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn security(&self) -> SecurityType {
        self.security
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Returns the identity used for uniqueness checks and sorting.
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(&self.name, &self.market, self.security)
    }

    /// Orders symbols by name, then market (both case-insensitive), then security kind.
    pub fn cmp_by_key(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }

    pub(crate) fn same_key(&self, key: &SymbolKey) -> bool {
        self.security == key.security
            && self.name.to_lowercase() == key.name
            && self.market.to_lowercase() == key.market
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.security, self.market, self.name)
    }
}
