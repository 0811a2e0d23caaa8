use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};
use uuid::Uuid;

pub(crate) mod error;
mod folder;
mod symbol;

#[cfg(test)]
mod tests;

pub use folder::Folder;
pub use symbol::{SecurityType, Symbol, SymbolKey};

use error::{MarketStateError, Result};

/// Data resolution requested from a market's provider.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    #[default]
    Daily,
}

/// Configuration and acquired inventory of a single market.
///
/// `id`, `name` and `provider` identify the market for the lifetime of a session. The remaining
/// fields are either acquisition parameters consumed by the job, or inventory produced by it.
///
/// Symbols are kept in insertion order and are unique by [`SymbolKey`]. All mutators preserve
/// this; [`validate`](Self::validate) re-checks it for states built elsewhere (for example
/// deserialized ones).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    id: Uuid,
    name: String,
    provider: String,
    resolution: Resolution,
    from_date: DateTime<Utc>,
    last_date: Option<DateTime<Utc>>,
    active: bool,
    symbols: Vec<Symbol>,
    folders: Vec<Folder>,
}

impl MarketState {
    /// Creates a new inactive market with no symbols, daily resolution and `from_date` set to now.
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            provider: provider.into(),
            resolution: Resolution::default(),
            from_date: Utc::now(),
            last_date: None,
            active: false,
            symbols: Vec::new(),
            folders: Vec::new(),
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_from_date(mut self, from_date: DateTime<Utc>) -> Self {
        self.from_date = from_date;
        self
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Result<Self> {
        self.add_symbol(symbol)?;
        Ok(self)
    }

    pub fn with_folder(mut self, folder: Folder) -> Result<Self> {
        self.add_folder(folder)?;
        Ok(self)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn from_date(&self) -> DateTime<Utc> {
        self.from_date
    }

    /// Returns the date up to which the provider has delivered data, if any.
    pub fn last_date(&self) -> Option<DateTime<Utc>> {
        self.last_date
    }

    /// Returns `true` while the market should keep being synchronized.
    pub fn active(&self) -> bool {
        self.active
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn symbol(&self, key: &SymbolKey) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.same_key(key))
    }

    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name() == name)
    }

    pub fn active_symbol_count(&self) -> usize {
        self.symbols.iter().filter(|s| s.active()).count()
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    pub fn set_from_date(&mut self, from_date: DateTime<Utc>) {
        self.from_date = from_date;
    }

    pub fn set_last_date(&mut self, last_date: Option<DateTime<Utc>>) {
        self.last_date = last_date;
    }

    /// Sets the active flag.
    ///
    /// A job may return a state with `active == false` to end the sync loop once its download is
    /// complete.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn add_symbol(&mut self, symbol: Symbol) -> Result<()> {
        let key = symbol.key();
        if self.symbols.iter().any(|s| s.same_key(&key)) {
            return Err(MarketStateError::DuplicateSymbol(key));
        }

        self.symbols.push(symbol);
        Ok(())
    }

    /// Inserts `symbol`, replacing an equivalent one in place. Returns the replaced symbol.
    pub fn upsert_symbol(&mut self, symbol: Symbol) -> Option<Symbol> {
        let key = symbol.key();
        match self.symbols.iter_mut().find(|s| s.same_key(&key)) {
            Some(existing) => Some(std::mem::replace(existing, symbol)),
            None => {
                self.symbols.push(symbol);
                None
            }
        }
    }

    pub fn remove_symbol(&mut self, key: &SymbolKey) -> Result<Symbol> {
        let idx = self
            .symbols
            .iter()
            .position(|s| s.same_key(key))
            .ok_or_else(|| MarketStateError::SymbolNotFound(key.clone()))?;

        Ok(self.symbols.remove(idx))
    }

    pub fn retain_symbols(&mut self, f: impl FnMut(&Symbol) -> bool) {
        self.symbols.retain(f);
    }

    pub fn clear_symbols(&mut self) {
        self.symbols.clear();
    }

    pub fn add_folder(&mut self, folder: Folder) -> Result<()> {
        if self.folders.iter().any(|f| f.name() == folder.name()) {
            return Err(MarketStateError::DuplicateFolder(folder.name().to_string()));
        }

        self.folders.push(folder);
        Ok(())
    }

    pub fn remove_folder(&mut self, name: &str) -> Result<Folder> {
        let idx = self
            .folders
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| MarketStateError::FolderNotFound(name.to_string()))?;

        Ok(self.folders.remove(idx))
    }

    pub fn folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| f.name() == name)
    }

    /// Checks symbol uniqueness and folder name uniqueness, recursively.
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            let key = symbol.key();
            if !keys.insert(key.clone()) {
                return Err(MarketStateError::DuplicateSymbol(key));
            }
        }

        let mut names = HashSet::with_capacity(self.folders.len());
        for folder in &self.folders {
            if !names.insert(folder.name()) {
                return Err(MarketStateError::DuplicateFolder(folder.name().to_string()));
            }
            folder.validate()?;
        }

        Ok(())
    }

    /// Fails if `other` does not describe the same market as `self`.
    pub fn check_identity(&self, other: &MarketState) -> Result<()> {
        if self.id != other.id {
            return Err(MarketStateError::IdentityChanged {
                field: "id",
                from: self.id.to_string(),
                to: other.id.to_string(),
            });
        }

        if self.name != other.name {
            return Err(MarketStateError::IdentityChanged {
                field: "name",
                from: self.name.clone(),
                to: other.name.clone(),
            });
        }

        if self.provider != other.provider {
            return Err(MarketStateError::IdentityChanged {
                field: "provider",
                from: self.provider.clone(),
                to: other.provider.clone(),
            });
        }

        Ok(())
    }

    /// Returns a one-line description of the market inventory.
    pub fn summary(&self) -> String {
        let last_date = self
            .last_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{} {}: {} symbols ({} active), {} folders, {} from {} to {}",
            self.provider,
            self.name,
            self.symbols.len(),
            self.active_symbol_count(),
            self.folders.len(),
            self.resolution,
            self.from_date.format("%Y-%m-%d"),
            last_date,
        )
    }
}
