use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{
    Symbol, SymbolKey,
    error::{MarketStateError, Result},
};

/// Named grouping of symbols, possibly nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    name: String,
    symbols: Vec<Symbol>,
    folders: Vec<Folder>,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: Vec::new(),
            folders: Vec::new(),
        }
    }

    /// Adds `symbol` to the folder, failing if an equivalent symbol is already present.
    pub fn with_symbol(mut self, symbol: Symbol) -> Result<Self> {
        self.add_symbol(symbol)?;
        Ok(self)
    }

    /// Adds `folder` as a sub-folder, failing if a sibling with the same name exists.
    pub fn with_folder(mut self, folder: Folder) -> Result<Self> {
        self.add_folder(folder)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn add_symbol(&mut self, symbol: Symbol) -> Result<()> {
        let key = symbol.key();
        if self.symbols.iter().any(|s| s.same_key(&key)) {
            return Err(MarketStateError::DuplicateSymbol(key));
        }

        self.symbols.push(symbol);
        Ok(())
    }

    pub fn remove_symbol(&mut self, key: &SymbolKey) -> Result<Symbol> {
        let idx = self
            .symbols
            .iter()
            .position(|s| s.same_key(key))
            .ok_or_else(|| MarketStateError::SymbolNotFound(key.clone()))?;

        Ok(self.symbols.remove(idx))
    }

    pub fn add_folder(&mut self, folder: Folder) -> Result<()> {
        if self.folders.iter().any(|f| f.name == folder.name) {
            return Err(MarketStateError::DuplicateFolder(folder.name));
        }

        self.folders.push(folder);
        Ok(())
    }

    pub fn remove_folder(&mut self, name: &str) -> Result<Folder> {
        let idx = self
            .folders
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| MarketStateError::FolderNotFound(name.to_string()))?;

        Ok(self.folders.remove(idx))
    }

    /// Number of symbols in this folder and all of its sub-folders.
    pub fn symbol_count(&self) -> usize {
        self.symbols.len() + self.folders.iter().map(Folder::symbol_count).sum::<usize>()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let mut keys = HashSet::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            let key = symbol.key();
            if !keys.insert(key.clone()) {
                return Err(MarketStateError::DuplicateSymbol(key));
            }
        }

        let mut names = HashSet::with_capacity(self.folders.len());
        for folder in &self.folders {
            if !names.insert(folder.name.as_str()) {
                return Err(MarketStateError::DuplicateFolder(folder.name.clone()));
            }
            folder.validate()?;
        }

        Ok(())
    }
}
